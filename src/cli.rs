use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "liftlog", version, about = "Resumable workout sessions from the terminal")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Emit machine-readable JSON instead of colorful text.
    #[arg(global = true, long)]
    pub json: bool,

    /// Log engine activity to stderr.
    #[arg(global = true, short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Session-scoped commands
    #[command(subcommand, visible_alias = "s")]
    Session(SessionCmd),

    /// Routine management
    #[command(subcommand, visible_alias = "r")]
    Routine(RoutineCmd),

    /// Show or switch the active profile
    #[command(subcommand)]
    Profile(ProfileCmd),

    /// List finished workouts
    #[command(visible_alias = "h")]
    History {
        /// How many workouts to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: i64,
    },

    /// View or edit liftlog config
    #[command(subcommand)]
    Config(ConfigCmd),
}

//
// Commands
//

#[derive(Subcommand)]
pub enum SessionCmd {
    /// Start (or resume) a session for a routine
    #[command(visible_alias = "s")]
    Start(StartArgs),

    /// Show the session in progress
    #[command(visible_alias = "i")]
    Show,

    /// Log a set; missing values are pre-filled - Usage: session log [WEIGHT] [REPS]
    #[command(visible_alias = "l")]
    Log {
        /// Weight in kg
        #[arg(value_name = "WEIGHT")]
        weight: Option<f64>,

        /// Number of reps
        #[arg(value_name = "REPS")]
        reps: Option<u32>,
    },

    /// Rest timer controls
    #[command(subcommand, visible_alias = "rt")]
    Rest(RestCmd),

    /// Move on to the next exercise
    #[command(visible_alias = "n")]
    Next,

    /// Add one more set to the exercise just finished
    Repeat,

    /// Jump to an exercise - Usage: session goto EX_IDX
    #[command(visible_alias = "g")]
    Goto {
        /// 1-based index of the exercise (same order shown in `session show`)
        #[arg(value_name = "EX_IDX")]
        exercise: usize,
    },

    /// Go back to the previous exercise
    Prev,

    /// Attach a note to the current exercise (empty to clear)
    #[command(override_usage = "session note <NOTE_STRING>")]
    Note {
        /// Free-form text
        #[arg(value_name = "NOTE_STRING", default_value = "")]
        note: String,
    },

    /// Finish the session and archive it
    #[command(visible_alias = "e")]
    Finish {
        /// Finish even if the workout looks incomplete
        #[arg(short, long)]
        force: bool,

        /// Notes for the whole workout
        #[arg(long)]
        notes: Option<String>,
    },

    /// Cancel the current session without saving it
    #[command(visible_alias = "c")]
    Cancel {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum RestCmd {
    /// End the rest now
    Skip,

    /// Add or remove seconds - Usage: rest adjust -- -15
    Adjust {
        #[arg(allow_hyphen_values = true, value_name = "DELTA")]
        delta: i64,
    },

    /// Rest with no countdown until `rest stop`
    Infinite,

    /// Stop an open rest
    Stop,

    /// Count the rest down in the terminal
    #[command(visible_alias = "w")]
    Wait,
}

#[derive(Args)]
pub struct StartArgs {
    /// Routine index (from `routine list`), id or name
    pub routine: String,

    /// Discard any session in progress instead of resuming it
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Subcommand)]
pub enum RoutineCmd {
    /// Import one or more routines from TOML files
    #[command(visible_alias = "i")]
    Import { files: Vec<String> },

    /// List routines
    #[command(visible_alias = "l")]
    List,

    /// Show a single routine in detail
    #[command(visible_alias = "s")]
    Show {
        /// Routine index (from `routine list`), id or name
        routine: String,
    },

    /// Delete a routine
    #[command(visible_alias = "d")]
    Delete {
        /// Routine index (from `routine list`), id or name
        routine: String,
    },
}

#[derive(Subcommand)]
pub enum ProfileCmd {
    /// Print the active profile
    Show,

    /// Switch to another profile
    Use { profile: String },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Show all config keys
    List,

    /// Get the value of a key
    Get { key: String },

    /// Set or override a key
    Set { key: String, val: String },

    /// Remove a key
    Unset { key: String },
}
