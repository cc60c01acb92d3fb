use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::App;
use types::{Config, OutputFmt};

mod cli;
mod commands;
mod types;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "liftlog=debug" } else { "liftlog=warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .init();

    let fmt = if cli.json { OutputFmt::Json } else { OutputFmt::Text };
    let config_path = Config::default_path()?;

    match cli.cmd {
        Commands::Config(cmd) => commands::config::handle(cmd, &config_path).await?,
        cmd => {
            let cfg = Config::load(&config_path)?;
            let app = App::open(&cfg, fmt).await?;

            match cmd {
                Commands::Session(cmd) => commands::session::handle(cmd, &app).await?,
                Commands::Routine(cmd) => commands::routine::handle(cmd, &app).await?,
                Commands::Profile(cmd) => commands::profile::handle(cmd, &app).await?,
                Commands::History { limit } => commands::history::handle(limit, &app).await?,
                Commands::Config(_) => unreachable!(),
            }
        }
    }

    Ok(())
}
