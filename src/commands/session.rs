use std::io::{self, Write};

use anyhow::Result;
use colored::Colorize;
use liftlog::{
    archive::WorkoutArchive,
    engine::{
        CompletionOutcome, CompletionVerdict, Effect, EngineState, Notice, RestView, WorkoutEngine,
        gate, spawn_ticker,
    },
    lookup::SetDefaults,
    models::ActiveWorkoutSession,
};
use serde::Serialize;

use crate::{
    cli::{RestCmd, SessionCmd, StartArgs},
    commands::App,
    types::{OutputFmt, best_suggestion, emit},
    utils::{format_minutes, format_rest, format_sets, format_target, format_weight},
};

#[derive(Serialize)]
struct SessionJson<'a> {
    session: &'a ActiveWorkoutSession,
    state: EngineState,
    rest: RestView,
    defaults: Option<SetDefaults>,
    elapsed_minutes: i64,
    completion: CompletionVerdict,
}

pub async fn handle(cmd: SessionCmd, app: &App) -> Result<()> {
    let profile = app.profile().await?;

    if let SessionCmd::Start(args) = cmd {
        return start(args, &profile, app).await;
    }

    let Some(mut engine) = WorkoutEngine::resume(app.context(&profile), &profile).await? else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };

    match cmd {
        SessionCmd::Start(_) => unreachable!(),

        SessionCmd::Rest(RestCmd::Wait) => return wait(engine, app.fmt).await,

        SessionCmd::Show => print_session(&engine, app.fmt)?,

        SessionCmd::Log { weight, reps } => log(&mut engine, weight, reps, app.fmt).await?,

        SessionCmd::Rest(rest) => {
            let res = match rest {
                RestCmd::Skip => engine.skip_rest().await,
                RestCmd::Adjust { delta } => engine.adjust_rest(delta).await,
                RestCmd::Infinite => engine.enter_infinite_rest().await,
                RestCmd::Stop => engine.exit_infinite_rest().await,
                RestCmd::Wait => unreachable!(),
            };
            if report(res)?.is_some() {
                emit(app.fmt, &engine.rest_view(), || {
                    println!("{} {}", "rest:".cyan().bold(), format_rest(engine.rest_view()))
                })?;
            }
        }

        SessionCmd::Next => match report(engine.advance_exercise().await)? {
            Some(effects)
                if effects.contains(&Effect::ReadyForCompletion) && app.fmt != OutputFmt::Json =>
            {
                finish_hint()
            }
            Some(_) => print_current(&engine, app.fmt)?,
            None => {}
        },

        SessionCmd::Repeat => {
            if report(engine.repeat_set().await)?.is_some() {
                print_current(&engine, app.fmt)?;
            }
        }

        SessionCmd::Goto { exercise } => {
            let total = engine.session().routine_snapshot.exercises.len();
            if exercise == 0 || exercise > total {
                println!("{} no exercise at index {}", "error:".red().bold(), exercise);
            } else if report(engine.move_to_exercise(exercise - 1).await)?.is_some() {
                print_current(&engine, app.fmt)?;
            }
        }

        SessionCmd::Prev => {
            let idx = engine.session().current_exercise_index;
            if idx == 0 {
                println!("{} already at the first exercise", "warning:".yellow().bold());
            } else if report(engine.move_to_exercise(idx - 1).await)?.is_some() {
                print_current(&engine, app.fmt)?;
            }
        }

        SessionCmd::Note { note } => {
            let note = (!note.trim().is_empty()).then_some(note);
            let cleared = note.is_none();
            if report(engine.annotate(note).await)?.is_some() {
                let msg = if cleared { "note cleared" } else { "note saved" };
                println!("{} {}", "ok:".green().bold(), msg);
            }
        }

        SessionCmd::Finish { force, notes } => {
            return finish(engine, force, notes, app).await;
        }

        SessionCmd::Cancel { yes } => {
            if !yes && (app.fmt == OutputFmt::Json || !confirm("Discard this session? [y/N] ")?) {
                println!("{} kept the session", "info:".blue().bold());
            } else {
                engine.cancel().await?;
                println!(
                    "{} session cancelled (id: {})",
                    "ok:".green().bold(),
                    engine.session().id
                );
                return Ok(());
            }
        }
    }

    engine.suspend().await;
    Ok(())
}

async fn start(args: StartArgs, profile: &str, app: &App) -> Result<()> {
    let Some(routine) = app.catalog.find(&args.routine).await? else {
        println!("{} no routine `{}`", "error:".red().bold(), args.routine);
        let names = app.catalog.names().await?;
        if let Some(s) = best_suggestion(&args.routine, names.iter().map(String::as_str)) {
            println!("{} did you mean `{}`?", "info:".blue().bold(), s);
        }
        return Ok(());
    };

    if !args.fresh {
        if let Some(active) = app.store.get(profile).await? {
            if active.routine_snapshot.id != routine.id {
                println!(
                    "{} a `{}` session is in progress; finish it, cancel it or pass --fresh",
                    "warning:".yellow().bold(),
                    active.routine_snapshot.name
                );
                return Ok(());
            }
        }
    }

    let ctx = app.context(profile);
    let started = if args.fresh {
        WorkoutEngine::restart(ctx, routine, profile)
            .await
            .map(|e| (e, false))
    } else {
        WorkoutEngine::start(ctx, routine, profile).await
    };
    let Some((mut engine, resumed)) = report(started)? else {
        return Ok(());
    };

    if app.fmt == OutputFmt::Text {
        let verb = if resumed { "resumed" } else { "started" };
        println!(
            "{} {} `{}`",
            "ok:".green().bold(),
            verb,
            engine.session().routine_snapshot.name
        );
    }
    print_session(&engine, app.fmt)?;
    engine.suspend().await;
    Ok(())
}

async fn log(
    engine: &mut WorkoutEngine,
    weight: Option<f64>,
    reps: Option<u32>,
    fmt: OutputFmt,
) -> Result<()> {
    // A set logged during rest ends the rest first.
    match engine.state() {
        EngineState::RestingFixed => {
            report(engine.skip_rest().await)?;
        }
        EngineState::RestingInfinite => {
            report(engine.exit_infinite_rest().await)?;
        }
        EngineState::ExerciseComplete => {
            println!(
                "{} all planned sets are done; use `session repeat` or `session next`",
                "error:".red().bold()
            );
            return Ok(());
        }
        EngineState::Logging => {}
    }

    let defaults = engine.defaults();
    let weight = weight.or(defaults.map(|d| d.weight));
    let reps = reps.or(defaults.map(|d| d.reps));
    let (Some(weight), Some(reps)) = (weight, reps) else {
        println!("{} give WEIGHT and REPS", "error:".red().bold());
        return Ok(());
    };

    if report(engine.log_set(weight, reps).await)?.is_none() {
        return Ok(());
    }

    if fmt == OutputFmt::Json {
        return print_session(engine, fmt);
    }

    let s = engine.session();

    if let (Some(plan), Some(ex)) = (s.current_plan(), s.current_exercise()) {
        println!(
            "{} {} set {}/{} • {}×{}",
            "ok:".green().bold(),
            plan.exercise_name.bold(),
            ex.sets.len(),
            plan.planned_sets,
            format_weight(weight),
            reps
        );
    }

    match engine.state() {
        EngineState::RestingFixed => println!(
            "{} {} (`session rest wait` to count down)",
            "rest:".cyan().bold(),
            format_rest(engine.rest_view())
        ),
        EngineState::ExerciseComplete if s.is_last_exercise() => finish_hint(),
        EngineState::ExerciseComplete => println!(
            "{} exercise done; `session next` to move on",
            "info:".blue().bold()
        ),
        _ => {}
    }
    Ok(())
}

fn finish_hint() {
    println!(
        "{} last exercise done; `session finish` when ready",
        "info:".blue().bold()
    );
}

/// Counts the current rest down until it ends or the user interrupts.
async fn wait(mut engine: WorkoutEngine, fmt: OutputFmt) -> Result<()> {
    if !engine.session().rest_mode.is_resting() {
        println!("{} not resting", "info:".blue().bold());
        engine.suspend().await;
        return Ok(());
    }

    let mut notices = engine.subscribe();
    let shared = engine.into_shared();
    let ticker = spawn_ticker(shared.clone());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Some(Notice::Tick(view)) => match fmt {
                    OutputFmt::Json => println!("{}", serde_json::to_string(&view)?),
                    OutputFmt::Text => {
                        print!("\r{} {}    ", "rest:".cyan().bold(), format_rest(view));
                        io::stdout().flush()?;
                    }
                },
                Some(Notice::RestFinished) => {
                    if fmt == OutputFmt::Text {
                        println!("\r{} rest over, next set!\x07{}", "ok:".green().bold(), " ".repeat(16));
                    }
                    break;
                }
                Some(Notice::Stopped) | None => break,
            },
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }

    ticker.stop();
    shared.lock().await.suspend().await;
    Ok(())
}

async fn finish(
    mut engine: WorkoutEngine,
    force: bool,
    notes: Option<String>,
    app: &App,
) -> Result<()> {
    match engine.complete(force, notes).await? {
        CompletionOutcome::Finished(workout) => {
            if let Err(e) = app.archive.append(&workout).await {
                // The session slot is already cleared; keep the data visible.
                eprintln!("{}", serde_json::to_string_pretty(&workout)?);
                return Err(anyhow::Error::new(e).context("archiving the finished workout"));
            }
            emit(app.fmt, &workout, || {
                println!(
                    "{} `{}` saved • {} • {} sets • {:.0}kg volume",
                    "ok:".green().bold(),
                    workout.routine_name,
                    format_minutes(workout.duration_minutes),
                    workout.total_sets(),
                    workout.total_volume()
                );
            })?;
        }
        CompletionOutcome::Blocked {
            reason,
            overridable,
        } => {
            let hint = if overridable {
                " (use --force to finish anyway)"
            } else {
                ""
            };
            println!("{} cannot finish: {}{}", "error:".red().bold(), reason, hint);
            engine.suspend().await;
        }
    }
    Ok(())
}

/// User-facing engine errors are printed; storage failures propagate.
fn report<T>(res: liftlog::Result<T>) -> Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_persistence() => Err(e.into()),
        Err(e) => {
            println!("{} {}", "error:".red().bold(), e);
            Ok(None)
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_current(engine: &WorkoutEngine, fmt: OutputFmt) -> Result<()> {
    let s = engine.session();
    let (Some(plan), Some(ex)) = (s.current_plan(), s.current_exercise()) else {
        return Ok(());
    };
    emit(fmt, ex, || {
        println!(
            "{} {} • {} • {} logged",
            format!("{}.", s.current_exercise_index + 1).yellow(),
            plan.exercise_name.bold(),
            format_target(plan),
            ex.sets.len()
        );
        if let Some(d) = engine.defaults() {
            println!(
                "   {} {}×{}",
                "next:".dimmed(),
                format_weight(d.weight),
                d.reps
            );
        }
    })
}

fn print_session(engine: &WorkoutEngine, fmt: OutputFmt) -> Result<()> {
    let s = engine.session();
    let now = engine.now();
    let json = SessionJson {
        session: s,
        state: engine.state(),
        rest: engine.rest_view(),
        defaults: engine.defaults(),
        elapsed_minutes: gate::duration_minutes(s, now),
        completion: engine.evaluate_completion(),
    };

    emit(fmt, &json, || {
        println!(
            "{} {} {}",
            "Session:".cyan().bold(),
            s.routine_snapshot.name.bold(),
            format!(
                "({} • {} sets • {:.0}kg)",
                format_minutes(json.elapsed_minutes),
                s.total_sets(),
                s.total_volume()
            )
            .dimmed()
        );
        println!("{} {}", "state:".dimmed(), engine.state().describe());
        if s.rest_mode.is_resting() {
            println!("{} {}", "rest:".cyan().bold(), format_rest(json.rest));
        }

        println!("\n{}", "Exercises:".cyan().bold());
        for (i, (plan, ex)) in s
            .routine_snapshot
            .exercises
            .iter()
            .zip(&s.logged_exercises)
            .enumerate()
        {
            let marker = if i == s.current_exercise_index {
                "▶".green().bold()
            } else {
                " ".normal()
            };
            println!(
                "{} {} • {} {}",
                marker,
                format!("{:>2}", i + 1).yellow(),
                plan.exercise_name.bold(),
                format_target(plan).dimmed()
            );
            if !ex.sets.is_empty() {
                println!("      {}", format_sets(&ex.sets));
            }
            if let Some(n) = &ex.notes {
                println!("      {} {}", "note:".dimmed(), n.italic());
            }
        }

        if let Some(d) = json.defaults {
            println!(
                "\n{} {}×{}",
                "next set:".dimmed(),
                format_weight(d.weight),
                d.reps
            );
        }
    })
}
