use std::{collections::HashSet, fs::read_to_string};

use anyhow::{Context, Result, bail};
use colored::Colorize;
use liftlog::models::{PlannedExercise, RoutinePlan};
use serde::Deserialize;

use crate::{
    cli::RoutineCmd,
    commands::App,
    types::{best_suggestion, emit},
    utils::{format_target, slugify},
};

#[derive(Debug, Deserialize)]
struct RoutineToml {
    id: Option<String>,
    name: String,
    exercises: Vec<ExerciseToml>,
}

#[derive(Debug, Deserialize)]
struct ExerciseToml {
    id: Option<String>,
    name: String,
    sets: u32,
    reps: u32,
    weight: Option<f64>,
    rest: Option<u32>,
}

pub async fn handle(cmd: RoutineCmd, app: &App) -> Result<()> {
    match cmd {
        RoutineCmd::Import { files } => {
            if files.is_empty() {
                println!("{} no routine file provided", "warning:".yellow().bold());
            }
            for f in files {
                if let Err(e) = import_single_routine(app, &f).await {
                    match e.downcast_ref::<std::io::Error>() {
                        Some(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                            println!(
                                "{} cannot open file `{}` – file not found",
                                "error:".red().bold(),
                                f
                            );
                        }
                        _ => println!("{} `{}`: {:#}", "error:".red().bold(), f, e),
                    }
                }
            }
        }

        RoutineCmd::List => {
            let rows = app.catalog.list().await?;
            emit(app.fmt, &rows, || {
                if rows.is_empty() {
                    println!("{}", "  (no routines found)".dimmed());
                    return;
                }
                println!("{}", "Routines:".cyan().bold());
                let idx_w = rows.iter().map(|r| r.idx.to_string().len()).max().unwrap_or(1);
                for r in &rows {
                    println!(
                        " {} • {} {}",
                        format!("{:>width$}", r.idx, width = idx_w).yellow(),
                        r.name.bold(),
                        format!("({} exercises, id {})", r.exercises, r.id).dimmed()
                    );
                }
            })?;
        }

        RoutineCmd::Show { routine } => {
            let Some(plan) = find_or_suggest(app, &routine).await? else {
                return Ok(());
            };
            emit(app.fmt, &plan, || {
                println!("{} {}", "Routine:".cyan().bold(), plan.name.bold());
                for (i, ex) in plan.exercises.iter().enumerate() {
                    let rest = ex
                        .rest_seconds
                        .map(|r| format!("rest {r}s"))
                        .unwrap_or_else(|| "default rest".to_string());
                    println!(
                        " {} • {} {} {}",
                        format!("{:>2}", i + 1).yellow(),
                        ex.exercise_name.bold(),
                        format_target(ex),
                        format!("({rest})").dimmed()
                    );
                }
            })?;
        }

        RoutineCmd::Delete { routine } => {
            let Some(plan) = find_or_suggest(app, &routine).await? else {
                return Ok(());
            };
            app.catalog.delete(&plan.id).await?;
            println!("{} deleted `{}`", "ok:".green().bold(), plan.name);
        }
    }
    Ok(())
}

async fn find_or_suggest(app: &App, query: &str) -> Result<Option<RoutinePlan>> {
    if let Some(plan) = app.catalog.find(query).await? {
        return Ok(Some(plan));
    }
    println!("{} no routine `{}`", "error:".red().bold(), query);
    let names = app.catalog.names().await?;
    if let Some(s) = best_suggestion(query, names.iter().map(String::as_str)) {
        println!("{} did you mean `{}`?", "info:".blue().bold(), s);
    }
    Ok(None)
}

async fn import_single_routine(app: &App, file: &str) -> Result<()> {
    let toml_str = read_to_string(file).with_context(|| format!("reading `{file}`"))?;
    let plan = parse_routine(&toml_str).with_context(|| format!("parsing `{file}`"))?;

    if app.catalog.insert(&plan).await? {
        println!("{} `{}` ({} exercises)", "ok:".green().bold(), plan.name, plan.exercises.len());
    } else {
        println!(
            "{} routine `{}` already exists – skipping",
            "warning:".yellow().bold(),
            plan.name
        );
    }
    Ok(())
}

fn parse_routine(toml_str: &str) -> Result<RoutinePlan> {
    let raw: RoutineToml = toml::from_str(toml_str)?;

    if raw.name.trim().is_empty() {
        bail!("routine name is empty");
    }
    if raw.exercises.is_empty() {
        bail!("routine `{}` has no exercises", raw.name);
    }

    let mut seen = HashSet::new();
    let mut exercises = Vec::with_capacity(raw.exercises.len());
    for (order, ex) in raw.exercises.into_iter().enumerate() {
        if ex.sets == 0 || ex.reps == 0 {
            bail!("`{}` needs at least one set of one rep", ex.name);
        }
        if ex.weight.is_some_and(|w| !w.is_finite() || w <= 0.0) {
            bail!("`{}` has a non-positive weight", ex.name);
        }
        let exercise_id = ex.id.unwrap_or_else(|| slugify(&ex.name));
        if !seen.insert(exercise_id.clone()) {
            bail!("exercise `{}` appears twice", ex.name);
        }
        exercises.push(PlannedExercise {
            exercise_id,
            exercise_name: ex.name,
            planned_sets: ex.sets,
            planned_reps: ex.reps,
            planned_weight: ex.weight,
            rest_seconds: ex.rest,
            order: order as u32,
        });
    }

    Ok(RoutinePlan {
        id: raw.id.unwrap_or_else(|| slugify(&raw.name)),
        name: raw.name,
        exercises,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_routine_with_generated_ids() {
        let plan = parse_routine(
            r#"
            name = "Push A"

            [[exercises]]
            name = "Bench Press"
            sets = 3
            reps = 8
            weight = 60.0
            rest = 120

            [[exercises]]
            id = "ohp"
            name = "Overhead Press"
            sets = 3
            reps = 10
            "#,
        )
        .unwrap();

        assert_eq!(plan.id, "push-a");
        assert_eq!(plan.exercises[0].exercise_id, "bench-press");
        assert_eq!(plan.exercises[0].rest_seconds, Some(120));
        assert_eq!(plan.exercises[1].exercise_id, "ohp");
        assert_eq!(plan.exercises[1].order, 1);
        assert_eq!(plan.exercises[1].planned_weight, None);
    }

    #[test]
    fn rejects_empty_and_duplicate_entries() {
        assert!(parse_routine("name = \"Empty\"\nexercises = []").is_err());

        let dup = r#"
            name = "Dup"
            [[exercises]]
            name = "Squat"
            sets = 5
            reps = 5
            [[exercises]]
            name = "squat"
            sets = 3
            reps = 5
        "#;
        assert!(parse_routine(dup).is_err());
    }
}
