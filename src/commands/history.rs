use anyhow::Result;
use colored::Colorize;

use crate::{commands::App, types::emit, utils::format_minutes};

pub async fn handle(limit: i64, app: &App) -> Result<()> {
    let profile = app.profile().await?;
    let rows = app.archive.recent(&profile, limit.max(1)).await?;

    emit(app.fmt, &rows, || {
        if rows.is_empty() {
            println!("{}", "  (no finished workouts)".dimmed());
            return;
        }
        println!("{}", "Workouts:".cyan().bold());
        for (i, w) in rows.iter().enumerate() {
            println!(
                " {} • {} {} {}",
                format!("{:>2}", i + 1).yellow(),
                w.date.get(..10).unwrap_or(&w.date).dimmed(),
                w.routine_name.bold(),
                format!(
                    "({} • {} sets • {:.0}kg)",
                    format_minutes(w.duration_minutes),
                    w.sets,
                    w.volume
                )
                .dimmed()
            );
            if let Some(n) = &w.notes {
                println!("      {} {}", "note:".dimmed(), n.italic());
            }
        }
    })
}
