use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use crate::{cli::ProfileCmd, commands::App, types::emit};

pub async fn handle(cmd: ProfileCmd, app: &App) -> Result<()> {
    match cmd {
        ProfileCmd::Show => {
            let profile = app.profile().await?;
            let active = app.store.get(&profile).await?;
            let data = json!({
                "profile": profile,
                "session": active.as_ref().map(|s| &s.routine_snapshot.name),
            });
            emit(app.fmt, &data, || {
                println!("{} {}", "profile:".cyan().bold(), profile.bold());
                if let Some(s) = &active {
                    println!(
                        "{} `{}` in progress",
                        "session:".dimmed(),
                        s.routine_snapshot.name
                    );
                }
            })?;
        }

        ProfileCmd::Use { profile } => {
            if let Some(reason) = app.profiles.switch(&profile, &app.store).await? {
                println!(
                    "{} dropped the stored session ({})",
                    "warning:".yellow().bold(),
                    reason
                );
            }
            println!("{} now using `{}`", "ok:".green().bold(), profile.trim());
        }
    }
    Ok(())
}
