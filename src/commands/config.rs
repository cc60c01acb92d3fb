use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::{
    cli::ConfigCmd,
    types::{Config, KNOWN_KEYS, best_suggestion},
};

pub async fn handle(cmd: ConfigCmd, config_path: &Path) -> Result<()> {
    let mut cfg = Config::load(config_path)?;

    match cmd {
        ConfigCmd::List => {
            println!("{}", "Config:".cyan().bold());
            for (k, (default, help)) in KNOWN_KEYS.iter() {
                match cfg.map.get(*k) {
                    Some(v) => println!("  {} = {}", k.green(), v),
                    None if default.is_empty() => {
                        println!("  {} {}", k.dimmed(), format!("# {help}").dimmed())
                    }
                    None => println!(
                        "  {} = {} {}",
                        k.dimmed(),
                        default.dimmed(),
                        format!("# {help}").dimmed()
                    ),
                }
            }
        }

        ConfigCmd::Get { key } => match cfg.map.get(&key) {
            Some(val) => println!("{}", val),
            None => match KNOWN_KEYS.get(key.as_str()) {
                Some((default, _)) => println!("{}", default),
                None => unknown_key(&key),
            },
        },

        ConfigCmd::Set { key, val } => {
            if !KNOWN_KEYS.contains_key(key.as_str()) {
                unknown_key(&key);
                return Ok(());
            }
            if let Err(msg) = Config::validate(&key, &val) {
                println!("{} {}", "error:".red().bold(), msg);
                return Ok(());
            }
            cfg.map.insert(key.clone(), val.clone());
            cfg.save(config_path)?;
            println!("{} set `{}` = `{}`", "info:".blue().bold(), key.green(), val);
        }

        ConfigCmd::Unset { key } => {
            if cfg.map.remove(&key).is_some() {
                cfg.save(config_path)?;
                println!("{} removed `{}`", "info:".blue().bold(), key.green());
            } else {
                println!("{} key `{}` not set", "warning:".yellow().bold(), key);
            }
        }
    }

    Ok(())
}

fn unknown_key(key: &str) {
    println!("{} unknown key `{}`", "warning:".yellow().bold(), key);
    if let Some(s) = best_suggestion(key, KNOWN_KEYS.keys().copied()) {
        println!("{} did you mean `{}`?", "info:".blue().bold(), s);
    }
}
