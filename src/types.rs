use once_cell::sync::Lazy;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use strsim::jaro_winkler;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::ValueEnum;
use liftlog::{
    engine::{EngineSettings, RestPolicy},
    lookup::SafeDefaults,
    storage::DEFAULT_STALE_AFTER_HOURS,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFmt {
    #[default]
    Text,
    Json,
}

/// Prints `value` as JSON, or runs `pretty` for human output.
pub fn emit<T: Serialize>(fmt: OutputFmt, value: &T, pretty: impl FnOnce()) -> Result<()> {
    match fmt {
        OutputFmt::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFmt::Text => pretty(),
    }
    Ok(())
}

/// Config keys we understand: key -> (default, description).
/// An empty default means "computed at runtime".
pub static KNOWN_KEYS: Lazy<BTreeMap<&'static str, (&'static str, &'static str)>> = Lazy::new(|| {
    BTreeMap::from([
        ("db.path", ("", "database file (defaults to the user data dir)")),
        ("profile.default", ("default", "profile used until `profile use` is run")),
        ("rest.default_seconds", ("90", "rest when a routine entry has none")),
        ("rest.first_set_seconds", ("0", "rest recorded for a set with no rest before it")),
        ("session.stale_after_hours", ("24", "idle hours before a session is discarded")),
        ("defaults.weight", ("20", "weight pre-filled when nothing better is known")),
        ("defaults.reps", ("10", "reps pre-filled when nothing better is known")),
    ])
});

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub map: BTreeMap<String, String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("liftlog").join("config"))
            .context("Could not determine config directory")
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, toml::to_string(self)?)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }

    /// Checks a value before it is stored.
    pub fn validate(key: &str, val: &str) -> std::result::Result<(), String> {
        let ok = match key {
            "db.path" | "profile.default" => !val.trim().is_empty(),
            "rest.default_seconds" | "session.stale_after_hours" | "defaults.reps" => {
                val.parse::<u32>().is_ok_and(|v| v > 0)
            }
            "rest.first_set_seconds" => val.parse::<u32>().is_ok(),
            "defaults.weight" => val.parse::<f64>().is_ok_and(|v| v.is_finite() && v > 0.0),
            _ => return Err(format!("unknown key `{key}`")),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("invalid value `{val}` for `{key}`"))
        }
    }

    fn parsed<T: FromStr>(&self, key: &str) -> T {
        let default = KNOWN_KEYS.get(key).map(|(d, _)| *d).unwrap_or_default();
        if let Some(raw) = self.map.get(key) {
            match raw.parse() {
                Ok(v) => return v,
                Err(_) => warn!(key, value = %raw, "ignoring invalid config value"),
            }
        }
        match default.parse() {
            Ok(v) => v,
            Err(_) => unreachable!("built-in default for `{key}` must parse"),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        match self.map.get("db.path") {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => dirs::data_dir()
                .map(|d| d.join("liftlog"))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("liftlog.db"),
        }
    }

    pub fn default_profile(&self) -> String {
        self.parsed("profile.default")
    }

    pub fn stale_after(&self) -> Duration {
        let hours: i64 = self.parsed("session.stale_after_hours");
        Duration::hours(if hours > 0 { hours } else { DEFAULT_STALE_AFTER_HOURS })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            rest: RestPolicy {
                default_rest_seconds: self.parsed::<u32>("rest.default_seconds").max(1),
                first_set_rest_seconds: self.parsed("rest.first_set_seconds"),
            },
            safe_defaults: SafeDefaults {
                weight: self.parsed("defaults.weight"),
                reps: self.parsed::<u32>("defaults.reps").max(1),
            },
        }
    }
}

/// Return the closest candidate for `input` if similarity ≥ 0.80 *and*
/// clearly better than the runner-up. Otherwise `None` (no suggestion shown).
pub fn best_suggestion<'a, I>(input: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let inp = input.to_ascii_lowercase();
    if inp.trim().is_empty() {
        return None;
    }

    // Collect (candidate, score) pairs.
    let mut scores: Vec<(&'a str, f64)> = candidates
        .into_iter()
        .map(|c| (c, jaro_winkler(&inp, &c.to_ascii_lowercase())))
        .collect();

    // Highest score first.
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (best, best_score) = *scores.first()?;
    let second_score = scores.get(1).map(|(_, s)| *s).unwrap_or(0.0);

    const MIN_SCORE: f64 = 0.80;
    const GAP: f64 = 0.02;

    if best_score >= MIN_SCORE && best_score - second_score >= GAP {
        Some(best)
    } else {
        None
    }
}
