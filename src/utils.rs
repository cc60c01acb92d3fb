use colored::Colorize;
use itertools::Itertools;
use liftlog::{
    engine::RestView,
    models::{PerformedSet, PlannedExercise},
};

/// `mm:ss`, or `h:mm:ss` past the hour.
pub fn format_clock(seconds: u32) -> String {
    let (h, m, s) = (seconds / 3600, (seconds / 60) % 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

pub fn format_minutes(minutes: i64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m:02}m"),
    }
}

pub fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{weight:.0}kg")
    } else {
        format!("{weight}kg")
    }
}

pub fn format_set(set: &PerformedSet) -> String {
    format!("{}×{}", format_weight(set.weight), set.reps)
}

/// "60kg×8, 60kg×8, 62.5kg×6"
pub fn format_sets(sets: &[PerformedSet]) -> String {
    sets.iter().map(format_set).join(", ")
}

pub fn format_target(plan: &PlannedExercise) -> String {
    let weight = plan
        .planned_weight
        .map(|w| format!(" @ {}", format_weight(w)))
        .unwrap_or_default();
    format!("{}×{}{}", plan.planned_sets, plan.planned_reps, weight)
}

pub fn format_rest(view: RestView) -> String {
    match view {
        RestView::None => "not resting".dimmed().to_string(),
        RestView::Fixed { remaining, elapsed } => format!(
            "{} left {}",
            format_clock(remaining).bold(),
            format!("({} in)", format_clock(elapsed)).dimmed()
        ),
        RestView::Infinite { elapsed } => {
            format!("{} {}", format_clock(elapsed).bold(), "(open rest)".dimmed())
        }
    }
}

/// Lower-case, dash-separated id from a display name.
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|p| !p.is_empty())
        .map(str::to_ascii_lowercase)
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clocks_and_minutes() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(95), "01:35");
        assert_eq!(format_clock(3725), "1:02:05");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(120), "2h");
        assert_eq!(format_minutes(75), "1h 15m");
    }

    #[test]
    fn weights_and_sets() {
        let set = |w, r| PerformedSet {
            set_number: 1,
            reps: r,
            weight: w,
            rest_time_taken_seconds: 0,
            completed: true,
        };
        assert_eq!(format_sets(&[set(60.0, 8), set(62.5, 6), set(40.0, 12)]), "60kg×8, 62.5kg×6, 40kg×12");
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Push Day  (A)"), "push-day-a");
        assert_eq!(slugify("Bench Press"), "bench-press");
    }
}
