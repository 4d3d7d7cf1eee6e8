use chrono::{DateTime, Utc};

use crate::autosave::SaveState;

/// Status indicator text. Pure presentation: a function of the save state
/// and the clock, nothing else.
pub fn status_text(state: SaveState, now: DateTime<Utc>) -> String {
    match state {
        SaveState::Idle => String::new(),
        SaveState::Saving => "Saving...".to_string(),
        SaveState::Saved(at) => format!("Saved {}", format_time_ago(at, now)),
        SaveState::Unsaved => "Unsaved".to_string(),
        SaveState::Error => "Save failed".to_string(),
    }
}

fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    if seconds < 60 {
        format!("{seconds}s ago")
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else {
        format!("{}h ago", seconds / 3600)
    }
}
