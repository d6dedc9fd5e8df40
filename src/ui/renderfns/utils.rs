use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;

use crate::store::SyncState;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Collapse line breaks and runs of whitespace so text fits in one list row
pub fn single_line(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Creation time in the local timezone
pub fn format_time(at: &DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Get the display color for a record's sync state
pub fn sync_state_color(state: SyncState) -> Color {
  match state {
    SyncState::Pending => Color::Yellow,
    SyncState::Confirmed => Color::Green,
  }
}
