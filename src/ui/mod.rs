pub mod components;
mod renderfns;
mod views;

use crate::app::{App, Mode, Tab};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], app);

  let selected = app.selected_index(app.tab());
  match app.tab() {
    Tab::Stories => {
      views::draw_story_list(frame, chunks[1], app.stories(), app.bookmarks(), selected);
    }
    Tab::Outbox => {
      views::draw_outbox(frame, chunks[1], app.outbox(), selected, app.is_syncing());
    }
    Tab::Bookmarks => views::draw_bookmarks(frame, chunks[1], app.bookmarks(), selected),
  }

  match app.mode() {
    Mode::Command => components::draw_input_overlay(
      frame,
      chunks[1],
      "Command",
      ":",
      app.input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    ),
    Mode::Compose => components::draw_input_overlay(
      frame,
      chunks[1],
      "New story (Enter to queue, Esc to cancel)",
      "> ",
      app.input(),
      &[],
      0,
    ),
    Mode::Normal => {}
  }

  draw_status_bar(frame, chunks[2], app);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match (app.mode(), app.status()) {
    (Mode::Normal, Some(status)) => (format!(" {}", status), Style::default().fg(Color::White)),
    (Mode::Normal, None) => (key_hints(app.tab()).to_string(), Style::default().fg(Color::DarkGray)),
    (Mode::Command, _) => (
      " Tab:next  Enter:run  Esc:cancel".to_string(),
      Style::default().fg(Color::Yellow),
    ),
    (Mode::Compose, _) => (
      " Stories are queued locally and delivered on the next sync".to_string(),
      Style::default().fg(Color::Yellow),
    ),
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}

fn key_hints(tab: Tab) -> &'static str {
  match tab {
    Tab::Stories => " :command  j/k:nav  b:bookmark  r:reload  n:new  s:sync  Tab:view  q:quit",
    Tab::Outbox => " :command  j/k:nav  n:new  s:sync  d:discard  r:reload  Tab:view  q:quit",
    Tab::Bookmarks => " :command  j/k:nav  r:recheck  d:remove  Tab:view  q:quit",
  }
}
