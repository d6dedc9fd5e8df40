use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::{App, Tab};

/// Draw the header bar with logo, API host, and tab strip
pub fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
  let api_url = app.api_url();
  let domain = extract_domain(&api_url);

  let mut spans = vec![
    Span::styled(" storysync ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", domain), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
  ];

  for (i, tab) in Tab::ALL.iter().enumerate() {
    let count = match tab {
      Tab::Stories => None,
      Tab::Outbox => Some(app.outbox().len()),
      Tab::Bookmarks => Some(app.bookmarks().len()),
    };
    let label = match count {
      Some(n) => format!(" {}:{} ({}) ", i + 1, tab.title(), n),
      None => format!(" {}:{} ", i + 1, tab.title()),
    };
    let style = if *tab == app.tab() {
      Style::default().fg(Color::Yellow).bold()
    } else {
      Style::default().fg(Color::DarkGray)
    };
    spans.push(Span::styled(label, style));
  }

  if app.is_syncing() {
    spans.push(Span::styled(" syncing… ", Style::default().fg(Color::Magenta)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Host (and port) part of a URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
