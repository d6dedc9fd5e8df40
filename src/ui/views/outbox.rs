use crate::store::StoryRecord;
use crate::ui::renderfns::{format_time, single_line, sync_state_color, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Pending records, oldest first
pub fn draw_outbox(
  frame: &mut Frame,
  area: Rect,
  pending: &[StoryRecord],
  selected: usize,
  syncing: bool,
) {
  let title = if syncing {
    format!(" Outbox ({}) syncing... ", pending.len())
  } else {
    format!(" Outbox ({}) ", pending.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow));

  if pending.is_empty() {
    let paragraph = Paragraph::new("Nothing waiting to be delivered. Press n to write a story.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = pending
    .iter()
    .map(|record| {
      let attachment = if record.photo.is_some() { "[photo] " } else { "" };
      let line = Line::from(vec![
        Span::styled(
          format!("{:<22}", record.id),
          Style::default().fg(Color::Cyan),
        ),
        Span::styled(
          format!("{:<10}", record.sync_state.as_str()),
          Style::default().fg(sync_state_color(record.sync_state)),
        ),
        Span::styled(
          format_time(&record.created_at),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::styled(attachment, Style::default().fg(Color::Magenta)),
        Span::raw(truncate(&single_line(&record.description), 50)),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}
