use crate::bookmarks::BookmarkEntry;
use crate::ui::renderfns::{format_time, single_line, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_bookmarks(frame: &mut Frame, area: Rect, bookmarks: &[BookmarkEntry], selected: usize) {
  let block = Block::default()
    .title(format!(" Bookmarks ({}) ", bookmarks.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Green));

  if bookmarks.is_empty() {
    let paragraph = Paragraph::new("No bookmarks yet. Press b on a story to save it.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = bookmarks
    .iter()
    .map(|entry| {
      let author = entry.name.as_deref().unwrap_or("unknown");
      let line = Line::from(vec![
        Span::styled(
          format!("{:<16}", truncate(author, 16)),
          Style::default().fg(Color::Cyan),
        ),
        Span::raw(" "),
        Span::styled(
          format_time(&entry.created_at),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::raw(truncate(&single_line(&entry.description), 60)),
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
