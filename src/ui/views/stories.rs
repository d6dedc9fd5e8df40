use crate::app::StoriesState;
use crate::bookmarks::BookmarkEntry;
use crate::ui::renderfns::{format_time, single_line, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_story_list(
  frame: &mut Frame,
  area: Rect,
  state: &StoriesState,
  bookmarks: &[BookmarkEntry],
  selected: usize,
) {
  let mut title = vec![Span::raw(if state.loading {
    " Stories (loading...) ".to_string()
  } else {
    format!(" Stories ({}) ", state.stories.len())
  })];
  if state.offline {
    title.push(Span::styled(
      " OFFLINE ",
      Style::default().fg(Color::Black).bg(Color::Red).bold(),
    ));
    title.push(Span::raw(" "));
  }

  let block = Block::default()
    .title(Line::from(title))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if state.stories.is_empty() && !state.loading {
    let content = match &state.error {
      Some(reason) => format!("Stories unavailable: {}", reason),
      None => "No stories yet.".to_string(),
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = state
    .stories
    .iter()
    .map(|story| {
      let saved = bookmarks.iter().any(|b| b.id == story.id);
      let author = story.name.as_deref().unwrap_or("unknown");
      let line = Line::from(vec![
        Span::styled(if saved { "★ " } else { "  " }, Style::default().fg(Color::Yellow)),
        Span::styled(
          format!("{:<16}", truncate(author, 16)),
          Style::default().fg(Color::Cyan),
        ),
        Span::raw(" "),
        Span::styled(
          format_time(&story.created_at),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::raw(truncate(&single_line(&story.description), 60)),
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

  let mut list_state = ListState::default();
  list_state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut list_state);
}
