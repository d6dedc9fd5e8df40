use crate::bookmarks::BookmarkEntry;
use crate::commands::{self, Action, Command};
use crate::config::Config;
use crate::event::{ChannelView, Event, EventHandler, SyncEvent};
use crate::outbox::SyncOutcome;
use crate::services::Services;
use crate::store::{StoryDraft, StoryRecord};
use crate::ui;
use crate::ui::components::{InputResult, TextInput};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Upper bound for one outbox replay started from the UI
const SYNC_DEADLINE: Duration = Duration::from_secs(120);

/// Top-level view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
  Stories,
  Outbox,
  Bookmarks,
}

impl Tab {
  pub const ALL: [Tab; 3] = [Tab::Stories, Tab::Outbox, Tab::Bookmarks];

  pub fn title(&self) -> &'static str {
    match self {
      Tab::Stories => "Stories",
      Tab::Outbox => "Outbox",
      Tab::Bookmarks => "Bookmarks",
    }
  }

  fn next(&self) -> Tab {
    match self {
      Tab::Stories => Tab::Outbox,
      Tab::Outbox => Tab::Bookmarks,
      Tab::Bookmarks => Tab::Stories,
    }
  }
}

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
  /// Writing the description of a new story
  Compose,
}

/// Remote story list as last loaded
#[derive(Debug, Default)]
pub struct StoriesState {
  pub stories: Vec<StoryRecord>,
  pub loading: bool,
  /// Served while the network was unreachable
  pub offline: bool,
  /// Why the list could not be loaded at all
  pub error: Option<String>,
}

/// Main application state
pub struct App {
  tab: Tab,
  mode: Mode,

  stories: StoriesState,
  outbox: Vec<StoryRecord>,
  bookmarks: Vec<BookmarkEntry>,

  /// Selected row per tab, indexed like `Tab::ALL`
  selected: [usize; 3],

  /// Shared by command and compose modes
  input: TextInput,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Last notice shown in the status bar
  status: Option<String>,

  syncing: bool,

  services: Services,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub async fn new(config: Config) -> Result<Self> {
    let services = Services::new(&config)?;
    let (tx, _rx) = mpsc::unbounded_channel();

    Ok(Self {
      tab: Tab::Stories,
      mode: Mode::Normal,
      stories: StoriesState::default(),
      outbox: Vec::new(),
      bookmarks: Vec::new(),
      selected: [0; 3],
      input: TextInput::new(),
      selected_suggestion: 0,
      status: None,
      syncing: false,
      services,
      event_tx: tx,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();
    self
      .services
      .bookmarks
      .lock()
      .await
      .set_view(Box::new(ChannelView::new(events.sender())));

    self.load_initial_data();

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  fn load_initial_data(&mut self) {
    self.refresh_outbox();

    // Stories wait for the cache so the first list lands in the new generation
    let services = self.services.clone();
    let tx = self.event_tx.clone();
    self.stories.loading = true;
    tokio::spawn(async move {
      if let Err(e) = services.prepare_cache().await {
        notify(&tx, format!("Offline cache not installed: {}", e));
      }
      send_stories(&services, &tx).await;
    });

    self.reconcile();
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {}
      Event::Sync(sync_event) => self.handle_sync_event(sync_event),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
      Mode::Compose => self.handle_compose_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Tab => self.switch_tab(self.tab.next()),
      KeyCode::Char('1') => self.switch_tab(Tab::Stories),
      KeyCode::Char('2') => self.switch_tab(Tab::Outbox),
      KeyCode::Char('3') => self.switch_tab(Tab::Bookmarks),

      // Mode switches
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Char('n') => {
        self.mode = Mode::Compose;
        self.input.clear();
      }

      KeyCode::Char('s') => self.start_sync(),
      KeyCode::Char('r') => match self.tab {
        Tab::Stories => self.load_stories(),
        Tab::Outbox => self.refresh_outbox(),
        Tab::Bookmarks => self.reconcile(),
      },
      KeyCode::Char('b') if self.tab == Tab::Stories => self.bookmark_selected(),
      KeyCode::Char('d') => match self.tab {
        Tab::Outbox => self.discard_selected(),
        Tab::Bookmarks => self.remove_selected_bookmark(),
        Tab::Stories => {}
      },

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = commands::suggestions(self.input.value(), self.tab);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = commands::suggestions(self.input.value(), self.tab);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      _ => match self.input.handle_key(key) {
        InputResult::Submitted(value) => {
          self.mode = Mode::Normal;
          self.execute_command(&value);
          self.input.clear();
          self.selected_suggestion = 0;
        }
        InputResult::Cancelled => {
          self.mode = Mode::Normal;
          self.input.clear();
          self.selected_suggestion = 0;
        }
        InputResult::Consumed => self.selected_suggestion = 0,
        InputResult::NotHandled => {}
      },
    }
  }

  fn handle_compose_mode_key(&mut self, key: KeyEvent) {
    match self.input.handle_key(key) {
      InputResult::Submitted(description) => {
        self.mode = Mode::Normal;
        self.input.clear();
        self.compose(description);
      }
      InputResult::Cancelled => {
        self.mode = Mode::Normal;
        self.input.clear();
      }
      InputResult::Consumed | InputResult::NotHandled => {}
    }
  }

  fn execute_command(&mut self, input: &str) {
    // The highlighted suggestion wins over the raw text
    let suggestions = commands::suggestions(input, self.tab);
    let Some(cmd) = suggestions.get(self.selected_suggestion) else {
      self.status = Some(format!("Unknown command: {}", input.trim()));
      return;
    };

    match cmd.action {
      Action::Show(tab) => self.switch_tab(tab),
      Action::Sync => self.start_sync(),
      Action::Reconcile => self.reconcile(),
      Action::Quit => self.should_quit = true,
    }
  }

  fn switch_tab(&mut self, tab: Tab) {
    if self.tab == tab {
      return;
    }
    self.tab = tab;
    match tab {
      Tab::Stories if self.stories.stories.is_empty() => self.load_stories(),
      Tab::Outbox => self.refresh_outbox(),
      _ => {}
    }
  }

  fn compose(&mut self, description: String) {
    if description.trim().is_empty() {
      self.status = Some("Story description is empty".to_string());
      return;
    }

    let draft = StoryDraft {
      description: description.trim().to_string(),
      ..Default::default()
    };
    match self.services.outbox.enqueue(draft) {
      Ok(record) => {
        self.status = Some(format!("Queued {} for delivery", record.id));
        self.tab = Tab::Outbox;
        self.refresh_outbox();
      }
      Err(e) => self.status = Some(format!("Could not queue story: {}", e)),
    }
  }

  fn refresh_outbox(&mut self) {
    match self.services.outbox.pending() {
      Ok(pending) => self.set_outbox(pending),
      Err(e) => self.status = Some(format!("Could not read outbox: {}", e)),
    }
  }

  fn set_outbox(&mut self, pending: Vec<StoryRecord>) {
    self.outbox = pending;
    self.clamp_selection(Tab::Outbox);
  }

  fn discard_selected(&mut self) {
    let Some(record) = self.outbox.get(self.selected_index(Tab::Outbox)) else {
      return;
    };
    let id = record.id.clone();
    match self.services.outbox.discard(&id) {
      Ok(()) => {
        self.status = Some(format!("Discarded {}", id));
        self.refresh_outbox();
      }
      Err(e) => self.status = Some(format!("Could not discard {}: {}", id, e)),
    }
  }

  fn start_sync(&mut self) {
    if self.syncing {
      return;
    }
    self.syncing = true;

    let outbox = self.services.outbox.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      match tokio::time::timeout(SYNC_DEADLINE, outbox.sync_all()).await {
        Ok(Ok(report)) => {
          let _ = tx.send(Event::Sync(SyncEvent::SyncFinished(report)));
        }
        Ok(Err(e)) => notify(&tx, format!("Sync stopped: {}", e)),
        Err(_) => {
          warn!(deadline = ?SYNC_DEADLINE, "outbox sync timed out");
          notify(&tx, "Sync timed out, unsent stories stay queued".to_string());
        }
      }
      // The timeout and error paths still need the spinner cleared
      match outbox.pending() {
        Ok(pending) => {
          let _ = tx.send(Event::Sync(SyncEvent::OutboxChanged(pending)));
        }
        Err(e) => notify(&tx, format!("Could not read outbox: {}", e)),
      }
    });
  }

  fn load_stories(&mut self) {
    self.stories.loading = true;
    let services = self.services.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move { send_stories(&services, &tx).await });
  }

  /// Runs queue on the reconciler's lock, so a repeat press just re-checks.
  fn reconcile(&self) {
    let bookmarks = self.services.bookmarks.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      let result = bookmarks.lock().await.load_bookmarks().await;
      let message = match result {
        Ok(report) => format!(
          "Bookmarks checked: {} kept, {} removed, {} unverified",
          report.kept,
          report.evicted.len(),
          report.failures.len()
        ),
        Err(e) => format!("Bookmark check failed: {}", e),
      };
      notify(&tx, message);
    });
  }

  fn bookmark_selected(&mut self) {
    let Some(story) = self
      .stories
      .stories
      .get(self.selected_index(Tab::Stories))
      .cloned()
    else {
      return;
    };

    let bookmarks = self.services.bookmarks.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      let id = story.id.clone();
      let mut reconciler = bookmarks.lock().await;
      let refreshed = reconciler.is_bookmarked(&id);
      let message = match reconciler.add_bookmark(story) {
        Ok(()) if refreshed => format!("Refreshed saved copy of {}", id),
        Ok(()) => format!("Bookmarked {}", id),
        Err(e) => format!("Could not bookmark {}: {}", id, e),
      };
      notify(&tx, message);
    });
  }

  fn remove_selected_bookmark(&mut self) {
    let Some(entry) = self.bookmarks.get(self.selected_index(Tab::Bookmarks)) else {
      return;
    };

    let id = entry.id.clone();
    let bookmarks = self.services.bookmarks.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      let message = match bookmarks.lock().await.remove_bookmark(&id) {
        Ok(()) => format!("Removed bookmark {}", id),
        Err(e) => format!("Could not remove bookmark {}: {}", id, e),
      };
      notify(&tx, message);
    });
  }

  fn handle_sync_event(&mut self, event: SyncEvent) {
    match event {
      SyncEvent::StoriesLoaded { stories, offline } => {
        self.stories = StoriesState {
          stories,
          loading: false,
          offline,
          error: None,
        };
        self.clamp_selection(Tab::Stories);
      }
      SyncEvent::StoriesUnavailable(reason) => {
        self.stories.loading = false;
        self.stories.offline = true;
        self.stories.error = Some(reason);
      }
      SyncEvent::OutboxChanged(pending) => {
        self.syncing = false;
        self.set_outbox(pending);
      }
      SyncEvent::SyncFinished(report) => {
        let skipped = report
          .outcomes
          .iter()
          .filter(|(_, o)| matches!(o, SyncOutcome::Skipped))
          .count();
        let mut message = format!(
          "Sync: {} delivered, {} failed",
          report.delivered(),
          report.failed()
        );
        if skipped > 0 {
          message.push_str(&format!(", {} already in flight", skipped));
        }
        if report.had_transport_failure() {
          message.push_str(" (offline?)");
        }
        info!(delivered = report.delivered(), failed = report.failed(), "sync finished");
        self.status = Some(message);
      }
      SyncEvent::BookmarksChanged(bookmarks) => {
        self.bookmarks = bookmarks;
        self.clamp_selection(Tab::Bookmarks);
      }
      SyncEvent::Notice(message) => self.status = Some(message),
    }
  }

  fn tab_index(tab: Tab) -> usize {
    match tab {
      Tab::Stories => 0,
      Tab::Outbox => 1,
      Tab::Bookmarks => 2,
    }
  }

  fn list_len(&self, tab: Tab) -> usize {
    match tab {
      Tab::Stories => self.stories.stories.len(),
      Tab::Outbox => self.outbox.len(),
      Tab::Bookmarks => self.bookmarks.len(),
    }
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.list_len(self.tab);
    if len > 0 {
      let selected = &mut self.selected[Self::tab_index(self.tab)];
      *selected = (*selected as i32 + delta).rem_euclid(len as i32) as usize;
    }
  }

  fn clamp_selection(&mut self, tab: Tab) {
    let len = self.list_len(tab);
    let selected = &mut self.selected[Self::tab_index(tab)];
    *selected = (*selected).min(len.saturating_sub(1));
  }

  // Accessors for UI rendering
  pub fn tab(&self) -> Tab {
    self.tab
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn selected_index(&self, tab: Tab) -> usize {
    self.selected[Self::tab_index(tab)]
  }

  pub fn stories(&self) -> &StoriesState {
    &self.stories
  }

  pub fn outbox(&self) -> &[StoryRecord] {
    &self.outbox
  }

  pub fn bookmarks(&self) -> &[BookmarkEntry] {
    &self.bookmarks
  }

  #[cfg(test)]
  pub fn is_bookmarked(&self, id: &str) -> bool {
    self.bookmarks.iter().any(|b| b.id == id)
  }

  pub fn input(&self) -> &TextInput {
    &self.input
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }

  pub fn is_syncing(&self) -> bool {
    self.syncing
  }

  pub fn api_url(&self) -> String {
    self.services.client.endpoint("").map(|u| u.to_string()).unwrap_or_default()
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::suggestions(self.input.value(), self.tab)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}

fn notify(tx: &mpsc::UnboundedSender<Event>, message: String) {
  let _ = tx.send(Event::Sync(SyncEvent::Notice(message)));
}

async fn send_stories(services: &Services, tx: &mpsc::UnboundedSender<Event>) {
  let event = match services.stories(1).await {
    Ok(page) => SyncEvent::StoriesLoaded {
      stories: page.stories,
      offline: page.offline,
    },
    Err(e) => SyncEvent::StoriesUnavailable(e.to_string()),
  };
  let _ = tx.send(Event::Sync(event));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::outbox::SyncReport;
  use tempfile::TempDir;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
  }

  async fn test_app() -> (TempDir, App) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.path = Some(dir.path().join("storysync.db"));
    // Nothing listens here, so any stray request fails fast
    config.api.base_url = "http://127.0.0.1:9".to_string();
    let app = App::new(config).await.unwrap();
    (dir, app)
  }

  fn story(id: &str) -> StoryRecord {
    let mut record = StoryRecord::pending(StoryDraft {
      description: format!("story {}", id),
      ..Default::default()
    });
    record.id = id.to_string();
    record
  }

  #[tokio::test]
  async fn test_compose_queues_story() {
    let (_dir, mut app) = test_app().await;

    app.handle_key(key(KeyCode::Char('n')));
    assert_eq!(app.mode(), &Mode::Compose);
    type_text(&mut app, "  sunset at the pier ");
    app.handle_key(key(KeyCode::Enter));

    assert_eq!(app.mode(), &Mode::Normal);
    assert_eq!(app.tab(), Tab::Outbox);
    assert_eq!(app.outbox().len(), 1);
    assert_eq!(app.outbox()[0].description, "sunset at the pier");
    assert!(app.outbox()[0].is_pending());
  }

  #[tokio::test]
  async fn test_blank_compose_is_refused() {
    let (_dir, mut app) = test_app().await;

    app.handle_key(key(KeyCode::Char('n')));
    type_text(&mut app, "   ");
    app.handle_key(key(KeyCode::Enter));

    assert!(app.outbox().is_empty());
    assert_eq!(app.status(), Some("Story description is empty"));
  }

  #[tokio::test]
  async fn test_compose_cancel_keeps_outbox_empty() {
    let (_dir, mut app) = test_app().await;

    app.handle_key(key(KeyCode::Char('n')));
    type_text(&mut app, "draft");
    app.handle_key(key(KeyCode::Esc));

    assert_eq!(app.mode(), &Mode::Normal);
    assert!(app.input().is_empty());
    assert!(app.outbox().is_empty());
  }

  #[tokio::test]
  async fn test_discard_selected() {
    let (_dir, mut app) = test_app().await;
    let draft = StoryDraft {
      description: "first".into(),
      ..Default::default()
    };
    app.services.outbox.enqueue(draft).unwrap();
    app.switch_tab(Tab::Outbox);
    assert_eq!(app.outbox().len(), 1);

    app.handle_key(key(KeyCode::Char('d')));
    assert!(app.outbox().is_empty());
    assert!(app.services.outbox.pending().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_command_switches_tab() {
    let (_dir, mut app) = test_app().await;

    app.handle_key(key(KeyCode::Char(':')));
    type_text(&mut app, "book");
    app.handle_key(key(KeyCode::Enter));

    assert_eq!(app.mode(), &Mode::Normal);
    assert_eq!(app.tab(), Tab::Bookmarks);
  }

  #[tokio::test]
  async fn test_command_suggestion_navigation() {
    let (_dir, mut app) = test_app().await;

    app.handle_key(key(KeyCode::Char(':')));
    app.handle_key(key(KeyCode::Down));
    assert_eq!(app.selected_suggestion(), 1);
    app.handle_key(key(KeyCode::Up));
    app.handle_key(key(KeyCode::Up));
    assert_eq!(app.selected_suggestion(), commands::COMMANDS.len() - 1);
    // Showing the current tab sorts last, quit just above it
    app.handle_key(key(KeyCode::Up));
    assert_eq!(app.selected_suggestion(), commands::COMMANDS.len() - 2);

    app.handle_key(key(KeyCode::Enter));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_unknown_command_reports() {
    let (_dir, mut app) = test_app().await;

    app.execute_command("zzz");
    assert_eq!(app.status(), Some("Unknown command: zzz"));
  }

  #[tokio::test]
  async fn test_tab_cycles_views() {
    let (_dir, mut app) = test_app().await;
    app.stories.stories = vec![story("s1")];

    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.tab(), Tab::Outbox);
    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.tab(), Tab::Bookmarks);
    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.tab(), Tab::Stories);
  }

  #[tokio::test]
  async fn test_bookmark_updates_clamp_selection() {
    let (_dir, mut app) = test_app().await;
    app.switch_tab(Tab::Bookmarks);
    app.handle_event(Event::Sync(SyncEvent::BookmarksChanged(vec![
      story("A"),
      story("B"),
      story("C"),
    ])));
    app.handle_key(key(KeyCode::Up));
    assert_eq!(app.selected_index(Tab::Bookmarks), 2);

    app.handle_event(Event::Sync(SyncEvent::BookmarksChanged(vec![story("A")])));
    assert_eq!(app.selected_index(Tab::Bookmarks), 0);
    assert!(app.is_bookmarked("A"));
    assert!(!app.is_bookmarked("C"));
  }

  #[tokio::test]
  async fn test_story_events_set_offline_state() {
    let (_dir, mut app) = test_app().await;

    app.handle_event(Event::Sync(SyncEvent::StoriesLoaded {
      stories: vec![story("s1")],
      offline: true,
    }));
    assert!(app.stories().offline);
    assert!(!app.stories().loading);
    assert_eq!(app.stories().stories.len(), 1);

    app.handle_event(Event::Sync(SyncEvent::StoriesUnavailable("offline".into())));
    assert_eq!(app.stories().error.as_deref(), Some("offline"));
    // The last good list stays visible
    assert_eq!(app.stories().stories.len(), 1);
  }

  #[tokio::test]
  async fn test_sync_finished_summary() {
    let (_dir, mut app) = test_app().await;
    let report = SyncReport {
      outcomes: vec![
        ("r1".into(), SyncOutcome::Delivered { remote_id: None }),
        ("r2".into(), SyncOutcome::Skipped),
      ],
    };

    app.handle_event(Event::Sync(SyncEvent::SyncFinished(report)));
    assert_eq!(
      app.status(),
      Some("Sync: 1 delivered, 0 failed, 1 already in flight")
    );
  }
}
