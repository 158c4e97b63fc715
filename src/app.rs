use crate::api::categories::Category;
use crate::api::orders::Order;
use crate::api::plans::Plan;
use crate::api::products::Product;
use crate::api::reviews::Review;
use crate::client::ApiClient;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_footer, draw_header};
use crate::ui::view::{StatusMessage, View, ViewAction};
use crate::ui::views::{ListView, ShowcaseView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  views: Vec<Box<dyn View>>,

  /// Command palette (after pressing :)
  command: CommandInput,

  /// Latest status line message
  status: Option<StatusMessage>,

  client: ApiClient,
  config: Config,
  authenticated: bool,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, client: ApiClient, authenticated: bool, initial_view: &str) -> Self {
    let mut app = Self {
      views: Vec::new(),
      command: CommandInput::new(),
      status: None,
      client,
      config,
      authenticated,
      should_quit: false,
    };
    if !app.execute_command(initial_view) {
      app.execute_command("products");
    }
    if !authenticated {
      app.status = Some(StatusMessage::error(
        "No API token stored. Run `storedesk login --token <TOKEN>`",
      ));
    }
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);
    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }
    Ok(())
  }

  /// Poll every view on the stack and drop expired cache entries.
  fn tick(&mut self) {
    for view in &mut self.views {
      if let Some(message) = view.tick() {
        self.status = Some(message);
      }
    }
    let evicted = self.client.store().collect_garbage();
    if evicted > 0 {
      debug!(evicted, "cache entries evicted");
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self.views.last().is_some_and(|v| v.is_capturing_input());
    if !capturing {
      match self.command.handle_key(key) {
        KeyResult::Handled => return,
        KeyResult::Event(CommandEvent::Submitted(name)) => {
          if !self.execute_command(&name) {
            self.status = Some(StatusMessage::error(format!("Unknown command: {}", name)));
          }
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) => return,
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.views.last_mut() else {
      self.should_quit = true;
      return;
    };
    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Push(view) => self.views.push(view),
      ViewAction::Pop => {
        if self.views.len() > 1 {
          self.views.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Status(message) => self.status = Some(message),
    }
  }

  /// Replace the stack with a root view. Returns false for unknown commands.
  fn execute_command(&mut self, name: &str) -> bool {
    let Some(command) = crate::commands::lookup(name) else {
      return false;
    };

    let page_size = self.config.tables.page_size;
    let client = &self.client;
    let root: Box<dyn View> = match command.name {
      "categories" => Box::new(ListView::<Category>::new(client, page_size)),
      "products" => Box::new(ListView::<Product>::new(client, page_size)),
      "orders" => Box::new(ListView::<Order>::new(client, page_size)),
      "reviews" => Box::new(ListView::<Review>::new(client, page_size)),
      "plans" => Box::new(ListView::<Plan>::new(client, page_size)),
      "showcase" => Box::new(ShowcaseView::new(client)),
      "quit" => {
        self.should_quit = true;
        return true;
      }
      _ => return false,
    };

    info!(view = command.name, "switching root view");
    self.views = vec![root];
    self.status = None;
    true
  }

  fn breadcrumbs(&self) -> Vec<String> {
    self.views.iter().map(|v| v.breadcrumb_label()).collect()
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(1),    // Main content
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let shortcuts = self
      .views
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default();
    draw_header(
      frame,
      chunks[0],
      &self.config.display_title(),
      self.authenticated,
      &shortcuts,
    );

    if let Some(view) = self.views.last_mut() {
      view.render(frame, chunks[1]);
    }

    let breadcrumbs = self.breadcrumbs();
    draw_footer(frame, chunks[2], &breadcrumbs, self.status.as_ref());

    self.command.render_overlay(frame, chunks[1]);
  }
}
