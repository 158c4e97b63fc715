use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};

use crate::api::SortOrder;
use crate::client::ApiClient;
use crate::table::{PaginatedTable, PagingMode, Sort, TableOptions, TableStatus};
use crate::ui::components::{FilterTabs, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::view::{PendingAction, ShortcutInfo, StatusMessage, View, ViewAction};

use super::entities::{AdminEntity, RowAction};

/// Row awaiting a `y` before it is deleted.
struct DeletePrompt {
  id: String,
  name: String,
}

/// Paginated table of one entity kind.
pub struct ListView<E: AdminEntity> {
  client: ApiClient,
  table: PaginatedTable<E>,
  table_state: TableState,
  search: SearchInput,
  filter: Option<FilterTabs>,
  pending: Vec<PendingAction>,
  confirm: Option<DeletePrompt>,
}

impl<E: AdminEntity> ListView<E> {
  pub fn new(client: &ApiClient, page_size: usize) -> Self {
    let mut options = TableOptions::new(E::paging(), page_size);
    if let Some(sort) = E::default_sort() {
      options = options.with_sort(sort);
    }
    Self {
      client: client.clone(),
      table: PaginatedTable::new(client, E::endpoint(), options),
      table_state: TableState::default().with_selected(Some(0)),
      search: SearchInput::new(),
      filter: E::filter().map(FilterTabs::new),
      pending: Vec::new(),
      confirm: None,
    }
  }

  /// Only server-paginated endpoints understand `search`.
  fn searchable() -> bool {
    E::paging() == PagingMode::Server
  }

  fn selected_row(&self) -> Option<&E> {
    self
      .table_state
      .selected()
      .and_then(|idx| self.table.rows().get(idx))
  }

  fn move_selection(&mut self, forward: bool) {
    let len = self.table.rows().len();
    if len == 0 {
      return;
    }
    let current = self.table_state.selected().unwrap_or(0).min(len - 1);
    let next = if forward {
      (current + 1) % len
    } else {
      (current + len - 1) % len
    };
    self.table_state.select(Some(next));
  }

  fn reset_selection(&mut self) {
    self.table_state.select(Some(0));
  }

  /// Next sortable column after the current one, wrapping.
  fn cycle_sort(&mut self) {
    let keys: Vec<&'static str> = E::COLUMNS.iter().filter_map(|c| c.sort_key).collect();
    if keys.is_empty() {
      return;
    }
    let (next, order) = match self.table.sort() {
      Some(sort) => {
        let idx = keys.iter().position(|k| *k == sort.column);
        let next = idx.map(|i| (i + 1) % keys.len()).unwrap_or(0);
        (keys[next], sort.order)
      }
      None => (keys[0], SortOrder::default()),
    };
    self.table.set_sort(Sort::new(next, order));
    self.reset_selection();
  }

  fn flip_sort(&mut self) {
    let sort = match self.table.sort() {
      Some(sort) => Sort::new(sort.column.clone(), sort.order.flip()),
      None => match E::COLUMNS.iter().find_map(|c| c.sort_key) {
        Some(key) => Sort::new(key, SortOrder::Asc),
        None => return,
      },
    };
    self.table.set_sort(sort);
    self.reset_selection();
  }

  /// Back to the entity's default ordering, or none.
  fn reset_sort(&mut self) {
    match E::default_sort() {
      Some(sort) => self.table.set_sort(sort),
      None => self.table.clear_sort(),
    }
    self.reset_selection();
  }

  fn cycle_filter(&mut self) {
    let Some(filter) = self.filter.as_mut() else {
      return;
    };
    filter.cycle();
    let (param, value) = (filter.param(), filter.value());
    self.table.set_filter(param, value);
    self.reset_selection();
  }

  fn start(&mut self, action: PendingAction) -> ViewAction {
    self.pending.push(action);
    ViewAction::Status(StatusMessage::info("Working..."))
  }

  fn handle_confirm(&mut self, key: KeyEvent, prompt: DeletePrompt) -> ViewAction {
    if key.code != KeyCode::Char('y') {
      return ViewAction::Status(StatusMessage::info("Delete cancelled"));
    }
    let row = self.table.rows().iter().find(|row| row.id() == prompt.id);
    match row.and_then(|row| row.delete(&self.client)) {
      Some(action) => self.start(action),
      None => ViewAction::Status(StatusMessage::error(format!(
        "{} is no longer on this page",
        prompt.name
      ))),
    }
  }

  fn handle_row_key(&mut self, key: char) -> ViewAction {
    let Some(row) = self.selected_row() else {
      return ViewAction::None;
    };
    match row.row_action(key, &self.client) {
      Some(RowAction::Run(action)) => self.start(action),
      Some(RowAction::Refused(reason)) => ViewAction::Status(StatusMessage::error(reason)),
      Some(RowAction::Open(view)) => ViewAction::Push(view),
      None => ViewAction::None,
    }
  }

  fn request_delete(&mut self) -> ViewAction {
    let Some(row) = self.selected_row() else {
      return ViewAction::None;
    };
    let prompt = DeletePrompt {
      id: row.id().to_string(),
      name: row.display_name(),
    };
    let text = format!("Delete {}? (y/n)", prompt.name);
    self.confirm = Some(prompt);
    ViewAction::Status(StatusMessage::info(text))
  }

  fn title(&self) -> String {
    let mut title = format!(" {} ({})", E::LABEL, self.table.total_rows());
    if self.table.is_fetching() {
      title.push_str(" [loading...]");
    } else if let Some(err) = self.table.error().filter(|_| self.table.status() == TableStatus::Ready) {
      title.push_str(&format!(" [refresh failed: {}]", err.message()));
    }
    title.push(' ');
    title
  }

  fn pager_line(&self) -> Line<'static> {
    let pagination = self.table.pagination();
    let mut spans = vec![
      Span::styled(
        format!(
          " Page {} of {}",
          pagination.page_index + 1,
          self.table.total_pages()
        ),
        Style::default().fg(Color::Cyan),
      ),
      Span::styled(
        format!(
          "  ·  {} rows  ·  {} per page",
          self.table.total_rows(),
          pagination.page_size
        ),
        Style::default().fg(Color::DarkGray),
      ),
    ];
    if let Some(search) = self.table.search() {
      spans.push(Span::styled(
        format!("  ·  search \"{}\"", search),
        Style::default().fg(Color::Yellow),
      ));
    }
    if let Some(sort) = self.table.sort() {
      spans.push(Span::styled(
        format!("  ·  sort {} {}", sort.column, sort.order.as_str()),
        Style::default().fg(Color::DarkGray),
      ));
    }
    Line::from(spans)
  }

  fn header_row(&self) -> Row<'static> {
    let sort = self.table.sort();
    let cells = E::COLUMNS.iter().map(|column| {
      let arrow = match (column.sort_key, sort) {
        (Some(key), Some(sort)) if key == sort.column => match sort.order {
          SortOrder::Asc => " ▲",
          SortOrder::Desc => " ▼",
        },
        _ => "",
      };
      Cell::from(format!("{}{}", column.title, arrow))
    });
    Row::new(cells).style(Style::default().fg(Color::Yellow).bold())
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let message = match self.table.status() {
      TableStatus::Loading => Some(("Loading...".to_string(), Color::DarkGray)),
      TableStatus::Error => {
        let err = self
          .table
          .error()
          .map(|e| e.message().to_string())
          .unwrap_or_default();
        Some((format!("Error: {}\n\nPress 'r' to retry.", err), Color::Red))
      }
      TableStatus::Empty => Some((format!("No {} found.", E::LABEL.to_lowercase()), Color::DarkGray)),
      TableStatus::Ready => None,
    };

    if let Some((text, color)) = message {
      let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(color));
      frame.render_widget(paragraph, area);
      return;
    }

    let rows: Vec<Row> = self.table.rows().iter().map(|row| Row::new(row.cells())).collect();
    ensure_valid_selection(&mut self.table_state, rows.len());

    let widths: Vec<Constraint> = E::COLUMNS.iter().map(|c| c.width).collect();
    let table = Table::new(rows, widths)
      .header(self.header_row())
      .block(block)
      .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }
}

impl<E: AdminEntity> View for ListView<E> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(prompt) = self.confirm.take() {
      return self.handle_confirm(key, prompt);
    }

    if Self::searchable() {
      match self.search.handle_key(key, self.table.search()) {
        KeyResult::Handled => return ViewAction::None,
        KeyResult::Event(SearchEvent::Submitted(term)) => {
          self.table.set_search(&term);
          self.reset_selection();
          return ViewAction::None;
        }
        KeyResult::Event(SearchEvent::Cancelled) => return ViewAction::None,
        KeyResult::NotHandled => {}
      }
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(true),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(false),
      KeyCode::Char('n') | KeyCode::Right => {
        self.table.next_page();
        self.reset_selection();
      }
      KeyCode::Char('p') | KeyCode::Left => {
        self.table.prev_page();
        self.reset_selection();
      }
      KeyCode::Char('+') => {
        self.table.cycle_page_size(true);
        self.reset_selection();
      }
      KeyCode::Char('-') => {
        self.table.cycle_page_size(false);
        self.reset_selection();
      }
      KeyCode::Char('s') => self.cycle_sort(),
      KeyCode::Char('o') => self.flip_sort(),
      KeyCode::Char('S') => self.reset_sort(),
      KeyCode::Char('f') => self.cycle_filter(),
      KeyCode::Char('r') => self.table.refetch(),
      KeyCode::Char('D') => return self.request_delete(),
      KeyCode::Enter => return self.handle_row_key('\n'),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      KeyCode::Char(c) => return self.handle_row_key(c),
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let filter_height = if self.filter.is_some() { 1 } else { 0 };
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(filter_height),
        Constraint::Min(3),
        Constraint::Length(1),
      ])
      .split(area);

    if let Some(filter) = &self.filter {
      filter.render(frame, chunks[0]);
    }
    self.render_table(frame, chunks[1]);
    frame.render_widget(Paragraph::new(self.pager_line()), chunks[2]);

    self.search.render_overlay(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    match self.table.search() {
      Some(search) => format!("{} [{}]", E::LABEL, search),
      None => E::LABEL.to_string(),
    }
  }

  fn tick(&mut self) -> Option<StatusMessage> {
    self.table.tick();

    let mut outcome = None;
    self.pending.retain_mut(|action| match action.poll() {
      Some(message) => {
        outcome = Some(message);
        false
      }
      None => true,
    });
    outcome
  }

  fn is_capturing_input(&self) -> bool {
    self.search.is_active() || self.confirm.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("n/p", "page").with_priority(30),
      ShortcutInfo::new("+/-", "size").with_priority(31),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ];
    if Self::searchable() {
      shortcuts.push(ShortcutInfo::new("/", "search").with_priority(20));
    }
    if E::COLUMNS.iter().any(|c| c.sort_key.is_some()) {
      shortcuts.push(ShortcutInfo::new("s/o/S", "sort").with_priority(32));
    }
    shortcuts.push(ShortcutInfo::new("D", "delete").with_priority(70));
    shortcuts.extend(E::action_hints().iter().cloned());
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::categories::Category;
  use crate::api::ListParams;
  use crate::api::orders::Order;
  use crate::api::reviews::Review;
  use crate::cache::CacheStore;
  use crate::transport::mock::MockTransport;
  use crossterm::event::KeyModifiers;
  use reqwest::Method;
  use serde_json::json;
  use std::sync::Arc;

  fn key(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
  }

  fn setup() -> (MockTransport, ApiClient) {
    let transport = MockTransport::new();
    let client = ApiClient::new(CacheStore::new(), Arc::new(transport.clone()));
    (transport, client)
  }

  fn categories(count: usize, total: usize) -> serde_json::Value {
    let data: Vec<_> = (0..count)
      .map(|i| json!({ "id": format!("c{}", i), "name": format!("Category {}", i), "isActive": true }))
      .collect();
    json!({
      "success": true,
      "data": data,
      "meta": { "pagination": { "total": total } }
    })
  }

  async fn settle<E: AdminEntity>(view: &mut ListView<E>) {
    view.table.settled().await;
  }

  async fn outcome<E: AdminEntity>(view: &mut ListView<E>) -> StatusMessage {
    loop {
      if let Some(message) = view.tick() {
        return message;
      }
      tokio::task::yield_now().await;
    }
  }

  #[tokio::test]
  async fn test_next_page_requests_page_two() {
    let (transport, client) = setup();
    transport.respond(Method::GET, "/categories", 200, categories(10, 25));
    let mut view: ListView<Category> = ListView::new(&client, 10);
    settle(&mut view).await;

    view.handle_key(key('n'));
    settle(&mut view).await;

    let last = transport.last_request().unwrap();
    assert_eq!(last.params, Some(json!({ "page": 2, "limit": 10 })));
    assert_eq!(view.table.pagination().page_index, 1);
  }

  #[tokio::test]
  async fn test_search_commits_once() {
    let (transport, client) = setup();
    transport.respond(Method::GET, "/categories", 200, categories(1, 1));
    let mut view: ListView<Category> = ListView::new(&client, 10);
    settle(&mut view).await;

    view.handle_key(key('/'));
    assert!(view.is_capturing_input());
    view.handle_key(key('m'));
    view.handle_key(key('u'));
    assert_eq!(transport.calls(Method::GET, "/categories"), 1);

    view.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    settle(&mut view).await;
    assert_eq!(transport.calls(Method::GET, "/categories"), 2);
    assert_eq!(view.breadcrumb_label(), "Categories [mu]");
  }

  #[tokio::test]
  async fn test_delete_needs_confirmation() {
    let (transport, client) = setup();
    transport.respond(Method::GET, "/categories", 200, categories(2, 2));
    transport.respond(
      Method::DELETE,
      "/categories/c0",
      200,
      json!({ "success": true, "message": "Category removed" }),
    );
    let mut view: ListView<Category> = ListView::new(&client, 10);
    settle(&mut view).await;

    assert!(matches!(view.handle_key(key('D')), ViewAction::Status(_)));
    assert!(matches!(view.handle_key(key('x')), ViewAction::Status(_)));
    assert_eq!(transport.calls(Method::DELETE, "/categories/c0"), 0);

    view.handle_key(key('D'));
    view.handle_key(key('y'));
    assert_eq!(outcome(&mut view).await, StatusMessage::success("Category removed"));
    assert_eq!(transport.calls(Method::DELETE, "/categories/c0"), 1);
  }

  #[tokio::test]
  async fn test_failed_mutation_reports_server_message() {
    let (transport, client) = setup();
    transport.respond(Method::GET, "/categories", 200, categories(1, 1));
    transport.respond(
      Method::PATCH,
      "/categories/c0/toggle-active",
      409,
      json!({ "success": false, "message": "Category has active products" }),
    );
    let mut view: ListView<Category> = ListView::new(&client, 10);
    settle(&mut view).await;

    view.handle_key(key('t'));
    assert_eq!(
      outcome(&mut view).await,
      StatusMessage::error("Category has active products")
    );
  }

  #[tokio::test]
  async fn test_review_filter_tabs() {
    let (transport, client) = setup();
    transport.respond(Method::GET, "/admin/reviews", 200, json!({ "success": true, "data": [] }));
    let mut view: ListView<Review> = ListView::new(&client, 10);
    settle(&mut view).await;

    view.handle_key(key('f'));
    settle(&mut view).await;
    assert_eq!(
      transport.last_request().unwrap().params,
      Some(json!({ "page": 1, "limit": 10, "isApproved": false }))
    );
  }

  #[tokio::test]
  async fn test_sort_cycles_and_flips() {
    let (transport, client) = setup();
    transport.respond(Method::GET, "/categories", 200, categories(1, 1));
    let mut view: ListView<Category> = ListView::new(&client, 10);

    view.handle_key(key('s'));
    assert_eq!(view.table.sort(), Some(&Sort::new("name", SortOrder::Desc)));
    view.handle_key(key('o'));
    assert_eq!(view.table.sort(), Some(&Sort::new("name", SortOrder::Asc)));
    view.handle_key(key('s'));
    assert_eq!(view.table.sort(), Some(&Sort::new("createdAt", SortOrder::Asc)));
    view.handle_key(key('s'));
    assert_eq!(view.table.sort().map(|s| s.column.as_str()), Some("name"));

    view.handle_key(key('S'));
    assert_eq!(view.table.sort(), None);
    assert_eq!(view.table.params(), ListParams::page(1, 10));
  }

  #[tokio::test]
  async fn test_terminal_order_refuses_transition() {
    let (transport, client) = setup();
    transport.respond(
      Method::GET,
      "/orders/admin/all",
      200,
      json!({ "success": true, "data": [{ "id": "o1", "orderNumber": "ORD-1", "status": "delivered" }] }),
    );
    let mut view: ListView<Order> = ListView::new(&client, 10);
    settle(&mut view).await;

    match view.handle_key(key('m')) {
      ViewAction::Status(message) => {
        assert_eq!(message, StatusMessage::error("Order ORD-1 is already delivered"))
      }
      _ => panic!("expected a status message"),
    }
    assert!(transport.requests().iter().all(|r| r.method == Method::GET));
  }

  #[tokio::test]
  async fn test_client_paged_orders_never_refetch_on_paging() {
    let (transport, client) = setup();
    let data: Vec<_> = (0..15)
      .map(|i| json!({ "id": format!("o{}", i), "status": "pending" }))
      .collect();
    transport.respond(
      Method::GET,
      "/orders/admin/all",
      200,
      json!({ "success": true, "data": data }),
    );
    let mut view: ListView<Order> = ListView::new(&client, 10);
    settle(&mut view).await;

    view.handle_key(key('n'));
    view.tick();
    assert_eq!(view.table.rows().len(), 5);
    assert_eq!(transport.calls(Method::GET, "/orders/admin/all"), 1);
  }
}
