use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};

use crate::api::products::{self, Product};
use crate::api::types::money;
use crate::api::ListResponse;
use crate::client::ApiClient;
use crate::query::{Query, QueryEndpoint};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, StatusMessage, View, ViewAction};

use super::ProductDetailView;

type Collection = QueryEndpoint<(), ListResponse<Product>>;

const TABS: [(&str, Collection); 3] = [
  ("Featured", products::FEATURED),
  ("New arrivals", products::NEW_ARRIVALS),
  ("Top rated", products::TOP_RATED),
];

/// Storefront product collections, one mounted at a time.
pub struct ShowcaseView {
  client: ApiClient,
  tab: usize,
  query: Query<(), ListResponse<Product>>,
  table_state: TableState,
}

impl ShowcaseView {
  pub fn new(client: &ApiClient) -> Self {
    Self {
      client: client.clone(),
      tab: 0,
      query: TABS[0].1.query(client, ()),
      table_state: TableState::default().with_selected(Some(0)),
    }
  }

  fn rows(&self) -> &[Product] {
    self.query.data().map(|r| r.data.as_slice()).unwrap_or_default()
  }

  fn switch_tab(&mut self) {
    self.tab = (self.tab + 1) % TABS.len();
    // Replacing the query releases the previous collection
    self.query = TABS[self.tab].1.query(&self.client, ());
    self.table_state.select(Some(0));
  }

  fn move_selection(&mut self, forward: bool) {
    let len = self.rows().len();
    if len == 0 {
      return;
    }
    let current = self.table_state.selected().unwrap_or(0).min(len - 1);
    let next = if forward { (current + 1) % len } else { (current + len - 1) % len };
    self.table_state.select(Some(next));
  }

  fn open_selected(&self) -> ViewAction {
    let Some(product) = self.table_state.selected().and_then(|i| self.rows().get(i)) else {
      return ViewAction::None;
    };
    let view = match &product.slug {
      Some(slug) if !slug.is_empty() => {
        ProductDetailView::by_slug(&self.client, slug.clone(), product.name.clone())
      }
      _ => ProductDetailView::new(&self.client, product.id.clone(), product.name.clone()),
    };
    ViewAction::Push(Box::new(view))
  }

  fn tab_line(&self) -> Line<'static> {
    let mut spans = Vec::new();
    for (idx, (label, _)) in TABS.iter().enumerate() {
      if idx > 0 {
        spans.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
      }
      let style = if idx == self.tab {
        Style::default().fg(Color::Cyan).bold()
      } else {
        Style::default().fg(Color::Gray)
      };
      spans.push(Span::styled(*label, style));
    }
    Line::from(spans)
  }
}

impl View for ShowcaseView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(true),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(false),
      KeyCode::Tab | KeyCode::Char('f') => self.switch_tab(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Enter => return self.open_selected(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(3)])
      .split(area);
    frame.render_widget(Paragraph::new(self.tab_line()), chunks[0]);

    let block = Block::default()
      .title(format!(" {} ", TABS[self.tab].0))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if let Some(error) = self.query.error() {
      let paragraph = Paragraph::new(format!("Error: {}\n\nPress 'r' to retry.", error.message()))
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, chunks[1]);
      return;
    }
    if self.query.data().is_none() {
      let paragraph = Paragraph::new("Loading...")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, chunks[1]);
      return;
    }

    let rows: Vec<Row> = self
      .rows()
      .iter()
      .map(|p| {
        Row::new(vec![
          Cell::from(truncate(&p.name, 48)),
          Cell::from(truncate(p.category_name(), 16)),
          Cell::from(money(p.effective_price())),
          Cell::from(format!("{:.1}", p.avg_rating)),
        ])
      })
      .collect();
    ensure_valid_selection(&mut self.table_state, rows.len());

    let table = Table::new(
      rows,
      [
        Constraint::Min(24),
        Constraint::Length(16),
        Constraint::Length(10),
        Constraint::Length(7),
      ],
    )
    .header(
      Row::new(vec!["Name", "Category", "Price", "Rating"])
        .style(Style::default().fg(Color::Yellow).bold()),
    )
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ");
    frame.render_stateful_widget(table, chunks[1], &mut self.table_state);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Showcase [{}]", TABS[self.tab].0)
  }

  fn tick(&mut self) -> Option<StatusMessage> {
    self.query.poll();
    None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("tab", "collection").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("enter", "details").with_priority(55),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheStore;
  use crate::transport::mock::MockTransport;
  use crossterm::event::KeyModifiers;
  use reqwest::Method;
  use serde_json::json;
  use std::sync::Arc;

  #[tokio::test]
  async fn test_switching_tabs_mounts_next_collection() {
    let transport = MockTransport::new();
    let client = ApiClient::new(CacheStore::new(), Arc::new(transport.clone()));
    transport.respond(
      Method::GET,
      "/products/featured",
      200,
      json!({ "success": true, "data": [{ "id": "p1", "name": "Blue mug", "slug": "blue-mug" }] }),
    );
    transport.respond(
      Method::GET,
      "/products/new-arrivals",
      200,
      json!({ "success": true, "data": [] }),
    );

    let mut view = ShowcaseView::new(&client);
    view.query.settled().await;
    assert_eq!(view.rows().len(), 1);

    view.handle_key(KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE));
    view.query.settled().await;
    assert_eq!(view.breadcrumb_label(), "Showcase [New arrivals]");
    assert!(view.rows().is_empty());
    assert_eq!(transport.calls(Method::GET, "/products/new-arrivals"), 1);
  }

  #[tokio::test]
  async fn test_enter_opens_detail_by_slug() {
    let transport = MockTransport::new();
    let client = ApiClient::new(CacheStore::new(), Arc::new(transport.clone()));
    transport.respond(
      Method::GET,
      "/products/featured",
      200,
      json!({ "success": true, "data": [{ "id": "p1", "name": "Blue mug", "slug": "blue-mug" }] }),
    );
    transport.respond(
      Method::GET,
      "/products/slug/blue-mug",
      200,
      json!({ "success": true, "data": { "id": "p1", "name": "Blue mug" } }),
    );

    let mut view = ShowcaseView::new(&client);
    view.query.settled().await;

    let action = view.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    let ViewAction::Push(detail) = action else {
      panic!("expected the detail view to be pushed");
    };
    assert_eq!(detail.breadcrumb_label(), "Blue mug");
    assert_eq!(transport.calls(Method::GET, "/products/slug/blue-mug"), 1);
  }
}
