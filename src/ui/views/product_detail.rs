use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::api::products::{self, Product};
use crate::api::types::{format_date, money};
use crate::api::{ItemResponse, ListResponse};
use crate::client::ApiClient;
use crate::query::{Query, QueryState};
use crate::ui::renderfns::{status_color, truncate};
use crate::ui::view::{PendingAction, ShortcutInfo, StatusMessage, View, ViewAction};

use super::entities::{AdminEntity, RowAction};

const RELATED_SHOWN: usize = 5;

/// One product, kept mounted so writes elsewhere refresh it.
pub struct ProductDetailView {
  client: ApiClient,
  name: String,
  query: Query<String, ItemResponse<Product>>,
  /// Mounted once the product id is known
  related: Option<Query<String, ListResponse<Product>>>,
  pending: Vec<PendingAction>,
  confirm_delete: bool,
}

impl ProductDetailView {
  pub fn new(client: &ApiClient, id: String, name: String) -> Self {
    Self::mount(client, products::GET.query(client, id), name)
  }

  /// Storefront lookup; the id comes from the response.
  pub fn by_slug(client: &ApiClient, slug: String, name: String) -> Self {
    Self::mount(client, products::BY_SLUG.query(client, slug), name)
  }

  fn mount(client: &ApiClient, query: Query<String, ItemResponse<Product>>, name: String) -> Self {
    let mut view = Self {
      client: client.clone(),
      name,
      query,
      related: None,
      pending: Vec::new(),
      confirm_delete: false,
    };
    view.mount_related();
    view
  }

  fn mount_related(&mut self) {
    if self.related.is_some() {
      return;
    }
    if let Some(id) = self.product().map(|p| p.id.clone()) {
      self.related = Some(products::RELATED.query(&self.client, id));
    }
  }

  fn product(&self) -> Option<&Product> {
    self.query.data().map(|response| &response.data)
  }

  fn related_names(&self) -> Vec<String> {
    let Some(response) = self.related.as_ref().and_then(|q| q.data()) else {
      return Vec::new();
    };
    response
      .data
      .iter()
      .take(RELATED_SHOWN)
      .map(|p| format!("{}  {}", truncate(&p.name, 40), money(p.effective_price())))
      .collect()
  }

  fn field<'a>(label: &'a str, value: impl Into<Span<'a>>) -> Line<'a> {
    Line::from(vec![
      Span::styled(format!("{:<12}", label), Style::default().fg(Color::DarkGray)),
      value.into(),
    ])
  }

  fn detail_lines(product: &Product) -> Vec<Line<'_>> {
    let price = if product.effective_price() < product.price {
      format!("{} (was {})", money(product.effective_price()), money(product.price))
    } else {
      money(product.price)
    };

    let mut lines = vec![
      Self::field("Name", Span::styled(product.name.as_str(), Style::default().bold())),
      Self::field("SKU", product.sku.as_str()),
      Self::field("Slug", product.slug.as_deref().unwrap_or("-")),
      Self::field("Category", product.category_name()),
      Self::field("Price", price),
      Self::field("Stock", product.stock.to_string()),
      Self::field(
        "Status",
        Span::styled(
          product.status.as_str(),
          Style::default().fg(status_color(&product.status)),
        ),
      ),
      Self::field(
        "Rating",
        format!("{:.1} ({} reviews)", product.avg_rating, product.review_count),
      ),
      Self::field("Featured", if product.is_featured { "yes" } else { "no" }),
      Self::field("Created", format_date(product.created_at.as_ref())),
      Self::field("Updated", format_date(product.updated_at.as_ref())),
      Line::raw(""),
    ];
    if let Some(short) = &product.short_description {
      lines.push(Line::styled(short.as_str(), Style::default().italic()));
    }
    lines.push(Line::raw(product.description.as_str()));
    lines
  }

  fn error_text(&self) -> Option<String> {
    let error = self.query.error()?;
    Some(if error.is_not_found() {
      format!("{} ({} may have been deleted)", error.message(), self.name)
    } else {
      format!("Error: {}", error.message())
    })
  }
}

impl View for ProductDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.confirm_delete {
      self.confirm_delete = false;
      if key.code != KeyCode::Char('y') {
        return ViewAction::Status(StatusMessage::info("Delete cancelled"));
      }
      let Some(action) = self.product().and_then(|p| p.delete(&self.client)) else {
        return ViewAction::None;
      };
      self.pending.push(action);
      return ViewAction::Status(StatusMessage::info("Deleting..."));
    }

    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
        if let Some(related) = self.related.as_mut() {
          related.refetch();
        }
      }
      KeyCode::Char('D') if self.product().is_some() => {
        self.confirm_delete = true;
        return ViewAction::Status(StatusMessage::info(format!("Delete {}? (y/n)", self.name)));
      }
      KeyCode::Char(c @ ('t' | 'x')) => {
        match self.product().and_then(|p| p.row_action(c, &self.client)) {
          Some(RowAction::Run(action)) => {
            self.pending.push(action);
            return ViewAction::Status(StatusMessage::info("Working..."));
          }
          Some(RowAction::Refused(reason)) => return ViewAction::Status(StatusMessage::error(reason)),
          Some(RowAction::Open(view)) => return ViewAction::Push(view),
          None => {}
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.name),
      QueryState::Refetching(_) => format!(" {} (refreshing...) ", self.name),
      _ => format!(" {} ", self.name),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let error = self.error_text();
    let error_height = if error.is_some() { 2 } else { 0 };
    let related = self.related_names();
    let related_height = if related.is_empty() { 0 } else { related.len() as u16 + 1 };
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(error_height),
        Constraint::Min(1),
        Constraint::Length(related_height),
      ])
      .split(inner);

    if !related.is_empty() {
      let mut lines = vec![Line::styled("Related", Style::default().fg(Color::Yellow).bold())];
      lines.extend(related.into_iter().map(Line::raw));
      frame.render_widget(Paragraph::new(lines), chunks[2]);
    }

    if let Some(error) = error {
      let paragraph = Paragraph::new(format!("{}  Press 'r' to retry.", error))
        .style(Style::default().fg(Color::Red))
        .wrap(Wrap { trim: true });
      frame.render_widget(paragraph, chunks[0]);
    }

    match self.product() {
      Some(product) => {
        // Last good copy stays visible under an error, dimmed
        let style = if self.query.is_error() {
          Style::default().fg(Color::DarkGray)
        } else {
          Style::default()
        };
        let paragraph = Paragraph::new(Self::detail_lines(product))
          .style(style)
          .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, chunks[1]);
      }
      None if self.query.is_loading() => {
        let paragraph =
          Paragraph::new("Loading product...").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, chunks[1]);
      }
      None => {}
    }
  }

  fn breadcrumb_label(&self) -> String {
    self.name.clone()
  }

  fn tick(&mut self) -> Option<StatusMessage> {
    self.query.poll();
    self.mount_related();
    if let Some(related) = self.related.as_mut() {
      related.poll();
    }

    let mut latest = None;
    self.pending.retain_mut(|action| match action.poll() {
      Some(message) => {
        latest = Some(message);
        false
      }
      None => true,
    });
    latest
  }

  fn is_capturing_input(&self) -> bool {
    self.confirm_delete
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("t", "feature").with_priority(60),
      ShortcutInfo::new("x", "stock").with_priority(61),
      ShortcutInfo::new("D", "delete").with_priority(70),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
