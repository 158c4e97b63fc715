//! Per-entity table definitions consumed by [`ListView`](super::ListView).

use ratatui::prelude::*;
use ratatui::widgets::Cell;
use serde::de::DeserializeOwned;

use crate::api::orders::{Order, OrderStatus};
use crate::api::plans::Plan;
use crate::api::products::{Product, ProductInput, DEFAULT_SORT_COLUMN};
use crate::api::reviews::{ApproveInput, DeleteReviewInput, Review, APPROVAL_FILTER};
use crate::api::types::{format_date, money};
use crate::api::{categories, orders, plans, products, reviews};
use crate::api::{ListParams, ListResponse, SortOrder, StatusInput, UpdateInput};
use crate::api::categories::Category;
use crate::client::ApiClient;
use crate::query::QueryEndpoint;
use crate::table::{PagingMode, Sort};
use crate::ui::components::{FilterSpec, FilterTab};
use crate::ui::renderfns::{status_color, truncate};
use crate::ui::view::{PendingAction, ShortcutInfo, View};

use super::ProductDetailView;

#[derive(Debug, Clone, Copy)]
pub struct Column {
  pub title: &'static str,
  pub width: Constraint,
  /// Server-side sort key, when the column can be sorted
  pub sort_key: Option<&'static str>,
}

impl Column {
  const fn new(title: &'static str, width: Constraint) -> Self {
    Self {
      title,
      width,
      sort_key: None,
    }
  }

  const fn sortable(mut self, key: &'static str) -> Self {
    self.sort_key = Some(key);
    self
  }
}

/// What a row key press turned into.
pub enum RowAction {
  Run(PendingAction),
  /// The action does not apply to this row
  Refused(String),
  Open(Box<dyn View>),
}

pub trait AdminEntity: DeserializeOwned + Sized + 'static {
  const LABEL: &'static str;
  const COLUMNS: &'static [Column];

  fn endpoint() -> QueryEndpoint<ListParams, ListResponse<Self>>;

  fn paging() -> PagingMode;

  fn default_sort() -> Option<Sort> {
    None
  }

  fn filter() -> Option<FilterSpec> {
    None
  }

  fn id(&self) -> &str;

  /// Short human name for prompts
  fn display_name(&self) -> String;

  fn cells(&self) -> Vec<Cell<'static>>;

  /// `None` when the entity cannot be deleted from the console.
  fn delete(&self, _client: &ApiClient) -> Option<PendingAction> {
    None
  }

  /// Entity-specific keys (`t` and friends) and Enter.
  fn row_action(&self, _key: char, _client: &ApiClient) -> Option<RowAction> {
    None
  }

  fn action_hints() -> &'static [ShortcutInfo] {
    &[]
  }
}

fn status_cell(status: &str) -> Cell<'static> {
  Cell::from(Span::styled(
    status.to_string(),
    Style::default().fg(status_color(status)),
  ))
}

fn flag_cell(on: bool, yes: &'static str, no: &'static str) -> Cell<'static> {
  if on {
    Cell::from(Span::styled(yes, Style::default().fg(Color::Green)))
  } else {
    Cell::from(Span::styled(no, Style::default().fg(Color::DarkGray)))
  }
}

// Categories

impl AdminEntity for Category {
  const LABEL: &'static str = "Categories";
  const COLUMNS: &'static [Column] = &[
    Column::new("Name", Constraint::Min(20)).sortable("name"),
    Column::new("Slug", Constraint::Length(20)),
    Column::new("Products", Constraint::Length(9)),
    Column::new("Active", Constraint::Length(8)),
    Column::new("Created", Constraint::Length(13)).sortable("createdAt"),
  ];

  fn endpoint() -> QueryEndpoint<ListParams, ListResponse<Self>> {
    categories::LIST
  }

  fn paging() -> PagingMode {
    PagingMode::Server
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn display_name(&self) -> String {
    self.name.clone()
  }

  fn cells(&self) -> Vec<Cell<'static>> {
    vec![
      Cell::from(truncate(&self.name, 40)),
      Cell::from(truncate(&self.slug, 20)),
      Cell::from(self.product_count().to_string()),
      flag_cell(self.is_active, "active", "inactive"),
      Cell::from(format_date(self.created_at.as_ref())),
    ]
  }

  fn delete(&self, client: &ApiClient) -> Option<PendingAction> {
    let pending = categories::DELETE.spawn(client, self.id.clone());
    Some(PendingAction::new(pending, "Category deleted"))
  }

  fn row_action(&self, key: char, client: &ApiClient) -> Option<RowAction> {
    if key != 't' {
      return None;
    }
    let activate = !self.is_active;
    let pending = categories::TOGGLE_ACTIVE.spawn(
      client,
      StatusInput {
        id: self.id.clone(),
        status: activate,
      },
    );
    let text = if activate {
      "Category activated"
    } else {
      "Category deactivated"
    };
    Some(RowAction::Run(PendingAction::new(pending, text)))
  }

  fn action_hints() -> &'static [ShortcutInfo] {
    const HINTS: &[ShortcutInfo] = &[ShortcutInfo::new("t", "toggle active").with_priority(60)];
    HINTS
  }
}

// Products

impl AdminEntity for Product {
  const LABEL: &'static str = "Products";
  const COLUMNS: &'static [Column] = &[
    Column::new("Name", Constraint::Min(24)).sortable("name"),
    Column::new("Category", Constraint::Length(16)),
    Column::new("Price", Constraint::Length(10)).sortable("price"),
    Column::new("Stock", Constraint::Length(7)).sortable("stock"),
    Column::new("Status", Constraint::Length(13)),
    Column::new("Featured", Constraint::Length(9)),
    Column::new("Created", Constraint::Length(13)).sortable(DEFAULT_SORT_COLUMN),
  ];

  fn endpoint() -> QueryEndpoint<ListParams, ListResponse<Self>> {
    products::LIST
  }

  fn paging() -> PagingMode {
    PagingMode::Server
  }

  fn default_sort() -> Option<Sort> {
    Some(Sort::new(DEFAULT_SORT_COLUMN, SortOrder::Desc))
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn display_name(&self) -> String {
    self.name.clone()
  }

  fn cells(&self) -> Vec<Cell<'static>> {
    vec![
      Cell::from(truncate(&self.name, 48)),
      Cell::from(truncate(self.category_name(), 16)),
      Cell::from(money(self.effective_price())),
      Cell::from(self.stock.to_string()),
      status_cell(&self.status),
      flag_cell(self.is_featured, "yes", "-"),
      Cell::from(format_date(self.created_at.as_ref())),
    ]
  }

  fn delete(&self, client: &ApiClient) -> Option<PendingAction> {
    let pending = products::DELETE.spawn(client, self.id.clone());
    Some(PendingAction::new(pending, "Product deleted"))
  }

  fn row_action(&self, key: char, client: &ApiClient) -> Option<RowAction> {
    match key {
      '\n' => Some(RowAction::Open(Box::new(ProductDetailView::new(
        client,
        self.id.clone(),
        self.name.clone(),
      )))),
      't' => {
        let featured = !self.is_featured;
        let pending = products::UPDATE.spawn(
          client,
          UpdateInput {
            id: self.id.clone(),
            data: ProductInput {
              is_featured: Some(featured),
              ..ProductInput::default()
            },
          },
        );
        let text = if featured {
          "Product featured"
        } else {
          "Product unfeatured"
        };
        Some(RowAction::Run(PendingAction::new(pending, text)))
      }
      'x' => {
        let status = self.next_stock_status();
        let pending = products::UPDATE_STOCK.spawn(
          client,
          StatusInput {
            id: self.id.clone(),
            status: status.to_string(),
          },
        );
        Some(RowAction::Run(PendingAction::new(
          pending,
          format!("Stock status set to {}", status),
        )))
      }
      _ => None,
    }
  }

  fn action_hints() -> &'static [ShortcutInfo] {
    const HINTS: &[ShortcutInfo] = &[
      ShortcutInfo::new("enter", "details").with_priority(55),
      ShortcutInfo::new("t", "feature").with_priority(60),
      ShortcutInfo::new("x", "stock").with_priority(61),
    ];
    HINTS
  }
}

// Orders

impl Order {
  fn transition(&self, target: OrderStatus, client: &ApiClient) -> RowAction {
    if !self.admin_transitions().contains(&target) {
      return RowAction::Refused(format!(
        "Order {} is already {}",
        self.order_number, self.status
      ));
    }
    let pending = orders::UPDATE_STATUS.spawn(
      client,
      StatusInput {
        id: self.id.clone(),
        status: target,
      },
    );
    RowAction::Run(PendingAction::new(
      pending,
      format!("Order marked as {}", target),
    ))
  }
}

impl AdminEntity for Order {
  const LABEL: &'static str = "Orders";
  const COLUMNS: &'static [Column] = &[
    Column::new("Order #", Constraint::Length(16)),
    Column::new("Customer", Constraint::Min(18)),
    Column::new("Email", Constraint::Length(26)),
    Column::new("Total", Constraint::Length(11)),
    Column::new("Payment", Constraint::Length(10)),
    Column::new("Status", Constraint::Length(11)),
    Column::new("Date", Constraint::Length(13)),
  ];

  fn endpoint() -> QueryEndpoint<ListParams, ListResponse<Self>> {
    orders::LIST
  }

  fn paging() -> PagingMode {
    PagingMode::Client
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn display_name(&self) -> String {
    self.order_number.clone()
  }

  fn cells(&self) -> Vec<Cell<'static>> {
    vec![
      Cell::from(self.order_number.clone()),
      Cell::from(truncate(self.customer_name(), 30)),
      Cell::from(truncate(self.customer_email(), 26)),
      Cell::from(money(self.grand_total)),
      status_cell(&self.payment_status),
      status_cell(&self.status),
      Cell::from(format_date(self.created_at.as_ref())),
    ]
  }

  fn row_action(&self, key: char, client: &ApiClient) -> Option<RowAction> {
    match key {
      't' => Some(self.transition(OrderStatus::Delivered, client)),
      'm' => Some(self.transition(OrderStatus::Processing, client)),
      _ => None,
    }
  }

  fn action_hints() -> &'static [ShortcutInfo] {
    const HINTS: &[ShortcutInfo] = &[
      ShortcutInfo::new("t", "delivered").with_priority(60),
      ShortcutInfo::new("m", "processing").with_priority(61),
    ];
    HINTS
  }
}

// Reviews

const APPROVAL_TABS: &[FilterTab] = &[
  FilterTab {
    label: "All",
    value: None,
  },
  FilterTab {
    label: "Pending",
    value: Some(false),
  },
  FilterTab {
    label: "Approved",
    value: Some(true),
  },
];

impl AdminEntity for Review {
  const LABEL: &'static str = "Reviews";
  const COLUMNS: &'static [Column] = &[
    Column::new("Product", Constraint::Length(22)),
    Column::new("Reviewer", Constraint::Length(18)),
    Column::new("Rating", Constraint::Length(7)).sortable("rating"),
    Column::new("Comment", Constraint::Min(20)),
    Column::new("Status", Constraint::Length(9)),
    Column::new("Date", Constraint::Length(13)).sortable("createdAt"),
  ];

  fn endpoint() -> QueryEndpoint<ListParams, ListResponse<Self>> {
    reviews::LIST
  }

  fn paging() -> PagingMode {
    PagingMode::Server
  }

  fn filter() -> Option<FilterSpec> {
    Some(FilterSpec {
      param: APPROVAL_FILTER,
      tabs: APPROVAL_TABS,
    })
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn display_name(&self) -> String {
    format!("review by {}", self.reviewer_name())
  }

  fn cells(&self) -> Vec<Cell<'static>> {
    vec![
      Cell::from(truncate(self.product_name(), 22)),
      Cell::from(truncate(&self.reviewer_name(), 18)),
      Cell::from(Span::styled(self.stars(), Style::default().fg(Color::Yellow))),
      Cell::from(truncate(&self.comment, 60)),
      flag_cell(self.is_approved, "approved", "pending"),
      Cell::from(format_date(self.created_at.as_ref())),
    ]
  }

  fn delete(&self, client: &ApiClient) -> Option<PendingAction> {
    let pending = reviews::DELETE.spawn(
      client,
      DeleteReviewInput {
        review_id: self.id.clone(),
        product_id: self.product_id.clone(),
      },
    );
    Some(PendingAction::new(pending, "Review deleted"))
  }

  fn row_action(&self, key: char, client: &ApiClient) -> Option<RowAction> {
    if key != 't' {
      return None;
    }
    let approve = !self.is_approved;
    let pending = reviews::APPROVE.spawn(
      client,
      ApproveInput {
        review_id: self.id.clone(),
        approve,
      },
    );
    let text = if approve {
      "Review approved"
    } else {
      "Review unapproved"
    };
    Some(RowAction::Run(PendingAction::new(pending, text)))
  }

  fn action_hints() -> &'static [ShortcutInfo] {
    const HINTS: &[ShortcutInfo] = &[
      ShortcutInfo::new("t", "approve").with_priority(60),
      ShortcutInfo::new("f", "filter").with_priority(61),
    ];
    HINTS
  }
}

// Plans

impl AdminEntity for Plan {
  const LABEL: &'static str = "Plans";
  const COLUMNS: &'static [Column] = &[
    Column::new("Name", Constraint::Length(18)),
    Column::new("Price", Constraint::Length(10)),
    Column::new("Cycle", Constraint::Length(10)),
    Column::new("Limits", Constraint::Min(30)),
    Column::new("Status", Constraint::Length(9)),
  ];

  fn endpoint() -> QueryEndpoint<ListParams, ListResponse<Self>> {
    plans::LIST
  }

  fn paging() -> PagingMode {
    PagingMode::Client
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn display_name(&self) -> String {
    self.name.clone()
  }

  fn cells(&self) -> Vec<Cell<'static>> {
    vec![
      Cell::from(truncate(&self.name, 18)),
      Cell::from(money(self.price)),
      Cell::from(self.billing_cycle.clone()),
      Cell::from(self.limits_summary()),
      status_cell(&self.status),
    ]
  }

  fn delete(&self, client: &ApiClient) -> Option<PendingAction> {
    let pending = plans::DELETE.spawn(client, self.id.clone());
    Some(PendingAction::new(pending, "Plan deleted"))
  }
}
