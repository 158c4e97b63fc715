//! Paginated table controller.
//!
//! Owns the page, page size, search, sort and filter state of one table and
//! turns it into [`ListParams`] for a list endpoint. Server-paginated
//! endpoints receive `page`/`limit`; endpoints that return the full
//! collection are sliced locally and never see them.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::types::{ListParams, ListResponse, SortOrder};
use crate::client::ApiClient;
use crate::query::{Query, QueryEndpoint, QueryState};
use crate::transport::ErrorInfo;

/// Page sizes offered by the size selector.
pub const PAGE_SIZES: [usize; 5] = [10, 20, 30, 40, 50];

/// `ceil(total_rows / page_size)`, never less than 1.
pub fn total_pages(total_rows: usize, page_size: usize) -> usize {
  if total_rows == 0 || page_size == 0 {
    return 1;
  }
  total_rows.div_ceil(page_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
  pub page_index: usize,
  pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
  pub column: String,
  pub order: SortOrder,
}

impl Sort {
  pub fn new(column: impl Into<String>, order: SortOrder) -> Self {
    Self {
      column: column.into(),
      order,
    }
  }
}

/// Where paging happens for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
  /// The backend pages; `page`/`limit` go on the request.
  Server,
  /// The backend returns everything; rows are sliced here.
  Client,
}

#[derive(Debug, Clone)]
pub struct TableOptions {
  pub mode: PagingMode,
  pub page_size: usize,
  pub default_sort: Option<Sort>,
}

impl TableOptions {
  pub fn new(mode: PagingMode, page_size: usize) -> Self {
    Self {
      mode,
      page_size: page_size.max(1),
      default_sort: None,
    }
  }

  pub fn with_sort(mut self, sort: Sort) -> Self {
    self.default_sort = Some(sort);
    self
  }
}

/// What the renderer should draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
  Loading,
  Error,
  Empty,
  Ready,
}

pub struct PaginatedTable<R> {
  query: Query<ListParams, ListResponse<R>>,
  mode: PagingMode,
  pagination: PaginationState,
  search: Option<String>,
  sort: Option<Sort>,
  filters: BTreeMap<String, Value>,
  /// Last total seen, kept while a new page loads so the pager stays usable
  last_total: Option<usize>,
}

impl<R: DeserializeOwned> PaginatedTable<R> {
  pub fn new(
    client: &ApiClient,
    endpoint: QueryEndpoint<ListParams, ListResponse<R>>,
    options: TableOptions,
  ) -> Self {
    let pagination = PaginationState {
      page_index: 0,
      page_size: options.page_size.max(1),
    };
    let params = build_params(options.mode, pagination, None, options.default_sort.as_ref(), &BTreeMap::new());
    Self {
      query: endpoint.query(client, params),
      mode: options.mode,
      pagination,
      search: None,
      sort: options.default_sort,
      filters: BTreeMap::new(),
      last_total: None,
    }
  }

  /// Query parameters for the current state.
  pub fn params(&self) -> ListParams {
    build_params(
      self.mode,
      self.pagination,
      self.search.as_deref(),
      self.sort.as_ref(),
      &self.filters,
    )
  }

  fn sync(&mut self) {
    let params = self.params();
    self.query.set_params(params);
  }

  pub fn mode(&self) -> PagingMode {
    self.mode
  }

  pub fn pagination(&self) -> PaginationState {
    self.pagination
  }

  pub fn search(&self) -> Option<&str> {
    self.search.as_deref()
  }

  pub fn sort(&self) -> Option<&Sort> {
    self.sort.as_ref()
  }

  pub fn filter(&self, name: &str) -> Option<&Value> {
    self.filters.get(name)
  }

  /// Jump to `page_index`, clamped to the known page range.
  pub fn set_page(&mut self, page_index: usize) {
    let page_index = page_index.min(self.total_pages() - 1);
    if page_index == self.pagination.page_index {
      return;
    }
    self.pagination.page_index = page_index;
    self.sync();
  }

  pub fn next_page(&mut self) {
    self.set_page(self.pagination.page_index + 1);
  }

  pub fn prev_page(&mut self) {
    self.set_page(self.pagination.page_index.saturating_sub(1));
  }

  /// Change the page size and go back to the first page.
  pub fn set_page_size(&mut self, page_size: usize) {
    if page_size == 0 {
      return;
    }
    self.pagination = PaginationState {
      page_index: 0,
      page_size,
    };
    self.sync();
  }

  /// Step through [`PAGE_SIZES`], wrapping at either end.
  pub fn cycle_page_size(&mut self, forward: bool) {
    let current = PAGE_SIZES
      .iter()
      .position(|size| *size == self.pagination.page_size);
    let next = match (current, forward) {
      (Some(i), true) => (i + 1) % PAGE_SIZES.len(),
      (Some(i), false) => (i + PAGE_SIZES.len() - 1) % PAGE_SIZES.len(),
      (None, _) => 0,
    };
    self.set_page_size(PAGE_SIZES[next]);
  }

  /// Commit a search term. Blank clears the search.
  pub fn set_search(&mut self, term: &str) {
    let term = term.trim();
    self.search = (!term.is_empty()).then(|| term.to_string());
    self.pagination.page_index = 0;
    self.sync();
  }

  pub fn set_sort(&mut self, sort: Sort) {
    self.sort = Some(sort);
    self.pagination.page_index = 0;
    self.sync();
  }

  pub fn clear_sort(&mut self) {
    self.sort = None;
    self.pagination.page_index = 0;
    self.sync();
  }

  /// Set or remove (`None`) an entity-specific filter.
  pub fn set_filter(&mut self, name: &str, value: Option<Value>) {
    match value {
      Some(value) => self.filters.insert(name.to_string(), value),
      None => self.filters.remove(name),
    };
    self.pagination.page_index = 0;
    self.sync();
  }

  pub fn refetch(&mut self) {
    self.query.refetch();
  }

  /// Poll the query. Returns `true` if anything visible changed.
  ///
  /// When a fresh result has fewer pages than the current index (rows were
  /// deleted on the last page), the index is pulled back to the last page.
  pub fn tick(&mut self) -> bool {
    let changed = self.query.poll();
    if let Some(data) = self.query.data() {
      self.last_total = Some(self.mode_total(data));
    }

    if self.query.fresh_data().is_some() {
      let last_page = self.total_pages() - 1;
      if self.pagination.page_index > last_page {
        self.pagination.page_index = last_page;
        self.sync();
        return true;
      }
    }
    changed
  }

  fn mode_total(&self, data: &ListResponse<R>) -> usize {
    match self.mode {
      PagingMode::Server => data
        .total()
        .map(|total| total as usize)
        .unwrap_or(data.data.len()),
      PagingMode::Client => data.data.len(),
    }
  }

  /// Rows of the current page.
  pub fn rows(&self) -> &[R] {
    let Some(data) = self.query.data() else {
      return &[];
    };
    match self.mode {
      PagingMode::Server => &data.data,
      PagingMode::Client => {
        let len = data.data.len();
        let start = (self.pagination.page_index * self.pagination.page_size).min(len);
        let end = (start + self.pagination.page_size).min(len);
        &data.data[start..end]
      }
    }
  }

  pub fn total_rows(&self) -> usize {
    match self.query.data() {
      Some(data) => self.mode_total(data),
      None => self.last_total.unwrap_or(0),
    }
  }

  pub fn total_pages(&self) -> usize {
    total_pages(self.total_rows(), self.pagination.page_size)
  }

  pub fn status(&self) -> TableStatus {
    match self.query.state() {
      QueryState::Idle | QueryState::Loading => TableStatus::Loading,
      QueryState::Error { .. } if self.rows().is_empty() => TableStatus::Error,
      _ if self.rows().is_empty() => TableStatus::Empty,
      _ => TableStatus::Ready,
    }
  }

  /// First load in flight, nothing to show yet.
  pub fn is_loading(&self) -> bool {
    self.query.is_loading()
  }

  /// Any fetch in flight, including a refresh behind visible rows.
  pub fn is_fetching(&self) -> bool {
    self.query.is_fetching()
  }

  pub fn is_error(&self) -> bool {
    self.query.is_error()
  }

  pub fn error(&self) -> Option<&ErrorInfo> {
    self.query.error()
  }

  pub fn query(&self) -> &Query<ListParams, ListResponse<R>> {
    &self.query
  }

  /// Wait for in-flight fetches, then poll.
  pub async fn settled(&mut self) {
    self.query.settled().await;
    self.tick();
  }
}

fn build_params(
  mode: PagingMode,
  pagination: PaginationState,
  search: Option<&str>,
  sort: Option<&Sort>,
  filters: &BTreeMap<String, Value>,
) -> ListParams {
  let (page, limit) = match mode {
    PagingMode::Server => (Some(pagination.page_index + 1), Some(pagination.page_size)),
    PagingMode::Client => (None, None),
  };
  ListParams {
    page,
    limit,
    search: search.map(str::to_string),
    sort_by: sort.map(|s| s.column.clone()),
    order: sort.map(|s| s.order),
    filters: filters.clone(),
  }
}
