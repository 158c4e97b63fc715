use std::sync::Arc;

use crate::cache::CacheStore;
use crate::transport::Transport;

/// Handle passed to every endpoint, table and view.
///
/// Bundles the one cache store and the transport it fetches through. Clones
/// share both, so a test can build an isolated client around a mock.
#[derive(Clone)]
pub struct ApiClient {
  store: CacheStore,
  transport: Arc<dyn Transport>,
}

impl ApiClient {
  pub fn new(store: CacheStore, transport: Arc<dyn Transport>) -> Self {
    Self { store, transport }
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  pub fn transport(&self) -> &Arc<dyn Transport> {
    &self.transport
  }
}
