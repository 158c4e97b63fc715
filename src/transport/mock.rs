//! Scripted transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::watch;

use super::{normalize, Request, Transport, TransportFuture};

type Route = (Method, String);

#[derive(Default)]
struct MockState {
  responses: HashMap<Route, (u16, Value)>,
  queued: HashMap<Route, VecDeque<(u16, Value)>>,
  calls: Vec<Request>,
}

/// Transport that answers from a script and records every request.
///
/// Calls are recorded when `request` is invoked, not when the future is
/// polled, so de-duplication can be asserted synchronously. While the gate is
/// closed, responses are held back until `open_gate` is called.
#[derive(Clone)]
pub struct MockTransport {
  state: Arc<Mutex<MockState>>,
  gate: Arc<watch::Sender<bool>>,
}

impl MockTransport {
  pub fn new() -> Self {
    let (gate, _) = watch::channel(true);
    Self {
      state: Arc::new(Mutex::new(MockState::default())),
      gate: Arc::new(gate),
    }
  }

  /// Answer every `method path` request with `status` and `body` until replaced.
  pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
    let mut state = self.state.lock().unwrap();
    state
      .responses
      .insert((method, path.to_string()), (status, body));
  }

  /// Answer the next `method path` request only, then fall back to `respond`.
  pub fn respond_once(&self, method: Method, path: &str, status: u16, body: Value) {
    let mut state = self.state.lock().unwrap();
    state
      .queued
      .entry((method, path.to_string()))
      .or_default()
      .push_back((status, body));
  }

  pub fn close_gate(&self) {
    self.gate.send_replace(false);
  }

  pub fn open_gate(&self) {
    self.gate.send_replace(true);
  }

  /// Number of requests issued for `method path`.
  pub fn calls(&self, method: Method, path: &str) -> usize {
    let state = self.state.lock().unwrap();
    state
      .calls
      .iter()
      .filter(|r| r.method == method && r.path == path)
      .count()
  }

  pub fn requests(&self) -> Vec<Request> {
    self.state.lock().unwrap().calls.clone()
  }

  pub fn last_request(&self) -> Option<Request> {
    self.state.lock().unwrap().calls.last().cloned()
  }
}

impl Transport for MockTransport {
  fn request(&self, request: Request) -> TransportFuture {
    let route = (request.method.clone(), request.path.clone());
    self.state.lock().unwrap().calls.push(request);

    let state = Arc::clone(&self.state);
    let mut gate = self.gate.subscribe();
    Box::pin(async move {
      let _ = gate.wait_for(|open| *open).await;

      let (status, body) = {
        let mut state = state.lock().unwrap();
        let queued = state.queued.get_mut(&route).and_then(VecDeque::pop_front);
        queued
          .or_else(|| state.responses.get(&route).cloned())
          .unwrap_or_else(|| (404, json!({ "success": false, "message": "Not found" })))
      };
      normalize(status, body)
    })
  }
}
