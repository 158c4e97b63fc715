use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::api::MutationResponse;
use crate::mutation::PendingMutation;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  /// Lower is shown first
  pub priority: u8,
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
  Info,
  Success,
  Error,
}

/// One-line outcome shown in the footer until replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
  pub kind: StatusKind,
  pub text: String,
}

impl StatusMessage {
  pub fn info(text: impl Into<String>) -> Self {
    Self {
      kind: StatusKind::Info,
      text: text.into(),
    }
  }

  pub fn success(text: impl Into<String>) -> Self {
    Self {
      kind: StatusKind::Success,
      text: text.into(),
    }
  }

  pub fn error(text: impl Into<String>) -> Self {
    Self {
      kind: StatusKind::Error,
      text: text.into(),
    }
  }
}

/// A mutation started from a view, reported in the footer when it settles.
pub struct PendingAction {
  pending: PendingMutation<MutationResponse>,
  success: String,
}

impl PendingAction {
  pub fn new(pending: PendingMutation<MutationResponse>, success: impl Into<String>) -> Self {
    Self {
      pending,
      success: success.into(),
    }
  }

  /// The outcome once the mutation settles. The server's message wins over
  /// the fallback text.
  pub fn poll(&mut self) -> Option<StatusMessage> {
    self.pending.poll().map(|result| match result {
      Ok(response) => StatusMessage::success(response.message_or(&self.success)),
      Err(err) => StatusMessage::error(err.message().to_string()),
    })
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  None,
  Push(Box<dyn View>),
  Pop,
  Status(StatusMessage),
}

/// A screen on the view stack.
///
/// Views own their queries and poll them in [`View::tick`]. App only routes
/// keys and draws the chrome around them.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// Poll queries and pending mutations. A settled mutation reports back here.
  fn tick(&mut self) -> Option<StatusMessage> {
    None
  }

  /// True while a text prompt owns the keyboard, so App leaves `:` and `q` alone
  fn is_capturing_input(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transport::ErrorInfo;
  use serde_json::json;

  #[tokio::test]
  async fn test_pending_action_prefers_server_message() {
    let mut action = PendingAction::new(
      PendingMutation::spawn(async {
        Ok(MutationResponse {
          success: true,
          message: Some("Review approved".to_string()),
          data: None,
        })
      }),
      "Done",
    );
    let message = loop {
      if let Some(message) = action.poll() {
        break message;
      }
      tokio::task::yield_now().await;
    };
    assert_eq!(message, StatusMessage::success("Review approved"));
  }

  #[tokio::test]
  async fn test_pending_action_reports_error() {
    let mut action = PendingAction::new(
      PendingMutation::spawn(async {
        Err(ErrorInfo::from_response(
          409,
          json!({ "success": false, "message": "Category has products" }),
        ))
      }),
      "Deleted",
    );
    let message = loop {
      if let Some(message) = action.poll() {
        break message;
      }
      tokio::task::yield_now().await;
    };
    assert_eq!(message, StatusMessage::error("Category has products"));
  }
}
