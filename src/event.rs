use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Application events
#[derive(Debug)]
pub enum Event {
  Key(KeyEvent),
  /// Terminal was resized; the next draw picks up the new area
  Resize,
  /// Periodic tick: views poll their queries and the cache collects garbage
  Tick,
}

/// Merges terminal input with a fixed-rate tick.
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's reader blocks, so it gets its own thread.
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      match event::poll(tick_rate) {
        Ok(false) => {
          if input_tx.is_closed() {
            break;
          }
        }
        Ok(true) => {
          let forwarded = match event::read() {
            Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
              input_tx.send(Event::Key(key))
            }
            Ok(CrosstermEvent::Resize(_, _)) => input_tx.send(Event::Resize),
            Ok(_) => Ok(()),
            Err(e) => {
              warn!(error = %e, "failed to read terminal event");
              Ok(())
            }
          };
          if forwarded.is_err() {
            break;
          }
        }
        Err(e) => {
          warn!(error = %e, "terminal event poll failed");
          break;
        }
      }
    });

    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
      loop {
        interval.tick().await;
        if tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
