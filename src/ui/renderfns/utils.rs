use ratatui::prelude::Color;

/// Truncate to `max_len` characters, ending in "..." when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    return s.to_string();
  }
  let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
  format!("{}...", kept)
}

/// Display color for a record status (order, stock, review, active flag).
pub fn status_color(status: &str) -> Color {
  match status.to_ascii_lowercase().as_str() {
    "delivered" | "approved" | "active" | "paid" | "in_stock" => Color::Green,
    "pending" | "processing" | "shipped" | "low_stock" => Color::Yellow,
    "cancelled" | "inactive" | "failed" | "out_of_stock" | "refunded" => Color::Red,
    _ => Color::White,
  }
}
