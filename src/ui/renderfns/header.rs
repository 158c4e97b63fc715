use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::view::ShortcutInfo;

/// Header bar: app name, title, credential indicator and shortcut hints.
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  authenticated: bool,
  shortcuts: &[ShortcutInfo],
) {
  let (auth_label, auth_color) = if authenticated {
    (" signed in ", Color::Green)
  } else {
    (" no token ", Color::Red)
  };

  let mut spans = vec![
    Span::styled(" storedesk ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(auth_label, Style::default().fg(auth_color)),
    Span::raw("  "),
  ];

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);
  for (i, shortcut) in shortcuts.iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("  "));
    }
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
