use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use serde_json::Value;

/// One tab of a server-side filter. `value: None` means "don't filter".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterTab {
  pub label: &'static str,
  pub value: Option<bool>,
}

/// A query-string filter presented as a row of tabs.
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
  /// Query parameter name, e.g. `isApproved`
  pub param: &'static str,
  pub tabs: &'static [FilterTab],
}

/// Tab row with a wrapping selection.
#[derive(Debug, Clone)]
pub struct FilterTabs {
  spec: FilterSpec,
  selected: usize,
}

impl FilterTabs {
  pub fn new(spec: FilterSpec) -> Self {
    Self { spec, selected: 0 }
  }

  pub fn param(&self) -> &'static str {
    self.spec.param
  }

  pub fn selected(&self) -> Option<&FilterTab> {
    self.spec.tabs.get(self.selected)
  }

  /// The parameter value for the selected tab.
  pub fn value(&self) -> Option<Value> {
    self.selected().and_then(|tab| tab.value).map(Value::Bool)
  }

  pub fn cycle(&mut self) {
    if !self.spec.tabs.is_empty() {
      self.selected = (self.selected + 1) % self.spec.tabs.len();
    }
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(
      format!("[{}] ", self.spec.param),
      Style::default().fg(Color::Yellow),
    )];

    for (idx, tab) in self.spec.tabs.iter().enumerate() {
      if idx > 0 {
        spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
      }
      let style = if idx == self.selected {
        Style::default().fg(Color::Black).bg(Color::Cyan)
      } else {
        Style::default().fg(Color::Gray)
      };
      spans.push(Span::styled(format!(" {} ", tab.label), style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }
}
