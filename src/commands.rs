/// Palette commands and their fuzzy matching

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "categories",
    aliases: &["c", "cat", "category"],
    description: "Product categories",
  },
  Command {
    name: "products",
    aliases: &["p", "prod", "product"],
    description: "Product catalogue",
  },
  Command {
    name: "orders",
    aliases: &["o", "order"],
    description: "Customer orders",
  },
  Command {
    name: "reviews",
    aliases: &["r", "review"],
    description: "Review moderation",
  },
  Command {
    name: "plans",
    aliases: &["pl", "plan", "subscriptions"],
    description: "Subscription plans",
  },
  Command {
    name: "showcase",
    aliases: &["sc", "featured"],
    description: "Featured, new and top rated products",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit storedesk",
  },
];

/// Find a command by exact name or alias.
pub fn lookup(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == input || cmd.aliases.contains(&input.as_str()))
}

/// Ranked suggestions: exact name, exact alias, prefix, then substring.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let rank = |cmd: &Command| -> Option<u8> {
    if cmd.name == input {
      Some(0)
    } else if cmd.aliases.contains(&input.as_str()) {
      Some(1)
    } else if cmd.name.starts_with(&input) {
      Some(2)
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input)) {
      Some(3)
    } else if cmd.name.contains(&input) {
      Some(4)
    } else if cmd.aliases.iter().any(|a| a.contains(&input)) {
      Some(5)
    } else {
      None
    }
  };

  let mut matches: Vec<(&'static Command, u8)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd).map(|r| (cmd, r)))
    .collect();
  // Stable: ties keep declaration order
  matches.sort_by_key(|(_, r)| *r);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    assert_eq!(get_suggestions("orders")[0].name, "orders");
  }

  #[test]
  fn test_alias_beats_prefix() {
    // "p" is an alias of products and a prefix of plans
    let names: Vec<_> = get_suggestions("p").iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["products", "plans"]);
  }

  #[test]
  fn test_prefix_match() {
    assert_eq!(get_suggestions("cat")[0].name, "categories");
    assert_eq!(get_suggestions("rev")[0].name, "reviews");
  }

  #[test]
  fn test_substring_match() {
    assert_eq!(get_suggestions("view")[0].name, "reviews");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_lookup() {
    assert_eq!(lookup("PL").map(|c| c.name), Some("plans"));
    assert!(lookup("pla").is_none());
  }
}
