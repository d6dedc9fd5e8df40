//! The `:` command palette of the terminal UI.

use crate::app::Tab;

/// What a palette entry does when chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Show(Tab),
  /// Deliver the outbox now
  Sync,
  /// Re-check saved stories against the server
  Reconcile,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: Action,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "stories",
    aliases: &["feed"],
    description: "Browse remote stories",
    action: Action::Show(Tab::Stories),
  },
  Command {
    name: "outbox",
    aliases: &["o", "pending"],
    description: "Stories waiting to be delivered",
    action: Action::Show(Tab::Outbox),
  },
  Command {
    name: "bookmarks",
    aliases: &["b", "saved"],
    description: "Saved stories",
    action: Action::Show(Tab::Bookmarks),
  },
  Command {
    name: "sync",
    aliases: &["s", "send"],
    description: "Deliver the outbox now",
    action: Action::Sync,
  },
  Command {
    name: "check",
    aliases: &["verify"],
    description: "Drop saved stories deleted on the server",
    action: Action::Reconcile,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit storysync",
    action: Action::Quit,
  },
];

impl Command {
  /// 0 for an exact name or alias, 1 for a prefix of either.
  fn rank(&self, needle: &str) -> Option<u8> {
    let mut words = std::iter::once(self.name).chain(self.aliases.iter().copied());
    if words.clone().any(|w| w == needle) {
      Some(0)
    } else if words.any(|w| w.starts_with(needle)) {
      Some(1)
    } else {
      None
    }
  }
}

/// Palette entries matching `input`, best first.
///
/// The entry that would show the tab already on screen sorts after the
/// rest so Enter on a bare prefix moves somewhere.
pub fn suggestions(input: &str, current: Tab) -> Vec<&'static Command> {
  let needle = input.trim().to_lowercase();

  let mut ranked: Vec<(u8, &'static Command)> = COMMANDS
    .iter()
    .filter_map(|cmd| {
      let rank = cmd.rank(&needle)?;
      let idle = cmd.action == Action::Show(current);
      Some((rank + if idle { 2 } else { 0 }, cmd))
    })
    .collect();

  // Stable, so ties keep table order
  ranked.sort_by_key(|(rank, _)| *rank);
  ranked.into_iter().map(|(_, cmd)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn names(input: &str, current: Tab) -> Vec<&'static str> {
    suggestions(input, current).iter().map(|c| c.name).collect()
  }

  #[test]
  fn test_empty_input_puts_current_tab_last() {
    assert_eq!(
      names("", Tab::Stories),
      vec!["outbox", "bookmarks", "sync", "check", "quit", "stories"]
    );
    assert_eq!(names("", Tab::Outbox).last(), Some(&"outbox"));
  }

  #[test]
  fn test_exact_alias_beats_prefix() {
    // "s" is an alias of sync and a prefix of stories and saved
    assert_eq!(names("s", Tab::Outbox), vec!["sync", "stories", "bookmarks"]);
  }

  #[test]
  fn test_prefix_of_alias_matches() {
    assert_eq!(names("ver", Tab::Stories), vec!["check"]);
    assert_eq!(suggestions("pend", Tab::Stories)[0].action, Action::Show(Tab::Outbox));
  }

  #[test]
  fn test_input_is_trimmed_and_case_insensitive() {
    assert_eq!(names("  QUIT ", Tab::Stories), vec!["quit"]);
  }

  #[test]
  fn test_infix_does_not_match() {
    assert!(suggestions("mark", Tab::Stories).is_empty());
  }
}
