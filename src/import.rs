//! One-shot import of flat block lists.
//!
//! Older clients kept plain ignore lists: one username per line, nothing
//! else. Importing one builds (or reuses) a level that filters everything
//! its members say, then files each user into it.

use tracing::{debug, warn};

use crate::engine::{Level, Registry, Rule, RuleKind};
use crate::{Applies, Score};

/// Add every username in `lines` to the named blacklist-style level,
/// creating the level with a catch-all filter rule if it does not exist
/// yet. Users already placed in some other level are left where they are.
/// Returns how many users were added.
pub fn import_blocklist<'a>(
    registry: &mut Registry,
    level_name: &str,
    lines: impl IntoIterator<Item = &'a str>,
) -> usize {
    if registry.find(level_name).is_none() {
        let mut level = Level::new(level_name);
        level.add_rule(catchall_rule());
        if !registry.add(level) {
            warn!(level = level_name, "could not create import level");
            return 0;
        }
    }

    let mut added = 0;
    for line in lines {
        let username = line.trim();
        if username.is_empty() || username.starts_with('#') {
            continue;
        }

        if registry.levels().iter().any(|l| l.has_denizen(username)) {
            continue;
        }

        if let Some(level) = registry.find_mut(level_name) {
            level.add_denizen(username);
            added += 1;
        }
    }

    debug!(level = level_name, added, "imported block list");
    added
}

/// Everything a member says, in any message-bearing event class, is
/// filtered.
fn catchall_rule() -> Rule {
    rule! {
        name: "Everything",
        kind: RuleKind::Regex { pattern: ".*".into() },
        score: Score::FILTER,
        applies: Applies::CHAT | Applies::IM | Applies::ENTERLEAVE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DEFAULT_LEVEL, WHITELIST_LEVEL};

    #[test]
    fn imports_into_a_fresh_filtering_level() {
        let mut registry = Registry::seeded();
        let added = import_blocklist(
            &mut registry,
            "LegacyBL",
            ["aim:mallory", "", "# comment", "aim:trudy"],
        );
        assert_eq!(added, 2);

        let level = registry.find("LegacyBL").unwrap();
        assert!(level.has_denizen("aim:mallory"));
        assert!(level.rule("Everything").is_some());

        let verdict = registry.rulecheck("aim:trudy", "hello", Applies::IM);
        assert_eq!(verdict.score, Score::FILTER);
    }

    #[test]
    fn users_placed_elsewhere_are_not_stolen() {
        let mut registry = Registry::seeded();
        registry.find_mut(WHITELIST_LEVEL).unwrap().add_denizen("aim:alice");

        let added = import_blocklist(&mut registry, "LegacyBL", ["aim:alice", "aim:bob"]);
        assert_eq!(added, 1);
        assert!(!registry.find("LegacyBL").unwrap().has_denizen("aim:alice"));
        assert_eq!(
            registry.resolve_user_level("aim:alice").unwrap().name(),
            WHITELIST_LEVEL
        );
    }

    #[test]
    fn reimporting_reuses_the_level() {
        let mut registry = Registry::seeded();
        import_blocklist(&mut registry, "LegacyBL", ["aim:mallory"]);
        let added = import_blocklist(&mut registry, "LegacyBL", ["aim:mallory", "aim:trudy"]);
        assert_eq!(added, 1);
        assert_eq!(
            registry.levels().iter().filter(|l| l.name() == "LegacyBL").count(),
            1
        );
        // The default level never captured anybody.
        assert!(!registry.find(DEFAULT_LEVEL).unwrap().has_denizen("aim:mallory"));
    }
}
