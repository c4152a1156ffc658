//! The level registry: owns every level and decides which one a user
//! belongs to.

use tracing::{debug, warn};

use crate::api::Verdict;
use crate::engine::{Level, Rule, RuleKind};
use crate::{Applies, Score};

/// Name of the fallback level every unplaced user resolves to.
pub const DEFAULT_LEVEL: &str = "Default";
/// Name of the seeded whitelist level.
pub const WHITELIST_LEVEL: &str = "WL";
/// Name of the seeded blacklist level.
pub const BLACKLIST_LEVEL: &str = "BL";

/// Owns the levels, in registration order.
///
/// Registration order matters: [`Registry::resolve_user_level`] scans the
/// levels front to back and the first one holding the user wins. The
/// registry is a plain value owned by the host application; there are no
/// process-wide statics, and a multi-threaded host serializes access
/// itself.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    levels: Vec<Level>,
}

impl Registry {
    /// An empty registry. Most callers want [`Registry::seeded`].
    pub fn new() -> Self {
        Registry { levels: Vec::new() }
    }

    /// A registry with the three standing levels: "Default", "WL", and
    /// "BL", the last carrying an enabled catch-all filter rule so that
    /// blacklisted users are silenced out of the box.
    pub fn seeded() -> Self {
        let mut registry = Registry::new();
        registry.add(Level::new(DEFAULT_LEVEL));
        registry.add(Level::new(WHITELIST_LEVEL));

        let mut blacklist = Level::new(BLACKLIST_LEVEL);
        blacklist.add_rule(everything_rule());
        registry.add(blacklist);

        registry
    }

    pub fn find(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.name() == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Level> {
        self.levels.iter_mut().find(|l| l.name() == name)
    }

    /// Register a level. Fails without overwriting when the name is taken.
    pub fn add(&mut self, level: Level) -> bool {
        if self.find(level.name()).is_some() {
            return false;
        }
        self.levels.push(level);
        true
    }

    /// Destroy a level along with all its rules and denizens.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.levels.iter().position(|l| l.name() == name) {
            Some(idx) => {
                self.levels.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The level `username` belongs to: the first level (in registration
    /// order) holding the user, else "Default". `None` only when the
    /// Default level itself has been removed, in which case resolution has
    /// no defined answer.
    pub fn resolve_user_level(&mut self, username: &str) -> Option<&mut Level> {
        let idx = self
            .levels
            .iter()
            .position(|l| l.has_denizen(username))
            .or_else(|| self.levels.iter().position(|l| l.name() == DEFAULT_LEVEL))?;

        self.levels.get_mut(idx)
    }

    /// Move a user into the named level, out of whichever level currently
    /// holds them. False when the target level does not exist or already
    /// holds the user.
    pub fn assign_user(&mut self, username: &str, level_name: &str) -> bool {
        let Some(target) = self.levels.iter().position(|l| l.name() == level_name) else {
            warn!(level = level_name, "cannot assign user to unknown level");
            return false;
        };

        if self.levels[target].has_denizen(username) {
            return false;
        }

        if let Some(current) = self.levels.iter().position(|l| l.has_denizen(username)) {
            self.levels[current].remove_denizen(username);
        }

        debug!(user = username, level = level_name, "assigned user");
        self.levels[target].add_denizen(username);
        true
    }

    /// Drop a user from whichever level holds them, wiping their repeat
    /// state. False when no level holds the user.
    pub fn remove_user(&mut self, username: &str) -> bool {
        self.levels.iter_mut().any(|l| l.remove_denizen(username))
    }

    /// The evaluator entry point: resolve the sender's level and run its
    /// rules over the event.
    ///
    /// This is called once per inbound message, enter/leave, or invite and
    /// must not fail; with no resolvable level (the Default level was
    /// removed) it returns an empty verdict.
    pub fn rulecheck(&mut self, username: &str, text: &str, flags: Applies) -> Verdict {
        match self.resolve_user_level(username) {
            Some(level) => level.rulecheck(username, text, flags),
            None => {
                warn!(user = username, "no level resolves, skipping rulecheck");
                Verdict { score: Score::empty(), violations: Vec::new() }
            }
        }
    }
}

/// The catch-all rule seeded into the blacklist: any chat or IM text from
/// a member is filtered.
fn everything_rule() -> Rule {
    rule! {
        name: "Everything",
        kind: RuleKind::Regex { pattern: ".*".into() },
        score: Score::FILTER,
        applies: Applies::CHAT | Applies::IM,
    }
}
