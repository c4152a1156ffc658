//! Levels: named policy buckets.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::api::Verdict;
use crate::engine::{Denizen, Rule};
use crate::{Applies, Score};

/// A named policy bucket: an ordered list of rules plus the set of users
/// ("denizens") the bucket currently applies to.
///
/// Rules are kept in insertion order and evaluated in that order. Rule
/// names are unique by convention only; [`Level::rule`] and
/// [`Level::remove_rule`] deliberately touch the first name match and
/// nothing else. Denizen keys are expected to arrive already
/// protocol-qualified and normalized by the host; membership tests are
/// exact.
#[derive(Debug, Clone)]
pub struct Level {
    name: String,
    rules: Vec<Rule>,
    denizens: HashMap<String, Denizen>,
}

impl Level {
    pub fn new(name: impl Into<String>) -> Self {
        Level { name: name.into(), rules: Vec::new(), denizens: HashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // --- Rules --------------------------------------------------------------

    /// Append a rule. Duplicate names are permitted.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// First rule with the given name, if any.
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn rule_mut(&mut self, name: &str) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| r.name == name)
    }

    /// Remove the first rule with the given name, keeping the rest in
    /// order. Returns false when no rule carries the name.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        match self.rules.iter().position(|r| r.name == name) {
            Some(idx) => {
                self.rules.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    // --- Denizens -----------------------------------------------------------

    /// Add a user with fresh repeat state. Adding a present user is a no-op.
    pub fn add_denizen(&mut self, username: &str) {
        self.denizens
            .entry(username.to_owned())
            .or_insert_with(|| Denizen::new(username));
    }

    pub fn remove_denizen(&mut self, username: &str) -> bool {
        self.denizens.remove(username).is_some()
    }

    pub fn has_denizen(&self, username: &str) -> bool {
        self.denizens.contains_key(username)
    }

    pub fn denizens(&self) -> impl Iterator<Item = &Denizen> {
        self.denizens.values()
    }

    /// Denizen names matching a regex, for host-side bulk operations.
    /// An unparseable pattern matches nobody, like a regex rule would.
    pub fn denizens_matching(&self, pattern: &str) -> Vec<&str> {
        match regex::Regex::new(pattern) {
            Ok(re) => self
                .denizens
                .keys()
                .filter(|name| re.is_match(name))
                .map(String::as_str)
                .collect(),
            Err(err) => {
                warn!(pattern, %err, "unparseable denizen pattern");
                Vec::new()
            }
        }
    }

    // --- Evaluation ---------------------------------------------------------

    /// Evaluate one inbound event against every rule in this level.
    ///
    /// The check runs in two phases. Rules carrying [`Applies::USER`] are
    /// first checked against `username` under the full `flags`; then every
    /// rule is checked against `text` with the USER bit masked out. A rule
    /// applicable to both phases can therefore match twice and contribute
    /// its violations twice.
    ///
    /// If `username` has a denizen here, its repeat state is updated before
    /// the text phase (skipped when `text` is just the username again, as
    /// in enter/leave events), so repeat rules see the count including this
    /// message. Matching never short-circuits: every enabled, applicable
    /// rule contributes its score bits and violations.
    pub fn rulecheck(&mut self, username: &str, text: &str, flags: Applies) -> Verdict {
        let repeats = match self.denizens.get_mut(username) {
            Some(denizen) if !denizen.name().eq_ignore_ascii_case(text) => {
                Some(denizen.set_message(text))
            }
            Some(denizen) => Some(denizen.repeats()),
            None => None,
        };

        let mut score = Score::empty();
        let mut violations = Vec::new();

        for rule in &self.rules {
            if rule.applies.contains(Applies::USER) {
                let hit = rule.check(username, flags, None);
                score |= hit;
                rule.collect_violations(hit, &mut violations);
            }

            let hit = rule.check(text, flags & !Applies::USER, repeats);
            score |= hit;
            rule.collect_violations(hit, &mut violations);
        }

        debug!(
            level = %self.name,
            user = username,
            score = score.bits(),
            violations = violations.len(),
            "rulecheck"
        );

        Verdict { score, violations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RuleKind;
    use crate::ViolationKind;

    fn spam_rule() -> Rule {
        rule! {
            name: "spam",
            kind: RuleKind::SimpleText { pattern: "spam".into() },
            score: Score::MESSAGE,
            applies: Applies::IM,
            message: "stop spamming",
        }
    }

    #[test]
    fn rule_lookups_touch_first_name_match() {
        let mut level = Level::new("L");
        let mut second = spam_rule();
        second.message = Some("second".into());
        level.add_rule(spam_rule());
        level.add_rule(second);

        assert_eq!(level.rule("spam").unwrap().message.as_deref(), Some("stop spamming"));
        assert!(level.remove_rule("spam"));
        assert_eq!(level.rule("spam").unwrap().message.as_deref(), Some("second"));
        assert!(level.remove_rule("spam"));
        assert!(!level.remove_rule("spam"));
    }

    #[test]
    fn add_denizen_is_idempotent() {
        let mut level = Level::new("L");
        level.add_denizen("aim:bob");
        level.rulecheck("aim:bob", "hi", Applies::IM);
        level.rulecheck("aim:bob", "hi", Applies::IM);

        // Re-adding must not reset the tracked repeat state.
        level.add_denizen("aim:bob");
        let d = level.denizens().next().unwrap();
        assert_eq!(d.repeats(), 1);

        assert!(level.remove_denizen("aim:bob"));
        assert!(!level.remove_denizen("aim:bob"));
        assert!(!level.has_denizen("aim:bob"));
    }

    #[test]
    fn user_phase_only_runs_for_user_rules() {
        let mut level = Level::new("L");
        level.add_rule(spam_rule());

        // "spam" appears in the username but the rule has no USER bit, so
        // only the text phase can match, and the text is clean.
        let verdict = level.rulecheck("aim:spammer", "hello", Applies::IM | Applies::USER);
        assert!(verdict.score.is_empty());
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn single_match_produces_single_violation() {
        let mut level = Level::new("L");
        level.add_rule(spam_rule());

        let verdict =
            level.rulecheck("aim:bob", "buy spam now", Applies::IM | Applies::USER);
        assert_eq!(verdict.score, Score::MESSAGE);
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(verdict.violations[0].kind, ViolationKind::Message);
        assert_eq!(verdict.violations[0].payload, "stop spamming");
    }

    #[test]
    fn user_and_text_rules_both_fire() {
        let mut level = Level::new("L");
        level.add_rule(rule! {
            name: "badname",
            kind: RuleKind::SimpleText { pattern: "troll".into() },
            score: Score::FILTER,
            applies: Applies::IM | Applies::USER,
        });
        level.add_rule(spam_rule());

        let verdict =
            level.rulecheck("aim:trollface", "spam spam", Applies::IM | Applies::USER);
        assert_eq!(verdict.score, Score::FILTER | Score::MESSAGE);
        assert_eq!(verdict.violations.len(), 1);
    }

    #[test]
    fn no_short_circuit_on_filter() {
        let mut level = Level::new("L");
        level.add_rule(rule! {
            name: "wall",
            kind: RuleKind::Regex { pattern: ".*".into() },
            score: Score::FILTER,
            applies: Applies::IM,
        });
        level.add_rule(spam_rule());

        // The filter rule matching first must not stop the message rule
        // from contributing its violation.
        let verdict = level.rulecheck("aim:bob", "spam", Applies::IM);
        assert_eq!(verdict.score, Score::FILTER | Score::MESSAGE);
        assert_eq!(verdict.violations.len(), 1);
    }

    #[test]
    fn repeat_rule_sees_the_updated_count() {
        let mut level = Level::new("L");
        level.add_denizen("aim:bob");
        level.add_rule(rule! {
            name: "broken-record",
            kind: RuleKind::RepeatCount { threshold: 3 },
            score: Score::FILTER,
            applies: Applies::IM,
        });

        let flags = Applies::IM | Applies::USER;
        for _ in 0..3 {
            // First three "hi"s reach repeats 0, 1, 2: under threshold.
            assert!(level.rulecheck("aim:bob", "hi", flags).score.is_empty());
        }
        // Fourth consecutive "hi" brings repeats to 3.
        assert_eq!(level.rulecheck("aim:bob", "hi", flags).score, Score::FILTER);
    }

    #[test]
    fn repeat_rule_ignores_untracked_users() {
        let mut level = Level::new("L");
        level.add_rule(rule! {
            name: "broken-record",
            kind: RuleKind::RepeatCount { threshold: 0 },
            score: Score::FILTER,
            applies: Applies::IM,
        });

        // No denizen, no repeat context, even with a zero threshold.
        assert!(level.rulecheck("aim:stranger", "hi", Applies::IM).score.is_empty());
    }

    #[test]
    fn denizens_matching_uses_regex_and_degrades() {
        let mut level = Level::new("L");
        level.add_denizen("aim:bob");
        level.add_denizen("irc:bob");
        level.add_denizen("aim:eve");

        let mut hits = level.denizens_matching("^aim:");
        hits.sort_unstable();
        assert_eq!(hits, ["aim:bob", "aim:eve"]);
        assert!(level.denizens_matching("badpattern(").is_empty());
    }
}
