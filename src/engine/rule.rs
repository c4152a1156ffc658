//! Rule representation and match semantics.
//!
//! A rule is one policy clause: a pattern, a match kind, the score bits it
//! contributes when it matches, and the event classes it applies to. Rules
//! are deliberately dumb; they do not know which level owns them or which
//! user is being checked beyond an optional repeat count supplied by the
//! caller.

use crate::{Applies, Score, Violation, ViolationKind};
use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Wire codes for rule kinds, fixed by the stored format.
const KIND_SIMPLE_TEXT: u32 = 1;
const KIND_REGEX: u32 = 2;
const KIND_REPEAT: u32 = 4;

/// Error rejecting a malformed rule at construction time.
///
/// Nothing here can surface during evaluation: a rule that constructs
/// successfully either matches or does not, it never errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleError {
    /// A repeat-count rule was given a threshold that is not a number.
    /// Accepting it would make the rule either always or never match
    /// depending on a parsing accident, so it is refused outright.
    #[error("repeat threshold {0:?} is not a non-negative integer")]
    Threshold(String),

    /// A stored rule record carried a kind code this build does not know.
    #[error("unknown rule kind code {0}")]
    UnknownKind(u32),
}

/// What a rule matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// Case-sensitive byte-substring test.
    SimpleText { pattern: String },
    /// Anchored-nowhere regex search; an unparseable pattern never matches.
    Regex { pattern: String },
    /// Matches when the sender has repeated themselves at least
    /// `threshold` times in a row.
    RepeatCount { threshold: u32 },
}

impl RuleKind {
    /// Build a kind from its stored `(code, value)` pair.
    ///
    /// This is the single place where a repeat threshold is parsed; a
    /// non-numeric value is a construction error, not a rule that silently
    /// matches everything.
    pub fn parse(code: u32, value: &str) -> Result<Self, RuleError> {
        match code {
            KIND_SIMPLE_TEXT => Ok(RuleKind::SimpleText { pattern: value.to_owned() }),
            KIND_REGEX => Ok(RuleKind::Regex { pattern: value.to_owned() }),
            KIND_REPEAT => value
                .trim()
                .parse::<u32>()
                .map(|threshold| RuleKind::RepeatCount { threshold })
                .map_err(|_| RuleError::Threshold(value.to_owned())),
            other => Err(RuleError::UnknownKind(other)),
        }
    }

    /// Stored kind code.
    pub fn code(&self) -> u32 {
        match self {
            RuleKind::SimpleText { .. } => KIND_SIMPLE_TEXT,
            RuleKind::Regex { .. } => KIND_REGEX,
            RuleKind::RepeatCount { .. } => KIND_REPEAT,
        }
    }

    /// Stored value field: the pattern text, or the threshold in decimal.
    pub fn value_text(&self) -> String {
        match self {
            RuleKind::SimpleText { pattern } | RuleKind::Regex { pattern } => pattern.clone(),
            RuleKind::RepeatCount { threshold } => threshold.to_string(),
        }
    }
}

/// One policy clause.
///
/// `name` is unique by convention only; levels keep rules in insertion order
/// and lookups touch the first match. The optional payloads feed the
/// violations produced on a match: `message` for `Score::MESSAGE`, `sound`
/// for `Score::SOUND`, `command` for `Score::EXECUTE`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    kind: RuleKind,
    /// Compiled form of a `Regex` kind. Pattern text is immutable after
    /// construction, so compiling once is observably identical to
    /// compiling per call. `None` means the pattern did not parse and the
    /// rule never matches.
    compiled: Option<Regex>,
    pub score: Score,
    pub applies: Applies,
    pub enabled: bool,
    pub message: Option<String>,
    pub sound: Option<String>,
    pub command: Option<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>, kind: RuleKind, score: Score, applies: Applies) -> Self {
        let name = name.into();
        let compiled = match &kind {
            RuleKind::Regex { pattern } => compile(&name, pattern),
            _ => None,
        };

        Rule {
            name,
            kind,
            compiled,
            score,
            applies,
            enabled: true,
            message: None,
            sound: None,
            command: None,
        }
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Replace the match kind, recompiling any regex pattern.
    pub fn set_kind(&mut self, kind: RuleKind) {
        self.compiled = match &kind {
            RuleKind::Regex { pattern } => compile(&self.name, pattern),
            _ => None,
        };
        self.kind = kind;
    }

    /// Check `subject` against this rule and return the score contributed.
    ///
    /// `flags` describes the event being evaluated; the rule participates
    /// only if it is enabled and its applicability overlaps `flags`.
    /// `repeats` is the sender's consecutive-repeat count when the subject
    /// is tracked message text, and `None` when the subject is a bare
    /// username, which a repeat rule never matches.
    pub fn check(&self, subject: &str, flags: Applies, repeats: Option<u32>) -> Score {
        if !self.enabled || (self.applies & flags).is_empty() {
            return Score::empty();
        }

        let hit = match &self.kind {
            RuleKind::SimpleText { pattern } => subject.contains(pattern.as_str()),
            RuleKind::Regex { .. } => {
                self.compiled.as_ref().is_some_and(|re| re.is_match(subject))
            }
            RuleKind::RepeatCount { threshold } => repeats.is_some_and(|r| r >= *threshold),
        };

        if hit { self.score } else { Score::empty() }
    }

    /// Append one violation per side-effect bit in `hit`.
    pub(crate) fn collect_violations(&self, hit: Score, out: &mut Vec<Violation>) {
        if hit.contains(Score::MESSAGE) {
            out.push(Violation::new(ViolationKind::Message, self.message.as_deref()));
        }
        if hit.contains(Score::SOUND) {
            out.push(Violation::new(ViolationKind::Sound, self.sound.as_deref()));
        }
        if hit.contains(Score::EXECUTE) {
            out.push(Violation::new(ViolationKind::Execute, self.command.as_deref()));
        }
    }
}

/// Compile a user-supplied pattern, degrading to "never matches" on error.
fn compile(rule_name: &str, pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern).build() {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(rule = rule_name, pattern, %err, "unparseable regex, rule will never match");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn im_rule(kind: RuleKind) -> Rule {
        Rule::new("r", kind, Score::FILTER, Applies::IM)
    }

    #[test]
    fn simple_text_is_case_sensitive_substring() {
        let rule = im_rule(RuleKind::SimpleText { pattern: "spam".into() });
        assert_eq!(rule.check("buy spam now", Applies::IM, None), Score::FILTER);
        assert_eq!(rule.check("buy SPAM now", Applies::IM, None), Score::empty());
        assert_eq!(rule.check("nothing here", Applies::IM, None), Score::empty());
    }

    #[test]
    fn regex_matches_anywhere_in_subject() {
        let rule = im_rule(RuleKind::Regex { pattern: "ca[sz]h".into() });
        assert_eq!(rule.check("free cazh 4 u", Applies::IM, None), Score::FILTER);
        assert_eq!(rule.check("free stuff", Applies::IM, None), Score::empty());
    }

    #[test]
    fn malformed_regex_never_matches_across_calls() {
        let rule = im_rule(RuleKind::Regex { pattern: "未闭合(".into() });
        for subject in ["anything", "未闭合(", ""] {
            assert_eq!(rule.check(subject, Applies::IM, None), Score::empty());
        }
    }

    #[test]
    fn repeat_needs_threshold_and_context() {
        let rule = im_rule(RuleKind::RepeatCount { threshold: 3 });
        assert_eq!(rule.check("hi", Applies::IM, Some(2)), Score::empty());
        assert_eq!(rule.check("hi", Applies::IM, Some(3)), Score::FILTER);
        assert_eq!(rule.check("hi", Applies::IM, Some(7)), Score::FILTER);
        // A bare username carries no repeat context.
        assert_eq!(rule.check("bob", Applies::IM, None), Score::empty());
    }

    #[test]
    fn disabled_or_inapplicable_rules_sit_out() {
        let mut rule = im_rule(RuleKind::SimpleText { pattern: "x".into() });
        assert_eq!(rule.check("x", Applies::CHAT, None), Score::empty());
        rule.enabled = false;
        assert_eq!(rule.check("x", Applies::IM, None), Score::empty());
    }

    #[test]
    fn kind_parse_rejects_bad_threshold_and_code() {
        assert_eq!(
            RuleKind::parse(4, "three"),
            Err(RuleError::Threshold("three".into()))
        );
        assert_eq!(RuleKind::parse(9, ".*"), Err(RuleError::UnknownKind(9)));
        assert_eq!(
            RuleKind::parse(4, "3"),
            Ok(RuleKind::RepeatCount { threshold: 3 })
        );
    }

    #[test]
    fn kind_round_trips_code_and_value() {
        for kind in [
            RuleKind::SimpleText { pattern: "abc".into() },
            RuleKind::Regex { pattern: ".*".into() },
            RuleKind::RepeatCount { threshold: 5 },
        ] {
            assert_eq!(RuleKind::parse(kind.code(), &kind.value_text()), Ok(kind));
        }
    }

    #[test]
    fn violations_follow_payload_bits() {
        let mut rule = rule! {
            name: "nag",
            kind: RuleKind::SimpleText { pattern: "spam".into() },
            score: Score::MESSAGE | Score::SOUND,
            applies: Applies::IM,
            message: "stop spamming",
        };
        rule.sound = Some("/tmp/beep.wav".into());

        let hit = rule.check("spam", Applies::IM, None);
        let mut out = Vec::new();
        rule.collect_violations(hit, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, crate::ViolationKind::Message);
        assert_eq!(out[0].payload, "stop spamming");
        assert_eq!(out[1].kind, crate::ViolationKind::Sound);
    }
}
