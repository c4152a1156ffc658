//! Host-facing surface: verdicts and per-event flag presets.

use crate::{Applies, Score, Violation};

/// The outcome of evaluating one inbound event.
///
/// `score` is the OR-combination of every matching rule's action bits;
/// `violations` lists the side effects those rules asked for, in rule
/// order. Both are transient: nothing here is persisted.
///
/// # Example
///
/// ```
/// use doorward::{EventClass, Registry};
///
/// let mut registry = Registry::seeded();
/// registry.find_mut("BL").unwrap().add_denizen("aim:mallory");
///
/// let flags = EventClass::InstantMessage.flags();
/// assert!(registry.rulecheck("aim:mallory", "hello", flags).should_drop());
/// assert!(registry.rulecheck("aim:alice", "hello", flags).clean());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub score: Score,
    pub violations: Vec<Violation>,
}

impl Verdict {
    /// No rule matched at all.
    pub fn clean(&self) -> bool {
        self.score.is_empty()
    }

    /// The message must not reach the user.
    pub fn should_drop(&self) -> bool {
        self.score.intersects(Score::FILTER | Score::IGNORE)
    }

    /// The sender has earned a place on the blacklist. Callers honor this
    /// by moving the sender to the "BL" level and dropping the message.
    pub fn should_blacklist(&self) -> bool {
        self.score.contains(Score::IGNORE)
    }
}

/// The inbound event classes a host reports, with the applicability flags
/// each one carries into evaluation.
///
/// Every class includes [`Applies::USER`] so that username rules get their
/// chance; an invite also carries the CHAT bit since accepting it would
/// open a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// A message in a multi-user chat.
    ChatMessage,
    /// A direct instant message.
    InstantMessage,
    /// A user entering or leaving a chat; the "text" is the username.
    EnterLeave,
    /// An invitation to join a chat.
    Invite,
}

impl EventClass {
    pub fn flags(self) -> Applies {
        match self {
            EventClass::ChatMessage => Applies::CHAT | Applies::USER,
            EventClass::InstantMessage => Applies::IM | Applies::USER,
            EventClass::EnterLeave => Applies::ENTERLEAVE | Applies::USER,
            EventClass::Invite => Applies::INVITE | Applies::USER | Applies::CHAT,
        }
    }
}
