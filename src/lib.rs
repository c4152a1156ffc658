extern crate self as doorward;

#[macro_use]
mod macros;
mod api;
mod engine;
mod import;
mod store;

pub use api::{EventClass, Verdict};
pub use engine::{
    BLACKLIST_LEVEL, DEFAULT_LEVEL, Denizen, Level, Registry, Rule, RuleError, RuleKind,
    WHITELIST_LEVEL,
};
pub use import::import_blocklist;
pub use store::{StoreError, load, parse, render, save};

// --- Shared leaf types ------------------------------------------------------

bitflags::bitflags! {
    /// Actions a matching rule asks the caller to take.
    ///
    /// A [`Verdict`]'s score is the OR-combination of every matching rule's
    /// bits for one evaluation call; it is never persisted. `FILTER` and
    /// `IGNORE` shape message disposition (drop, drop + blacklist), the
    /// remaining bits each announce one side effect carried by a
    /// [`Violation`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Score: u32 {
        const FILTER  = 1 << 0;
        const IGNORE  = 1 << 1;
        const MESSAGE = 1 << 2;
        const EXECUTE = 1 << 3;
        const SOUND   = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Event classes a rule applies to.
    ///
    /// `USER` selects the username-checking phase of an evaluation; the other
    /// bits select message-carrying event classes. Bit 3 was a host-address
    /// class in old configurations; its value stays unassigned so stored
    /// masks keep their meaning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Applies: u32 {
        const CHAT       = 1 << 0;
        const IM         = 1 << 1;
        const USER       = 1 << 2;
        const ENTERLEAVE = 1 << 4;
        const INVITE     = 1 << 5;
    }
}

/// The side-effect class of a [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// Send a reply to the offending user.
    Message,
    /// Play a sound file.
    Sound,
    /// Run an external command.
    Execute,
}

/// One concrete action produced by a matching rule.
///
/// Violations are ephemeral: they are produced per matching rule per
/// evaluation call and consumed immediately by the caller. The engine never
/// performs the side effect itself. A `Message` payload goes to the host's
/// reply collaborator, `Sound` to audio playback, and `Execute` to whatever
/// sandboxed command runner the host owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub payload: String,
}

impl Violation {
    pub(crate) fn new(kind: ViolationKind, payload: Option<&str>) -> Self {
        Violation { kind, payload: payload.unwrap_or_default().to_owned() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bits_match_wire_values() {
        // Fixed by the on-disk format; see store.rs.
        assert_eq!(Score::FILTER.bits(), 1);
        assert_eq!(Score::IGNORE.bits(), 2);
        assert_eq!(Score::MESSAGE.bits(), 4);
        assert_eq!(Score::EXECUTE.bits(), 8);
        assert_eq!(Score::SOUND.bits(), 16);
    }

    #[test]
    fn applies_bits_skip_retired_host_class() {
        assert_eq!(Applies::CHAT.bits(), 1);
        assert_eq!(Applies::IM.bits(), 2);
        assert_eq!(Applies::USER.bits(), 4);
        assert_eq!(Applies::ENTERLEAVE.bits(), 16);
        assert_eq!(Applies::INVITE.bits(), 32);
    }
}
