//! The policy evaluation engine.
//!
//! Everything the host keeps alive between events lives here: the level
//! registry, the levels themselves, their rules, and the per-user repeat
//! state. Evaluating one inbound event is a short pipeline:
//!
//! ```text
//! event (sender, text, flags)
//!        │
//!        v
//! Registry::resolve_user_level      (registry.rs)
//!   - first level holding the sender wins, in registration order
//!   - falls back to "Default"
//!        │
//!        v
//! Level::rulecheck                  (level.rs)
//!   - update the sender's Denizen repeat state (denizen.rs)
//!   - user phase: rules carrying the USER bit, against the username
//!   - text phase: all rules, against the message text
//!        │
//!        v
//! Verdict { score, violations }     (api.rs)
//! ```
//!
//! Every enabled, applicable rule is evaluated unconditionally. There is no
//! short-circuit on `FILTER` or `IGNORE`: a single call can accumulate score
//! bits from many rules and produce several violations of the same kind. The
//! caller interprets the score and performs the violations.
//!
//! ## Failure posture
//!
//! The evaluation path runs once per inbound message and must not fail. Rule
//! construction is where bad configuration is rejected (a non-numeric repeat
//! threshold) or degraded (an unparseable regex becomes a rule that never
//! matches); see `rule.rs`. Lookups report absence with `Option`/`bool`.

#[path = "engine/denizen.rs"]
mod denizen;
#[path = "engine/level.rs"]
mod level;
#[path = "engine/registry.rs"]
mod registry;
#[path = "engine/rule.rs"]
mod rule;


pub use denizen::Denizen;
pub use level::Level;
pub use registry::{BLACKLIST_LEVEL, DEFAULT_LEVEL, Registry, WHITELIST_LEVEL};
pub use rule::{Rule, RuleError, RuleKind};
