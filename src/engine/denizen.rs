//! Per-user repeat-tracking state.

use tracing::debug;

/// What a level remembers about one of its users.
///
/// Created lazily the first time a level evaluates an unseen member, and
/// destroyed with the membership. The repeat counter only ever lives in
/// memory; a restart starts every user back at zero.
#[derive(Debug, Clone)]
pub struct Denizen {
    name: String,
    last_message: String,
    repeats: u32,
}

impl Denizen {
    pub fn new(name: impl Into<String>) -> Self {
        Denizen { name: name.into(), last_message: String::new(), repeats: 0 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    /// Record a message and return the updated consecutive-repeat count.
    ///
    /// A message equal to the previous one (ignoring ASCII case) increments
    /// the counter; anything else replaces the remembered message and
    /// resets the counter to zero. Runs once per evaluated message, before
    /// repeat rules are checked, so they see the count including the
    /// message at hand.
    pub fn set_message(&mut self, message: &str) -> u32 {
        if self.last_message.eq_ignore_ascii_case(message) {
            self.repeats += 1;
            debug!(user = %self.name, repeats = self.repeats, "repeated message");
        } else {
            self.last_message = message.to_owned();
            self.repeats = 0;
        }

        self.repeats
    }
}
