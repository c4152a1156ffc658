//! Loading and saving a whole registry.
//!
//! The stored form is the line-oriented text format the old plugin
//! generation wrote, one record per level:
//!
//! ```text
//! level
//! name="Default"
//! /level
//! rule
//! name="Everything"
//! type="2"
//! score="1"
//! value=".*"
//! flags="3"
//! enabled="1"
//! message=""
//! command=""
//! sound=""
//! /rule
//! aim:somebody
//! irc:somebody.else
//! ```
//!
//! Rules and denizen lines attach to the most recently opened level. Lines
//! starting with `#` are comments. Repeat counters are never written;
//! every user starts a fresh session at zero.
//!
//! Reading is deliberately lossy: a malformed rule record or a stray
//! denizen line outside any level is logged and skipped, never an error.
//! Faithful round-tripping of every historical quirk is a non-goal; the
//! one quirk that is honored is `"(null)"`, which old writers produced
//! for absent payload fields.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::engine::{Level, Registry, Rule, RuleKind};
use crate::{Applies, Score};

/// Error from [`load`] or [`save`]. Parsing problems are not errors; they
/// degrade record by record.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("policy store i/o: {0}")]
    Io(#[from] io::Error),
}

/// Read a registry from `path`.
///
/// A missing file, or one with no level records at all, yields the seeded
/// default registry, matching what a first run should see.
pub fn load(path: &Path) -> Result<Registry, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no policy store, seeding defaults");
            return Ok(Registry::seeded());
        }
        Err(err) => return Err(err.into()),
    };

    let registry = parse(&text);
    if registry.is_empty() {
        debug!(path = %path.display(), "empty policy store, seeding defaults");
        return Ok(Registry::seeded());
    }

    Ok(registry)
}

/// Write `registry` to `path`, replacing any previous contents via a
/// sibling temporary file and rename.
pub fn save(registry: &Registry, path: &Path) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, render(registry))?;
    fs::rename(&tmp, path)?;
    Ok(())
}

// --- Reading ----------------------------------------------------------------

/// Fields of a rule record, collected until the closing `/rule`.
#[derive(Default)]
struct RuleDraft {
    name: String,
    kind_code: u32,
    value: String,
    score: u32,
    flags: u32,
    enabled: bool,
    message: Option<String>,
    command: Option<String>,
    sound: Option<String>,
}

impl RuleDraft {
    fn new() -> Self {
        RuleDraft { kind_code: 1, enabled: true, ..RuleDraft::default() }
    }

    fn build(self) -> Option<Rule> {
        let kind = match RuleKind::parse(self.kind_code, &self.value) {
            Ok(kind) => kind,
            Err(err) => {
                warn!(rule = %self.name, %err, "skipping unreadable rule record");
                return None;
            }
        };

        let mut rule = Rule::new(
            self.name,
            kind,
            Score::from_bits_truncate(self.score),
            Applies::from_bits_truncate(self.flags),
        );
        rule.enabled = self.enabled;
        rule.message = self.message;
        rule.command = self.command;
        rule.sound = self.sound;
        Some(rule)
    }
}

/// Parse stored text into a registry. Never fails; see the module docs for
/// what gets skipped.
pub fn parse(input: &str) -> Registry {
    let mut registry = Registry::new();
    let mut current: Option<Level> = None;
    let mut draft: Option<RuleDraft> = None;

    for line in input.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line {
            "level" => {
                if let Some(done) = current.replace(Level::new("")) {
                    if !registry.add(done) {
                        warn!("duplicate level name in store, keeping the first");
                    }
                }
            }
            "/level" => {
                // The level stays open: its rules and denizens follow.
            }
            "rule" => {
                draft = Some(RuleDraft::new());
            }
            "/rule" => {
                let Some(done) = draft.take() else { continue };
                match current.as_mut() {
                    Some(level) => {
                        if let Some(rule) = done.build() {
                            level.add_rule(rule);
                        }
                    }
                    None => warn!("rule record outside any level, skipping"),
                }
            }
            _ => {
                if let Some((field, value)) = split_field(line) {
                    match draft.as_mut() {
                        Some(draft) => assign_rule_field(draft, field, value),
                        None => match current.as_mut() {
                            Some(level) if field.eq_ignore_ascii_case("name") => {
                                level.set_name(value);
                            }
                            _ => warn!(field, "field outside any record, skipping"),
                        },
                    }
                } else if let Some(level) = current.as_mut() {
                    // A bare line is a denizen of the open level, unless
                    // some earlier level already placed that user.
                    if !registry.levels().iter().any(|l| l.has_denizen(line))
                        && !level.has_denizen(line)
                    {
                        level.add_denizen(line);
                    }
                } else {
                    warn!(line, "denizen line outside any level, skipping");
                }
            }
        }
    }

    if let Some(done) = current {
        if !registry.add(done) {
            warn!("duplicate level name in store, keeping the first");
        }
    }

    registry
}

/// Split a `name="value"` line; quotes around the value are optional.
fn split_field(line: &str) -> Option<(&str, &str)> {
    let caps = regex!(r#"^([A-Za-z]+)="?(.*?)"?$"#).captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

fn assign_rule_field(draft: &mut RuleDraft, field: &str, value: &str) {
    match field.to_ascii_lowercase().as_str() {
        "name" => draft.name = value.to_owned(),
        "type" => draft.kind_code = parse_number(value),
        "value" => draft.value = value.to_owned(),
        "score" => draft.score = parse_number(value),
        "flags" => draft.flags = parse_number(value),
        "enabled" => draft.enabled = parse_number(value) != 0,
        "message" => draft.message = payload(value),
        "command" => draft.command = payload(value),
        "sound" => draft.sound = payload(value),
        other => warn!(field = other, "unknown rule field, skipping"),
    }
}

/// Numeric fields with atoi tolerance: garbage reads as zero.
fn parse_number(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

/// Absent payloads were written as empty strings, or as `(null)` by old
/// writers.
fn payload(value: &str) -> Option<String> {
    match value {
        "" | "(null)" => None,
        other => Some(other.to_owned()),
    }
}

// --- Writing ----------------------------------------------------------------

/// Render a registry in the stored text format.
pub fn render(registry: &Registry) -> String {
    let mut out = String::new();
    for level in registry.levels() {
        render_level(&mut out, level);
    }
    out
}

fn render_level(out: &mut String, level: &Level) {
    out.push_str("level\n");
    out.push_str(&format!("name=\"{}\"\n", level.name()));
    out.push_str("/level\n");

    for rule in level.rules() {
        render_rule(out, rule);
    }

    let mut names: Vec<&str> = level.denizens().map(|d| d.name()).collect();
    names.sort_unstable();
    for name in names {
        out.push_str(name);
        out.push('\n');
    }
}

fn render_rule(out: &mut String, rule: &Rule) {
    out.push_str("rule\n");
    out.push_str(&format!("name=\"{}\"\n", rule.name));
    out.push_str(&format!("type=\"{}\"\n", rule.kind().code()));
    out.push_str(&format!("score=\"{}\"\n", rule.score.bits()));
    out.push_str(&format!("value=\"{}\"\n", rule.kind().value_text()));
    out.push_str(&format!("flags=\"{}\"\n", rule.applies.bits()));
    out.push_str(&format!("enabled=\"{}\"\n", u32::from(rule.enabled)));
    out.push_str(&format!("message=\"{}\"\n", rule.message.as_deref().unwrap_or_default()));
    out.push_str(&format!("command=\"{}\"\n", rule.command.as_deref().unwrap_or_default()));
    out.push_str(&format!("sound=\"{}\"\n", rule.sound.as_deref().unwrap_or_default()));
    out.push_str("/rule\n");
}
