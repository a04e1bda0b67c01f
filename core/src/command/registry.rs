//! The command registry
//!
//! A fixed, ordered catalog of every action the oracle may request. Built
//! once at startup and never mutated; the prompt builder reads it to list
//! the legal action names, and the dispatcher consults it before touching
//! the effector.

/// Names of the two reserved pseudo-commands.
///
/// `wait` is the only intentionally blocking action (a plain sleep);
/// `clarify` never reaches the effector surface at all, it only relays a
/// message to the operator and always succeeds.
pub const WAIT: &str = "wait";
pub const CLARIFY: &str = "clarify";

/// Static description of one registered command.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    /// Unique registry key
    pub name: &'static str,
    /// Parameters that must be present
    pub required: &'static [&'static str],
    /// Parameters that may be omitted
    pub optional: &'static [&'static str],
    /// One-line summary, embedded in the prompt catalog
    pub summary: &'static str,
}

/// Immutable mapping from command name to its spec.
///
/// Kept as an ordered list so the prompt catalog is stable across runs.
pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
}

impl CommandRegistry {
    /// The standard effector surface.
    pub fn standard() -> Self {
        CommandRegistry {
            specs: vec![
                CommandSpec {
                    name: "click",
                    required: &["x", "y"],
                    optional: &[],
                    summary: "left-click at screen coordinates",
                },
                CommandSpec {
                    name: "doubleclick",
                    required: &["x", "y"],
                    optional: &[],
                    summary: "double-click at screen coordinates",
                },
                CommandSpec {
                    name: "rightclick",
                    required: &["x", "y"],
                    optional: &[],
                    summary: "right-click at screen coordinates",
                },
                CommandSpec {
                    name: "type",
                    required: &["text"],
                    optional: &[],
                    summary: "type text at the current focus",
                },
                CommandSpec {
                    name: "keydown",
                    required: &["key"],
                    optional: &[],
                    summary: "hold a key down",
                },
                CommandSpec {
                    name: "keyup",
                    required: &["key"],
                    optional: &[],
                    summary: "release a held key",
                },
                CommandSpec {
                    name: "press",
                    required: &["key"],
                    optional: &[],
                    summary: "press and release a key",
                },
                CommandSpec {
                    name: "moveto",
                    required: &["x", "y"],
                    optional: &["duration"],
                    summary: "move the pointer to coordinates",
                },
                CommandSpec {
                    name: "scroll",
                    required: &[],
                    optional: &["clicks", "x", "y"],
                    summary: "scroll the mouse wheel (positive is up)",
                },
                CommandSpec {
                    name: "pagedown",
                    required: &[],
                    optional: &[],
                    summary: "press the Page Down key",
                },
                CommandSpec {
                    name: WAIT,
                    required: &["seconds"],
                    optional: &[],
                    summary: "do nothing for the given number of seconds",
                },
                CommandSpec {
                    name: CLARIFY,
                    required: &["message"],
                    optional: &[],
                    summary: "ask the operator for clearer instructions",
                },
            ],
        }
    }

    /// Look up a command by name. Lookup is exact: the oracle is told the
    /// precise names and anything else is an unknown command.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(|s| s.name)
    }

    /// All specs in catalog order.
    pub fn specs(&self) -> &[CommandSpec] {
        &self.specs
    }
}
