//! Decoded commands and typed parameter resolution
//!
//! A [`DecodedCommand`] is the raw extractor output: a name, a parameter
//! map, and optional rationale. Before anything touches the effector it is
//! resolved into an [`ActionCommand`], a tagged variant whose fields carry
//! the already-coerced parameter values. Malformed parameter shapes become
//! typed [`ParamError`]s here instead of faults at execution time.

use crate::error::ParamError;
use crate::command::registry::{CommandRegistry, CLARIFY, WAIT};
use serde_json::{Map, Value};

/// A structured command extracted from the oracle's reply.
///
/// Created once per iteration and consumed immediately by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCommand {
    /// Action name; must be a registry key before dispatch is attempted
    pub name: String,
    /// Raw parameter mapping as the oracle supplied it
    pub params: Map<String, Value>,
    /// Advisory only: logged, never control flow
    pub reasoning: Option<String>,
}

/// Default pointer travel time for `moveto`, in seconds.
const DEFAULT_MOVE_DURATION: f64 = 0.2;

/// Upper bound on a `wait` duration. Anything longer is a garbage value
/// from the oracle, not a real pause request.
const MAX_WAIT_SECONDS: f64 = 3600.0;

/// A validated, typed action ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionCommand {
    Click { x: i64, y: i64 },
    DoubleClick { x: i64, y: i64 },
    RightClick { x: i64, y: i64 },
    Type { text: String },
    KeyDown { key: String },
    KeyUp { key: String },
    Press { key: String },
    MoveTo { x: i64, y: i64, duration: f64 },
    Scroll { clicks: i64, x: Option<i64>, y: Option<i64> },
    PageDown,
    Wait { seconds: f64 },
    Clarify { message: String },
}

impl ActionCommand {
    /// Resolve a decoded command against the registry.
    ///
    /// Coercion is lenient the way the oracle needs it to be: JSON numbers
    /// are accepted directly, and numeric strings are accepted as a
    /// fallback since vision models routinely quote coordinates.
    pub fn resolve(
        cmd: &DecodedCommand,
        registry: &CommandRegistry,
    ) -> Result<ActionCommand, ParamError> {
        if !registry.contains(&cmd.name) {
            return Err(ParamError::UnknownCommand(cmd.name.clone()));
        }
        let params = &cmd.params;

        match cmd.name.as_str() {
            "click" => Ok(ActionCommand::Click {
                x: int_param(params, &cmd.name, "x")?,
                y: int_param(params, &cmd.name, "y")?,
            }),
            "doubleclick" => Ok(ActionCommand::DoubleClick {
                x: int_param(params, &cmd.name, "x")?,
                y: int_param(params, &cmd.name, "y")?,
            }),
            "rightclick" => Ok(ActionCommand::RightClick {
                x: int_param(params, &cmd.name, "x")?,
                y: int_param(params, &cmd.name, "y")?,
            }),
            "type" => Ok(ActionCommand::Type {
                text: string_param(params, &cmd.name, "text")?,
            }),
            "keydown" => Ok(ActionCommand::KeyDown {
                key: string_param(params, &cmd.name, "key")?,
            }),
            "keyup" => Ok(ActionCommand::KeyUp {
                key: string_param(params, &cmd.name, "key")?,
            }),
            "press" => Ok(ActionCommand::Press {
                key: string_param(params, &cmd.name, "key")?,
            }),
            "moveto" => Ok(ActionCommand::MoveTo {
                x: int_param(params, &cmd.name, "x")?,
                y: int_param(params, &cmd.name, "y")?,
                duration: opt_float_param(params, "duration")?
                    .unwrap_or(DEFAULT_MOVE_DURATION),
            }),
            "scroll" => Ok(resolve_scroll(params)?),
            "pagedown" => Ok(ActionCommand::PageDown),
            WAIT => {
                let seconds = float_param(params, &cmd.name, "seconds")?;
                // Non-finite or oversized values would poison the sleep
                // conversion; reject them here as a parameter fault.
                if !seconds.is_finite() || seconds > MAX_WAIT_SECONDS {
                    return Err(ParamError::BadValue {
                        name: "seconds",
                        expected: "duration of at most 3600 seconds",
                    });
                }
                Ok(ActionCommand::Wait { seconds })
            }
            CLARIFY => Ok(ActionCommand::Clarify {
                message: string_param(params, &cmd.name, "message")?,
            }),
            // contains() above makes this unreachable, but the registry and
            // this match are maintained together.
            other => Err(ParamError::UnknownCommand(other.to_string())),
        }
    }
}

/// Scroll has a documented quirk: models frequently send a `y` delta and no
/// `clicks` key. When `clicks` is absent the `y` value (default 0) is used
/// as the click count and no position is passed through.
fn resolve_scroll(params: &Map<String, Value>) -> Result<ActionCommand, ParamError> {
    if params.contains_key("clicks") {
        Ok(ActionCommand::Scroll {
            clicks: int_param(params, "scroll", "clicks")?,
            x: opt_int_param(params, "x")?,
            y: opt_int_param(params, "y")?,
        })
    } else {
        Ok(ActionCommand::Scroll {
            clicks: opt_int_param(params, "y")?.unwrap_or(0),
            x: None,
            y: None,
        })
    }
}

fn int_param(
    params: &Map<String, Value>,
    command: &str,
    name: &'static str,
) -> Result<i64, ParamError> {
    match params.get(name) {
        Some(value) => coerce_int(value, name),
        None => Err(ParamError::MissingParam {
            command: command.to_string(),
            name,
        }),
    }
}

fn opt_int_param(
    params: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<i64>, ParamError> {
    match params.get(name) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => coerce_int(value, name).map(Some),
    }
}

fn float_param(
    params: &Map<String, Value>,
    command: &str,
    name: &'static str,
) -> Result<f64, ParamError> {
    match params.get(name) {
        Some(value) => coerce_float(value, name),
        None => Err(ParamError::MissingParam {
            command: command.to_string(),
            name,
        }),
    }
}

fn opt_float_param(
    params: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<f64>, ParamError> {
    match params.get(name) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => coerce_float(value, name).map(Some),
    }
}

fn string_param(
    params: &Map<String, Value>,
    command: &str,
    name: &'static str,
) -> Result<String, ParamError> {
    match params.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        // Scalars stringify; the model occasionally types numbers.
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(ParamError::BadValue {
            name,
            expected: "string",
        }),
        None => Err(ParamError::MissingParam {
            command: command.to_string(),
            name,
        }),
    }
}

fn coerce_int(value: &Value, name: &'static str) -> Result<i64, ParamError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .ok_or(ParamError::BadValue {
                name,
                expected: "integer",
            }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                .ok_or(ParamError::BadValue {
                    name,
                    expected: "integer",
                })
        }
        _ => Err(ParamError::BadValue {
            name,
            expected: "integer",
        }),
    }
}

fn coerce_float(value: &Value, name: &'static str) -> Result<f64, ParamError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or(ParamError::BadValue {
            name,
            expected: "number",
        }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| ParamError::BadValue {
            name,
            expected: "number",
        }),
        _ => Err(ParamError::BadValue {
            name,
            expected: "number",
        }),
    }
}
