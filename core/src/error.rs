//! Error kinds for the control loop
//!
//! Each failure mode the loop can recover from has its own type, so the
//! controller and the logs can tell exactly what went wrong:
//! - [`CaptureError`]: transient screen-capture failure, retried indefinitely
//! - [`OracleError`]: the decision service could not be reached within the
//!   bounded retry budget
//! - [`ExtractionError`]: the oracle replied but no usable command could be
//!   decoded from the reply
//! - [`ParamError`]: a decoded command did not satisfy its registry contract
//!
//! Dispatch faults are deliberately *not* an error type: they are folded into
//! `ActionOutcome { success: false }` and fed back into the next prompt.

use thiserror::Error;

/// Failure to capture the current screen state.
///
/// Always treated as transient: the loop logs it, waits, and captures again.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No capture backend could be found on this system.
    #[error("no screen capture backend available: {0}")]
    BackendUnavailable(String),

    /// The capture command ran but did not produce a usable image.
    #[error("screen capture failed: {0}")]
    CaptureFailed(String),

    /// Reading or cleaning up the captured image failed.
    #[error("failed to read captured image: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to obtain a decision from the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Every attempt failed; the whole cycle is abandoned (fail soft).
    #[error("oracle unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },
}

/// Failure to decode a structured command from the oracle's free-text reply.
///
/// Each variant names the precise stage that rejected the response, so a log
/// line is enough to see why decoding failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The response envelope carries no message content to search.
    #[error("response has no 'message' content to parse")]
    MalformedEnvelope,

    /// No JSON object could be found in the content, or the candidate
    /// substring was not valid JSON.
    #[error("response content does not contain a valid JSON object")]
    NotJson,

    /// The parsed object is missing the `action` or `params` key.
    #[error("response JSON is missing the 'action' or 'params' key")]
    MissingKeys,

    /// `params` was present but is not a key-value mapping.
    #[error("response 'params' is not a JSON object")]
    ParamsNotAMap,

    /// Any unexpected fault inside the extractor, converted rather than
    /// propagated so extraction never takes the loop down.
    #[error("extraction failed: {0}")]
    Internal(String),
}

/// A decoded command that does not satisfy its registry entry.
///
/// Surfaces only inside the dispatcher, which converts it into a failed
/// outcome; it never crosses the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// The command name is not a registry key.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// A required parameter is absent.
    #[error("command '{command}' is missing required parameter '{name}'")]
    MissingParam { command: String, name: &'static str },

    /// A parameter was present but could not be coerced to its expected type.
    #[error("parameter '{name}' is not a valid {expected}")]
    BadValue {
        name: &'static str,
        expected: &'static str,
    },
}
