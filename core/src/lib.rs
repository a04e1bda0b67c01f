//! screenpilot-core: the perceive-decide-act control loop
//!
//! A closed loop that captures the screen, asks a vision-capable model what
//! to do next, coerces the free-text reply into a validated command,
//! executes it through an input effector, and feeds the outcome back into
//! the next request.
//!
//! The loop is built from trait seams so the external collaborators stay
//! swappable (and mockable): [`capture::ScreenSource`] for the screen,
//! [`effector::Effector`] for input injection, and
//! [`oracle::DecisionTransport`] for the model endpoint.

pub mod capture;
pub mod command;
pub mod config;
pub mod controller;
pub mod effector;
pub mod error;
pub mod extract;
pub mod oracle;
pub mod prompt;

mod shell;

pub use capture::{PerceptionFrame, ScreenSource, ShellCapture};
pub use command::{ActionOutcome, CommandRegistry, DecodedCommand, Dispatcher};
pub use config::Config;
pub use controller::{FailurePolicy, LoopController, LoopExit, LoopState};
pub use effector::{Effector, FailsafeGuard, LoggingEffector, ShellEffector};
pub use error::{CaptureError, ExtractionError, OracleError, ParamError};
pub use extract::ResponseExtractor;
pub use oracle::{HttpTransport, OracleClient};
pub use prompt::PromptBuilder;
