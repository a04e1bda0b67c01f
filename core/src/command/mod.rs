//! Command catalog, decoding, and dispatch
//!
//! The oracle speaks in names and parameter maps; this module turns that
//! into typed, validated effector invocations. The registry is the single
//! source of truth for what actions exist, the resolver coerces raw
//! parameters into a tagged [`ActionCommand`], and the dispatcher executes it
//! and reports an [`ActionOutcome`] without ever failing hard.

pub mod decoded;
pub mod dispatcher;
pub mod registry;

pub use decoded::{ActionCommand, DecodedCommand};
pub use dispatcher::{ActionOutcome, Dispatcher};
pub use registry::{CommandRegistry, CommandSpec};
