//! Command dispatch
//!
//! The dispatcher is the sole enforcement point for the registry invariant:
//! a command whose name is not a registry key never invokes any effector
//! method. It also never fails hard. Every fault on the way to the effector
//! (unknown name, parameter mismatch, effector error) is converted into an
//! `ActionOutcome { success: false }`; what to do about a failed action is
//! the loop controller's decision, carried through the next prompt.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::command::decoded::{ActionCommand, DecodedCommand};
use crate::command::registry::CommandRegistry;
use crate::effector::Effector;

/// Result of the last dispatched command.
///
/// Exactly one instance is live at a time; the controller overwrites it each
/// iteration and uses it only to build the next feedback prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// Name the oracle requested
    pub action: String,
    /// Parameters as the oracle supplied them
    pub params: Map<String, Value>,
    /// Whether the action executed cleanly
    pub success: bool,
}

/// Validates decoded commands against the registry and drives the effector.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    effector: Arc<dyn Effector>,
    /// Pause after a successful non-wait action so the next capture sees the
    /// settled screen rather than an in-flight transition.
    settle_delay: Duration,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        effector: Arc<dyn Effector>,
        settle_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Dispatcher {
            registry,
            effector,
            settle_delay,
            cancel,
        }
    }

    /// Execute a decoded command and report the outcome. Never errors.
    pub async fn dispatch(&self, cmd: &DecodedCommand) -> ActionOutcome {
        let action = match ActionCommand::resolve(cmd, &self.registry) {
            Ok(action) => action,
            Err(e) => {
                warn!(command = %cmd.name, error = %e, "rejected command");
                return self.outcome(cmd, false);
            }
        };

        // Clarify short-circuits: relay the message, report success, and
        // never touch the effector surface.
        if let ActionCommand::Clarify { message } = &action {
            info!(message = %message, "oracle asks for clarification");
            return self.outcome(cmd, true);
        }

        let is_wait = matches!(action, ActionCommand::Wait { .. });
        match self.execute(action).await {
            Ok(()) => {
                let params = serde_json::Value::Object(cmd.params.clone());
                info!(command = %cmd.name, params = %params, "action performed");
                if !is_wait {
                    self.sleep(self.settle_delay).await;
                }
                self.outcome(cmd, true)
            }
            Err(e) => {
                warn!(command = %cmd.name, error = %e, "action failed");
                self.outcome(cmd, false)
            }
        }
    }

    async fn execute(&self, action: ActionCommand) -> anyhow::Result<()> {
        let effector = &self.effector;
        match action {
            ActionCommand::Click { x, y } => effector.click(x, y).await,
            ActionCommand::DoubleClick { x, y } => effector.double_click(x, y).await,
            ActionCommand::RightClick { x, y } => effector.right_click(x, y).await,
            ActionCommand::Type { text } => effector.type_text(&text).await,
            ActionCommand::KeyDown { key } => effector.key_down(&key).await,
            ActionCommand::KeyUp { key } => effector.key_up(&key).await,
            ActionCommand::Press { key } => effector.press(&key).await,
            ActionCommand::MoveTo { x, y, duration } => {
                effector.move_to(x, y, duration).await
            }
            ActionCommand::Scroll { clicks, x, y } => effector.scroll(clicks, x, y).await,
            ActionCommand::PageDown => effector.page_down().await,
            ActionCommand::Wait { seconds } => {
                // The one intentionally blocking action.
                self.sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
                Ok(())
            }
            ActionCommand::Clarify { .. } => Ok(()),
        }
    }

    fn outcome(&self, cmd: &DecodedCommand, success: bool) -> ActionOutcome {
        ActionOutcome {
            action: cmd.name.clone(),
            params: cmd.params.clone(),
            success,
        }
    }

    /// Sleep that ends early on cancellation, so an interrupt is observable
    /// during the settle delay and during `wait` actions.
    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}
