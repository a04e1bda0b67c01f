//! The loop controller
//!
//! Sequences capture, prompt construction, the decision request, extraction,
//! and dispatch across iterations, and owns the policy for what happens when
//! any stage fails:
//!
//! - capture failure: stay in the same state, retry after a fixed delay,
//!   forever (capture trouble is transient and operator-visible)
//! - oracle unavailable: log, wait, re-enter the same state with the frame
//!   discarded (fail soft, don't escalate)
//! - extraction failure or an unusable command: roll back to the original
//!   goal prompt, resynchronizing the oracle with clean instructions instead
//!   of compounding confusion from a bad reply
//! - dispatch failure: never an error, just `success: false` in the next
//!   feedback prompt
//!
//! The effector's fail-safe override is suspended for the whole run and
//! restored on every exit path, including cancellation.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::capture::ScreenSource;
use crate::command::dispatcher::{ActionOutcome, Dispatcher};
use crate::config::TimingConfig;
use crate::effector::{Effector, FailsafeGuard};
use crate::extract::ResponseExtractor;
use crate::oracle::client::OracleClient;
use crate::prompt::PromptBuilder;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No goal yet
    AwaitingGoal,
    /// Next request uses the original goal prompt
    FreshCycle,
    /// Next request uses the feedback prompt built from the last outcome
    FeedbackCycle,
    /// The loop has exited
    Terminated,
}

/// Why `run` returned.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// Cancelled by the operator (interrupt or quit)
    Cancelled,
    /// An action failed and the failure policy asks the operator first
    ActionFailed(ActionOutcome),
}

/// What to do when a dispatched action reports failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep looping; the failure feeds the next feedback prompt
    Continue,
    /// Return to the caller so the operator can decide
    Pause,
}

/// The perceive-decide-act state machine.
pub struct LoopController {
    screen: Arc<dyn ScreenSource>,
    oracle: OracleClient,
    extractor: ResponseExtractor,
    dispatcher: Dispatcher,
    prompts: PromptBuilder,
    effector: Arc<dyn Effector>,
    timing: TimingConfig,
    cancel: CancellationToken,
    failure_policy: FailurePolicy,
    state: LoopState,
    /// The single live outcome record; overwritten each iteration.
    last_outcome: Option<ActionOutcome>,
}

impl LoopController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        screen: Arc<dyn ScreenSource>,
        oracle: OracleClient,
        extractor: ResponseExtractor,
        dispatcher: Dispatcher,
        prompts: PromptBuilder,
        effector: Arc<dyn Effector>,
        timing: TimingConfig,
        cancel: CancellationToken,
    ) -> Self {
        LoopController {
            screen,
            oracle,
            extractor,
            dispatcher,
            prompts,
            effector,
            timing,
            cancel,
            failure_policy: FailurePolicy::Continue,
            state: LoopState::AwaitingGoal,
            last_outcome: None,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run the loop for the given goal until cancelled (or, under
    /// [`FailurePolicy::Pause`], until an action fails).
    ///
    /// Each call starts a fresh cycle; the original goal prompt is built
    /// once here and reused verbatim for every rollback.
    pub async fn run(&mut self, goal: &str) -> LoopExit {
        let initial_prompt = self.prompts.initial(goal);
        self.state = LoopState::FreshCycle;
        self.last_outcome = None;

        let _failsafe = FailsafeGuard::suspend(self.effector.clone());

        let exit = loop {
            if self.cancel.is_cancelled() {
                break LoopExit::Cancelled;
            }

            let frame = match self.screen.capture().await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "screen capture failed; retrying");
                    self.idle(self.timing.capture_retry()).await;
                    continue;
                }
            };

            let prompt = match (&self.state, &self.last_outcome) {
                (LoopState::FeedbackCycle, Some(outcome)) => self.prompts.feedback(outcome),
                _ => initial_prompt.clone(),
            };

            // The decision request is raced against cancellation so an
            // interrupt is observed during the in-flight call and during
            // the client's backoff sleeps, not just between cycles.
            let raw = tokio::select! {
                _ = self.cancel.cancelled() => break LoopExit::Cancelled,
                result = self.oracle.decide(&prompt, &frame) => match result {
                    Ok(raw) => raw,
                    Err(e) => {
                        // The frame is discarded; a fresh one is captured
                        // next pass. State is unchanged.
                        warn!(error = %e, "no decision this cycle");
                        self.idle(self.timing.oracle_retry()).await;
                        continue;
                    }
                },
            };
            drop(frame);

            let cmd = match self.extractor.extract(&raw) {
                Ok(cmd) if !cmd.name.trim().is_empty() => cmd,
                Ok(_) => {
                    warn!("decoded response carries no usable action; rolling back");
                    self.state = LoopState::FreshCycle;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "could not decode a command; rolling back");
                    self.state = LoopState::FreshCycle;
                    continue;
                }
            };

            let outcome = self.dispatcher.dispatch(&cmd).await;
            info!(
                action = %outcome.action,
                success = outcome.success,
                "cycle complete"
            );

            let failed = !outcome.success;
            self.last_outcome = Some(outcome.clone());
            self.state = LoopState::FeedbackCycle;

            if failed && self.failure_policy == FailurePolicy::Pause {
                break LoopExit::ActionFailed(outcome);
            }
        };

        self.state = LoopState::Terminated;
        exit
        // _failsafe drops here, restoring the override on every path.
    }

    /// Fixed delay that ends early on cancellation.
    async fn idle(&self, duration: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{PerceptionFrame, ScreenSource};
    use crate::command::registry::CommandRegistry;
    use crate::config::OracleConfig;
    use crate::effector::LoggingEffector;
    use crate::error::CaptureError;
    use crate::oracle::chat::{ChatRequest, RawResponse};
    use crate::oracle::client::DecisionTransport;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Plays back a fixed script of replies and records every prompt it was
    /// sent. When the script runs out it cancels the loop.
    struct ScriptedTransport {
        replies: Mutex<VecDeque<anyhow::Result<RawResponse>>>,
        prompts: Mutex<Vec<String>>,
        cancel: CancellationToken,
    }

    impl ScriptedTransport {
        fn new(
            replies: Vec<anyhow::Result<RawResponse>>,
            cancel: CancellationToken,
        ) -> Arc<Self> {
            Arc::new(ScriptedTransport {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
                cancel,
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DecisionTransport for ScriptedTransport {
        async fn send(&self, request: &ChatRequest) -> anyhow::Result<RawResponse> {
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(reply) => {
                    self.prompts
                        .lock()
                        .unwrap()
                        .push(request.messages[0].content.clone());
                    reply
                }
                None => {
                    self.cancel.cancel();
                    Err(anyhow!("script exhausted"))
                }
            }
        }
    }

    struct StubScreen {
        fail_first: AtomicU32,
    }

    impl StubScreen {
        fn new(fail_first: u32) -> Arc<Self> {
            Arc::new(StubScreen {
                fail_first: AtomicU32::new(fail_first),
            })
        }
    }

    #[async_trait]
    impl ScreenSource for StubScreen {
        async fn capture(&self) -> Result<PerceptionFrame, CaptureError> {
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CaptureError::CaptureFailed("display busy".to_string()));
            }
            Ok(PerceptionFrame::from_png(b"png"))
        }
    }

    fn controller(
        transport: Arc<ScriptedTransport>,
        screen: Arc<StubScreen>,
        cancel: CancellationToken,
    ) -> LoopController {
        let registry = Arc::new(CommandRegistry::standard());
        let effector: Arc<dyn Effector> = Arc::new(LoggingEffector::new());
        let oracle_config = OracleConfig {
            max_attempts: 1,
            ..OracleConfig::default()
        };
        LoopController::new(
            screen,
            OracleClient::new(transport, &oracle_config),
            ResponseExtractor::new(),
            Dispatcher::new(
                registry.clone(),
                effector.clone(),
                Duration::from_millis(500),
                cancel.clone(),
            ),
            PromptBuilder::new(&registry),
            effector,
            TimingConfig::default(),
            cancel,
        )
    }

    fn click_reply() -> anyhow::Result<RawResponse> {
        Ok(RawResponse::with_content(
            r#"{"action":"click","params":{"x":10,"y":20},"reasoning":"button"}"#,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn extraction_error_rolls_back_to_the_initial_prompt() {
        let cancel = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![
                click_reply(),
                Ok(RawResponse::with_content("no json here at all")),
                click_reply(),
            ],
            cancel.clone(),
        );
        let mut controller = controller(transport.clone(), StubScreen::new(0), cancel);

        let exit = controller.run("open the browser").await;
        assert_eq!(exit, LoopExit::Cancelled);
        assert_eq!(controller.state(), LoopState::Terminated);

        let prompts = transport.prompts();
        assert_eq!(prompts.len(), 3);
        // First cycle uses the goal prompt, second the feedback prompt.
        assert!(prompts[1].contains("Last action: click"));
        assert!(prompts[1].contains("Last action success: true"));
        // The bad reply rolls the third cycle back to the exact goal prompt.
        assert_eq!(prompts[2], prompts[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn unusable_action_name_also_rolls_back() {
        let cancel = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![
                click_reply(),
                Ok(RawResponse::with_content(r#"{"action":"","params":{}}"#)),
                click_reply(),
            ],
            cancel.clone(),
        );
        let mut controller = controller(transport.clone(), StubScreen::new(0), cancel);

        controller.run("goal").await;
        let prompts = transport.prompts();
        assert_eq!(prompts[2], prompts[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn oracle_failure_keeps_the_same_state() {
        let cancel = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![
                click_reply(),
                Err(anyhow!("connection refused")),
                click_reply(),
            ],
            cancel.clone(),
        );
        let mut controller = controller(transport.clone(), StubScreen::new(0), cancel);

        controller.run("goal").await;
        let prompts = transport.prompts();
        assert_eq!(prompts.len(), 3);
        // The failed cycle neither advanced nor rolled back: the request is
        // rebuilt from the same outcome, bit for bit.
        assert_eq!(prompts[2], prompts[1]);
        assert!(prompts[2].contains("Last action: click"));
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failures_retry_in_place() {
        let cancel = CancellationToken::new();
        let transport = ScriptedTransport::new(vec![click_reply()], cancel.clone());
        let mut controller = controller(transport.clone(), StubScreen::new(2), cancel);

        controller.run("goal").await;
        // Two failed captures, then one full cycle.
        assert_eq!(transport.prompts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_policy_returns_the_failed_outcome() {
        let cancel = CancellationToken::new();
        // An unknown action dispatches to a failed outcome.
        let transport = ScriptedTransport::new(
            vec![Ok(RawResponse::with_content(
                r#"{"action":"fly","params":{}}"#,
            ))],
            cancel.clone(),
        );
        let mut controller = controller(transport, StubScreen::new(0), cancel)
            .with_failure_policy(FailurePolicy::Pause);

        let exit = controller.run("goal").await;
        match exit {
            LoopExit::ActionFailed(outcome) => {
                assert_eq!(outcome.action, "fly");
                assert!(!outcome.success);
            }
            other => panic!("expected ActionFailed, got {other:?}"),
        }
    }

    /// Always fails, never gives up on its own.
    struct FailingTransport;

    #[async_trait]
    impl DecisionTransport for FailingTransport {
        async fn send(&self, _request: &ChatRequest) -> anyhow::Result<RawResponse> {
            Err(anyhow!("connection refused"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_retry_backoff() {
        let cancel = CancellationToken::new();
        let registry = Arc::new(CommandRegistry::standard());
        let effector: Arc<dyn Effector> = Arc::new(LoggingEffector::new());
        // Default retry policy: three attempts with 1s then 2s backoff.
        let mut controller = LoopController::new(
            StubScreen::new(0),
            OracleClient::new(Arc::new(FailingTransport), &OracleConfig::default()),
            ResponseExtractor::new(),
            Dispatcher::new(
                registry.clone(),
                effector.clone(),
                Duration::from_millis(500),
                cancel.clone(),
            ),
            PromptBuilder::new(&registry),
            effector,
            TimingConfig::default(),
            cancel.clone(),
        );

        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                cancel.cancel();
            }
        });

        let start = tokio::time::Instant::now();
        let exit = controller.run("goal").await;
        assert_eq!(exit, LoopExit::Cancelled);
        // Mid-backoff, not after the full 3s retry budget.
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn failsafe_is_restored_after_the_run() {
        let cancel = CancellationToken::new();
        let transport = ScriptedTransport::new(vec![], cancel.clone());

        let registry = Arc::new(CommandRegistry::standard());
        let effector: Arc<dyn Effector> = Arc::new(LoggingEffector::new());
        let oracle_config = OracleConfig {
            max_attempts: 1,
            ..OracleConfig::default()
        };
        let mut controller = LoopController::new(
            StubScreen::new(0),
            OracleClient::new(transport, &oracle_config),
            ResponseExtractor::new(),
            Dispatcher::new(
                registry.clone(),
                effector.clone(),
                Duration::from_millis(500),
                cancel.clone(),
            ),
            PromptBuilder::new(&registry),
            effector.clone(),
            TimingConfig::default(),
            cancel,
        );

        controller.run("goal").await;
        assert!(effector.failsafe());
    }
}
