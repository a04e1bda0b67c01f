//! Prompt construction
//!
//! Two request shapes: the initial goal prompt and the feedback prompt that
//! carries the previous action and its outcome. Both embed the full command
//! catalog so the oracle cannot hallucinate unregistered actions, plus a
//! response-schema section with worked examples. Deliberately nothing else
//! is embedded: the request is stateless beyond one step back, trading
//! long-horizon coherence for bounded prompt size and stable latency.

use crate::command::dispatcher::ActionOutcome;
use crate::command::registry::CommandRegistry;
use serde_json::Value;
use std::fmt::Write;

/// Builds the decision request text for each loop state.
pub struct PromptBuilder {
    /// Pre-rendered command catalog, one line per registered command.
    catalog: String,
}

impl PromptBuilder {
    pub fn new(registry: &CommandRegistry) -> Self {
        let mut catalog = String::new();
        for spec in registry.specs() {
            let mut params: Vec<String> =
                spec.required.iter().map(|p| p.to_string()).collect();
            params.extend(spec.optional.iter().map(|p| format!("{p}?")));
            let _ = writeln!(
                catalog,
                "- {}{{{}}}: {}",
                spec.name,
                params.join(", "),
                spec.summary
            );
        }
        PromptBuilder { catalog }
    }

    /// The goal prompt used for a fresh cycle and for every rollback.
    pub fn initial(&self, goal: &str) -> String {
        format!(
            "You are a helpful assistant that controls the computer based on the user's \
             request and the current screen image.\n\
             Your response MUST be a single JSON object with an 'action' key, a 'params' key, \
             and a 'reasoning' key. The 'params' value MUST be an object. The 'reasoning' \
             should explain why you chose that action based on what you see on the screen.\n\n\
             Available actions:\n{catalog}\n{schema}\n\
             User's request: {goal}\n",
            catalog = self.catalog,
            schema = SCHEMA_SECTION,
            goal = goal,
        )
    }

    /// The feedback prompt: same contract, plus the last action and whether
    /// it succeeded so the oracle can self-correct.
    pub fn feedback(&self, outcome: &ActionOutcome) -> String {
        format!(
            "You are a helpful assistant that controls the computer. You are given the \
             previous action, its parameters, and whether it succeeded. Based on that and \
             the current screen image, determine the next action to perform.\n\
             Your response MUST be a single JSON object with an 'action' key, a 'params' key, \
             and a 'reasoning' key. The 'params' value MUST be an object.\n\n\
             Available actions:\n{catalog}\n{schema}\n\
             Last action: {action}\n\
             Last action parameters: {params}\n\
             Last action success: {success}\n",
            catalog = self.catalog,
            schema = SCHEMA_SECTION,
            action = outcome.action,
            params = Value::Object(outcome.params.clone()),
            success = outcome.success,
        )
    }
}

/// Worked examples covering a coordinate command, a text command, the
/// keyboard fallback for a failed scroll, and the clarify escape hatch.
const SCHEMA_SECTION: &str = r#"Here's how to format your JSON response:

{
  "action": "click",
  "params": {"x": 100, "y": 200},
  "reasoning": "I see a button at (100, 200) labeled 'Submit'. Clicking it will proceed to the next step."
}

{
  "action": "type",
  "params": {"text": "hello world"},
  "reasoning": "A text input field has focus. The user wants 'hello world' entered into it."
}

{
  "action": "pagedown",
  "params": {},
  "reasoning": "Scrolling with the mouse wheel did not work. Pressing Page Down is the next best way to scroll."
}

If the user's request is too vague or cannot be executed directly, respond like this:

{
  "action": "clarify",
  "params": {"message": "Please provide more specific instructions. For example, tell me which window to use."},
  "reasoning": "The request is too general. I need more information to act."
}
"#;
