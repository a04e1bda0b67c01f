//! Response extraction
//!
//! The oracle's reply is free text that may wrap the JSON command in
//! commentary. Extraction locates the JSON-object-shaped substring, parses
//! it, and validates its shape, reporting a distinct
//! [`ExtractionError`] reason for each way decoding can fail. The substring
//! rule is a single greedy match: everything from the first `{` to the last
//! `}` in the content. Extraction never panics; unexpected faults are
//! converted into `ExtractionError::Internal`.

use crate::command::decoded::DecodedCommand;
use crate::error::ExtractionError;
use crate::oracle::chat::RawResponse;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Greedy object match: first `{` to last `}`, newlines included.
fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static pattern compiles"))
}

/// Decodes structured commands out of raw oracle replies.
#[derive(Debug, Default)]
pub struct ResponseExtractor;

impl ResponseExtractor {
    pub fn new() -> Self {
        ResponseExtractor
    }

    /// Extract a [`DecodedCommand`] from a raw response.
    ///
    /// Validation order matches the reported reasons: envelope first, then
    /// JSON shape, then the `action`/`params` keys, then the `params` type.
    pub fn extract(&self, raw: &RawResponse) -> Result<DecodedCommand, ExtractionError> {
        let content = raw
            .message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .ok_or(ExtractionError::MalformedEnvelope)?;

        debug!(content, "oracle reply");

        let candidate = json_object_pattern()
            .find(content)
            .ok_or(ExtractionError::NotJson)?
            .as_str();

        let value: Value =
            serde_json::from_str(candidate).map_err(|_| ExtractionError::NotJson)?;

        let object = value.as_object().ok_or(ExtractionError::NotJson)?;

        let action = object
            .get("action")
            .and_then(Value::as_str)
            .ok_or(ExtractionError::MissingKeys)?;
        let params = object.get("params").ok_or(ExtractionError::MissingKeys)?;
        let params = params
            .as_object()
            .ok_or(ExtractionError::ParamsNotAMap)?
            .clone();

        let reasoning = object
            .get("reasoning")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(reasoning) = &reasoning {
            info!(reasoning = %reasoning, "oracle reasoning");
        }

        Ok(DecodedCommand {
            name: action.to_string(),
            params,
            reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(content: &str) -> Result<DecodedCommand, ExtractionError> {
        ResponseExtractor::new().extract(&RawResponse::with_content(content))
    }

    #[test]
    fn extracts_command_embedded_in_prose() {
        let content = "Sure! Looking at the screen, I'll click the button.\n\
                       {\"action\":\"click\",\"params\":{\"x\":100,\"y\":200},\"reasoning\":\"the button is there\"}\n\
                       Let me know how it goes.";
        let cmd = extract(content).unwrap();
        assert_eq!(cmd.name, "click");
        assert_eq!(cmd.params.get("x"), Some(&json!(100)));
        assert_eq!(cmd.params.get("y"), Some(&json!(200)));
        assert_eq!(cmd.reasoning.as_deref(), Some("the button is there"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let raw = RawResponse::with_content(
            r#"{"action":"type","params":{"text":"hi"},"reasoning":"field has focus"}"#,
        );
        let extractor = ResponseExtractor::new();
        let first = extractor.extract(&raw).unwrap();
        let second = extractor.extract(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_content_is_a_malformed_envelope() {
        let raw = RawResponse::default();
        let err = ResponseExtractor::new().extract(&raw).unwrap_err();
        assert_eq!(err, ExtractionError::MalformedEnvelope);
    }

    #[test]
    fn content_without_an_object_is_not_json() {
        assert_eq!(
            extract("I would click the button at 100, 200."),
            Err(ExtractionError::NotJson)
        );
    }

    #[test]
    fn invalid_json_inside_braces_is_not_json() {
        assert_eq!(
            extract("{action: click, params: nope}"),
            Err(ExtractionError::NotJson)
        );
    }

    #[test]
    fn missing_action_or_params_keys() {
        assert_eq!(
            extract(r#"{"params":{"x":1}}"#),
            Err(ExtractionError::MissingKeys)
        );
        assert_eq!(
            extract(r#"{"action":"click"}"#),
            Err(ExtractionError::MissingKeys)
        );
    }

    #[test]
    fn params_as_list_is_rejected() {
        assert_eq!(
            extract(r#"{"action":"click","params":[100,200]}"#),
            Err(ExtractionError::ParamsNotAMap)
        );
    }

    #[test]
    fn params_as_scalar_is_rejected() {
        assert_eq!(
            extract(r#"{"action":"wait","params":5}"#),
            Err(ExtractionError::ParamsNotAMap)
        );
    }

    #[test]
    fn reasoning_is_optional() {
        let cmd = extract(r#"{"action":"pagedown","params":{}}"#).unwrap();
        assert_eq!(cmd.name, "pagedown");
        assert!(cmd.reasoning.is_none());
    }

    #[test]
    fn greedy_match_spans_nested_objects() {
        let cmd = extract(
            "prefix {\"action\":\"click\",\"params\":{\"x\":1,\"y\":2}} suffix",
        )
        .unwrap();
        assert_eq!(cmd.name, "click");
        assert_eq!(cmd.params.len(), 2);
    }
}
