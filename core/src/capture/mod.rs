//! Perception boundary: screen capture and encoding
//!
//! The loop only depends on the [`ScreenSource`] trait; the capture mechanism
//! itself is an external collaborator. [`ShellCapture`] is the supplied
//! backend: it shells out to whatever screenshot utility the platform has,
//! reads the PNG, and base64-encodes it for transport.

use crate::error::CaptureError;
use crate::shell::{have_program, run_cmd};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use tracing::debug;

/// One encoded screen snapshot.
///
/// Created fresh each iteration and dropped once the decision request
/// completes; frames are never retained across iterations.
#[derive(Debug, Clone)]
pub struct PerceptionFrame {
    /// Base64-encoded PNG of the screen
    pub image_base64: String,
    /// When the snapshot was taken
    pub captured_at: DateTime<Utc>,
}

impl PerceptionFrame {
    /// Encode raw PNG bytes into a transport-safe frame.
    pub fn from_png(bytes: &[u8]) -> Self {
        PerceptionFrame {
            image_base64: STANDARD.encode(bytes),
            captured_at: Utc::now(),
        }
    }
}

/// Source of perception frames.
#[async_trait]
pub trait ScreenSource: Send + Sync {
    /// Capture the current screen. Transient failures surface as
    /// [`CaptureError`], never as a panic; the controller retries.
    async fn capture(&self) -> Result<PerceptionFrame, CaptureError>;
}

/// Capture commands probed in order when none is configured.
/// `{path}` is replaced with the output file.
const CAPTURE_CANDIDATES: &[(&str, &str)] = &[
    ("screencapture", "screencapture -x -t png {path}"),
    ("grim", "grim {path}"),
    ("gnome-screenshot", "gnome-screenshot -f {path}"),
    ("scrot", "scrot -o {path}"),
];

/// Screen capture via an external screenshot utility.
pub struct ShellCapture {
    /// Command template with a `{path}` placeholder, if configured.
    command: Option<String>,
}

impl ShellCapture {
    pub fn new(command: Option<String>) -> Self {
        ShellCapture { command }
    }

    /// Resolve the capture command template for this system.
    async fn command_template(&self) -> Result<String, CaptureError> {
        if let Some(cmd) = &self.command {
            return Ok(cmd.clone());
        }
        for (program, template) in CAPTURE_CANDIDATES {
            if have_program(program).await {
                return Ok((*template).to_string());
            }
        }
        Err(CaptureError::BackendUnavailable(
            "no screenshot utility found (tried screencapture, grim, gnome-screenshot, scrot); \
             set capture.command in the config"
                .to_string(),
        ))
    }
}

#[async_trait]
impl ScreenSource for ShellCapture {
    async fn capture(&self) -> Result<PerceptionFrame, CaptureError> {
        let template = self.command_template().await?;

        let ts = Utc::now().format("%Y%m%d_%H%M%S%3f");
        let path = std::env::temp_dir().join(format!("screenpilot_{ts}.png"));
        let path_str = path.to_string_lossy().to_string();

        let rendered = if template.contains("{path}") {
            template.replace("{path}", &path_str)
        } else {
            format!("{template} {path_str}")
        };
        let mut parts = rendered.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| CaptureError::CaptureFailed("empty capture command".to_string()))?
            .to_string();
        let args: Vec<&str> = parts.collect();

        run_cmd(&program, &args)
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        // Permission problems tend to produce an empty file rather than a
        // non-zero exit, so check the size before trusting the output.
        let meta = tokio::fs::metadata(&path).await?;
        if meta.len() == 0 {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(CaptureError::CaptureFailed(
                "capture produced an empty file (missing screen recording permission?)"
                    .to_string(),
            ));
        }

        let bytes = tokio::fs::read(&path).await?;
        let _ = tokio::fs::remove_file(&path).await;

        debug!(bytes = bytes.len(), "captured screen");
        Ok(PerceptionFrame::from_png(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_encodes_png_bytes() {
        let frame = PerceptionFrame::from_png(b"\x89PNG\r\n");
        assert_eq!(frame.image_base64, STANDARD.encode(b"\x89PNG\r\n"));
    }

    #[tokio::test]
    async fn configured_command_wins_over_probing() {
        let capture = ShellCapture::new(Some("mygrabber --out {path}".to_string()));
        let template = capture.command_template().await.unwrap();
        assert_eq!(template, "mygrabber --out {path}");
    }
}
