//! # Decode Error Types
//!
//! Errors raised while sequencing a pipeline, while controlling a running one,
//! and the non-fatal issues collected during teardown.

use crate::state::DecodeState;
use bridge_traits::{BridgeError, EngineError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Initialization Errors
// ============================================================================

/// Fatal pipeline construction failures.
///
/// Each is reported exactly once through the listener's `on_error`; the
/// pipeline is never started afterwards.
#[derive(Error, Debug)]
pub enum InitError {
    /// The source path is empty or does not resolve.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The media kind cannot handle this request (e.g. no output surface).
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    /// The sample source failed to open or has no usable format.
    #[error("Failed to open source: {0}")]
    SourceOpen(String),

    /// The renderer could not be constructed.
    #[error("Failed to initialize renderer: {0}")]
    RenderInit(#[source] BridgeError),

    /// No engine exists for the codec id, or the id is invalid.
    #[error("Failed to create decoder: {0}")]
    CodecCreate(#[source] EngineError),

    /// The engine rejected its configuration or failed to start.
    #[error("Failed to configure decoder: {0}")]
    CodecConfig(#[source] EngineError),
}

/// Classification of an [`InitError`], stable across messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitErrorKind {
    InvalidInput,
    UnsupportedSource,
    SourceOpen,
    RenderInit,
    CodecCreate,
    CodecConfig,
}

impl InitErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitErrorKind::InvalidInput => "invalid_input",
            InitErrorKind::UnsupportedSource => "unsupported_source",
            InitErrorKind::SourceOpen => "source_open",
            InitErrorKind::RenderInit => "render_init",
            InitErrorKind::CodecCreate => "codec_create",
            InitErrorKind::CodecConfig => "codec_config",
        }
    }
}

impl fmt::Display for InitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InitError {
    pub fn kind(&self) -> InitErrorKind {
        match self {
            InitError::InvalidInput(_) => InitErrorKind::InvalidInput,
            InitError::UnsupportedSource(_) => InitErrorKind::UnsupportedSource,
            InitError::SourceOpen(_) => InitErrorKind::SourceOpen,
            InitError::RenderInit(_) => InitErrorKind::RenderInit,
            InitError::CodecCreate(_) => InitErrorKind::CodecCreate,
            InitError::CodecConfig(_) => InitErrorKind::CodecConfig,
        }
    }
}

// ============================================================================
// Control Errors
// ============================================================================

/// Errors returned by pipeline control calls.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The pipeline was stopped or never started.
    #[error("Pipeline is not running")]
    NotRunning,

    /// The request is not valid in the current state.
    #[error("Cannot {action} while in {from} state")]
    InvalidTransition {
        from: DecodeState,
        action: &'static str,
    },

    /// The worker thread could not be spawned.
    #[error("Failed to spawn decode worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The worker thread panicked before completing teardown.
    #[error("Decode worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, DecodeError>;

// ============================================================================
// Teardown Report
// ============================================================================

/// Non-fatal problem observed while a pipeline ran or shut down.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownIssue {
    /// The engine reported an illegal state on stop (it was already stopped).
    #[error("engine already stopped: {0}")]
    EngineAlreadyStopped(String),

    /// The engine failed to stop for another reason; it was released anyway.
    #[error("engine stop failed: {0}")]
    EngineStopFailed(String),

    /// A deferred configuration retry failed permanently.
    #[error("deferred configuration failed: {0}")]
    ConfigurationFailed(String),
}

/// Outcome of a pipeline's teardown, delivered through `on_destroy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub issues: Vec<ShutdownIssue>,
    /// Decoded frames handed to the renderer (the end-of-stream marker excluded).
    pub frames_rendered: u64,
    /// Whether end of stream was reached before shutdown.
    pub finished: bool,
}

impl ShutdownReport {
    /// `true` when teardown completed without issues.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_error_kinds() {
        let cases = [
            (InitError::InvalidInput("".into()), "invalid_input"),
            (InitError::UnsupportedSource("x".into()), "unsupported_source"),
            (InitError::SourceOpen("x".into()), "source_open"),
            (
                InitError::RenderInit(BridgeError::NotAvailable("sink".into())),
                "render_init",
            ),
            (
                InitError::CodecCreate(EngineError::UnsupportedCodec("video/x".into())),
                "codec_create",
            ),
            (
                InitError::CodecConfig(EngineError::Configuration("bad".into())),
                "codec_config",
            ),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind().as_str(), kind);
        }
    }

    #[test]
    fn test_init_error_source_chain() {
        use std::error::Error as _;

        let error = InitError::CodecCreate(EngineError::InvalidCodec(String::new()));
        assert!(error.source().is_some());
        assert!(InitError::InvalidInput("missing".into()).source().is_none());
    }

    #[test]
    fn test_invalid_transition_message() {
        let error = DecodeError::InvalidTransition {
            from: DecodeState::Finish,
            action: "resume",
        };
        assert_eq!(error.to_string(), "Cannot resume while in finish state");
    }

    #[test]
    fn test_shutdown_report() {
        let mut report = ShutdownReport::default();
        assert!(report.is_clean());

        report
            .issues
            .push(ShutdownIssue::EngineAlreadyStopped("stop called twice".into()));
        assert!(!report.is_clean());
        assert_eq!(
            report.issues[0].to_string(),
            "engine already stopped: stop called twice"
        );
    }
}
