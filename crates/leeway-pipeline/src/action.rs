//! Action enum, the message bus between callers, spawned stages and the
//! pipeline. Every state change starts as an action.

use serde::Serialize;

use leeway_core::{
    AnalysisInput, DesignError, DesignRequest, DesignResponse, ErrorKind, ImageHandle, ImageSource,
};

#[derive(Debug)]
pub enum Action {
    // ── Caller requests ─────────────────────────────────────
    /// Acquire an image, then analyze it.
    StartCapture {
        source: ImageSource,
        input: AnalysisInput,
    },
    /// Analyze a description without an image.
    StartAnalysis(AnalysisInput),
    /// Abandon the capture in progress.
    CancelCapture,
    /// Drop the held request, response and error.
    Reset,

    // ── Stage completions ───────────────────────────────────
    ImageAcquired {
        attempt: u64,
        handle: ImageHandle,
    },
    CaptureFailed {
        attempt: u64,
        error: DesignError,
    },
    BackendSucceeded {
        attempt: u64,
        raw: String,
    },
    BackendFailed {
        attempt: u64,
        error: DesignError,
    },
}

/// Outcome of handing one action to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The action changed the state.
    Applied,
    /// The action is not allowed in the current state and was ignored.
    Rejected,
    /// A completion from an attempt that is no longer current.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Capturing,
    Analyzing,
    Analyzed,
    Failed,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Capturing => "capturing",
            Phase::Analyzing => "analyzing",
            Phase::Analyzed => "analyzed",
            Phase::Failed => "failed",
        }
    }

    /// Whether a stage is running and new work must wait.
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Capturing | Phase::Analyzing)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure as shown to callers. Unlike [`DesignError`] it can be cloned
/// into every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineError {
    pub kind: ErrorKind,
    /// Text for the end user.
    pub message: String,
    /// The underlying error, for logs.
    pub detail: String,
}

impl From<&DesignError> for PipelineError {
    fn from(error: &DesignError) -> Self {
        Self {
            kind: error.kind(),
            message: error.user_message(),
            detail: error.to_string(),
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// What the pipeline holds after a transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub phase: Phase,
    pub request: Option<DesignRequest>,
    pub response: Option<DesignResponse>,
    /// The response is a raw-text fallback.
    pub degraded: bool,
    pub error: Option<PipelineError>,
}

impl PipelineSnapshot {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            request: None,
            response: None,
            degraded: false,
            error: None,
        }
    }
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
