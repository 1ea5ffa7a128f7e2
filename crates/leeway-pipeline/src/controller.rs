//! The pipeline controller: capture, then analysis, one flow at a time.
//!
//! All state lives in [`Pipeline`] and is only touched by `handle_action`.
//! Slow work (acquiring an image, calling the backend) runs in spawned tasks
//! that post their result back as an [`Action`] tagged with the attempt that
//! started them. Completions from any other attempt are dropped.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use leeway_core::{
    AnalysisBackend, AnalysisInput, CaptureGateway, DesignError, DesignRequest, DesignResponse,
    ImageSource, RequestBuilder, ResponseParser,
};

use crate::action::{Action, Phase, PipelineError, PipelineSnapshot, Transition};

enum State {
    Idle {
        last_error: Option<PipelineError>,
    },
    Capturing {
        source: ImageSource,
        input: AnalysisInput,
    },
    Analyzing {
        request: DesignRequest,
    },
    Analyzed {
        request: DesignRequest,
        response: DesignResponse,
        degraded: bool,
    },
    Failed {
        request: DesignRequest,
        error: PipelineError,
    },
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Idle { .. } => Phase::Idle,
            State::Capturing { .. } => Phase::Capturing,
            State::Analyzing { .. } => Phase::Analyzing,
            State::Analyzed { .. } => Phase::Analyzed,
            State::Failed { .. } => Phase::Failed,
        }
    }

    fn snapshot(&self) -> PipelineSnapshot {
        let mut snapshot = PipelineSnapshot {
            phase: self.phase(),
            ..PipelineSnapshot::idle()
        };
        match self {
            State::Idle { last_error } => snapshot.error = last_error.clone(),
            State::Capturing { .. } => {}
            State::Analyzing { request } => snapshot.request = Some(request.clone()),
            State::Analyzed {
                request,
                response,
                degraded,
            } => {
                snapshot.request = Some(request.clone());
                snapshot.response = Some(response.clone());
                snapshot.degraded = *degraded;
            }
            State::Failed { request, error } => {
                snapshot.request = Some(request.clone());
                snapshot.error = Some(error.clone());
            }
        }
        snapshot
    }
}

pub struct Pipeline {
    gateway: Arc<dyn CaptureGateway>,
    backend: Arc<dyn AnalysisBackend>,
    builder: RequestBuilder,
    parser: ResponseParser,
    state: State,
    /// Number of the most recent capture or analysis attempt.
    attempt: u64,
    capture_task: Option<AbortHandle>,
    save_captures: bool,
    tx: mpsc::UnboundedSender<Action>,
    snapshot_tx: watch::Sender<PipelineSnapshot>,
}

impl Pipeline {
    /// Create a pipeline and the receiving end of its action channel.
    pub fn new(
        gateway: Arc<dyn CaptureGateway>,
        backend: Arc<dyn AnalysisBackend>,
    ) -> (Self, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(PipelineSnapshot::idle());
        let pipeline = Self {
            gateway,
            backend,
            builder: RequestBuilder::new(),
            parser: ResponseParser::new(),
            state: State::Idle { last_error: None },
            attempt: 0,
            capture_task: None,
            save_captures: false,
            tx,
            snapshot_tx,
        };
        (pipeline, rx)
    }

    /// Save camera photos to the media library before analyzing them.
    pub fn with_save_captures(mut self, save: bool) -> Self {
        self.save_captures = save;
        self
    }

    /// A sender for posting actions from elsewhere.
    pub fn sender(&self) -> mpsc::UnboundedSender<Action> {
        self.tx.clone()
    }

    /// Receive a snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn state(&self) -> PipelineSnapshot {
        self.state.snapshot()
    }

    pub fn start_capture(&mut self, source: ImageSource, input: AnalysisInput) -> Transition {
        self.handle_action(Action::StartCapture { source, input })
    }

    pub fn start_analysis(&mut self, input: AnalysisInput) -> Transition {
        self.handle_action(Action::StartAnalysis(input))
    }

    pub fn cancel_capture(&mut self) -> Transition {
        self.handle_action(Action::CancelCapture)
    }

    pub fn reset(&mut self) -> Transition {
        self.handle_action(Action::Reset)
    }

    /// Apply one action. Publishes a snapshot when the state changed.
    pub fn handle_action(&mut self, action: Action) -> Transition {
        let transition = match action {
            Action::StartCapture { source, input } => self.on_start_capture(source, input),
            Action::StartAnalysis(input) => self.on_start_analysis(input),
            Action::CancelCapture => self.on_cancel_capture(),
            Action::Reset => self.on_reset(),
            Action::ImageAcquired { attempt, handle } => {
                if !self.is_current(attempt, Phase::Capturing) {
                    return self.stale("ImageAcquired", attempt);
                }
                self.capture_task = None;
                let State::Capturing { source, input } = self.take_state() else {
                    return Transition::Rejected;
                };
                info!(image = %handle, "Image ready, starting analysis");
                match self.builder.build(&input, Some(handle)) {
                    Ok(request) => {
                        let persist = self.save_captures && source == ImageSource::Camera;
                        self.begin_analysis(request, persist);
                    }
                    Err(e) => self.fail_to_idle(&e),
                }
                Transition::Applied
            }
            Action::CaptureFailed { attempt, error } => {
                if !self.is_current(attempt, Phase::Capturing) {
                    return self.stale("CaptureFailed", attempt);
                }
                self.capture_task = None;
                self.fail_to_idle(&error);
                Transition::Applied
            }
            Action::BackendSucceeded { attempt, raw } => {
                if !self.is_current(attempt, Phase::Analyzing) {
                    return self.stale("BackendSucceeded", attempt);
                }
                let State::Analyzing { request } = self.take_state() else {
                    return Transition::Rejected;
                };
                let outcome = self.parser.parse_outcome(&raw, &request);
                let degraded = outcome.is_degraded();
                let response = outcome.into_response();
                info!(
                    suggestions = response.suggestions.len(),
                    degraded, "Analysis complete"
                );
                self.state = State::Analyzed {
                    request,
                    response,
                    degraded,
                };
                Transition::Applied
            }
            Action::BackendFailed { attempt, error } => {
                if !self.is_current(attempt, Phase::Analyzing) {
                    return self.stale("BackendFailed", attempt);
                }
                let State::Analyzing { request } = self.take_state() else {
                    return Transition::Rejected;
                };
                error!(error = %error, "Analysis failed");
                self.state = State::Failed {
                    request,
                    error: PipelineError::from(&error),
                };
                Transition::Applied
            }
        };

        if transition == Transition::Applied {
            self.publish();
        }
        transition
    }

    /// Process actions until no stage is running. Returns the final snapshot.
    pub async fn run_until_settled(
        &mut self,
        rx: &mut mpsc::UnboundedReceiver<Action>,
    ) -> PipelineSnapshot {
        while self.phase().is_busy() {
            let Some(action) = rx.recv().await else {
                break;
            };
            self.handle_action(action);
        }
        self.state()
    }

    fn on_start_capture(&mut self, source: ImageSource, input: AnalysisInput) -> Transition {
        if self.phase().is_busy() {
            debug!(phase = %self.phase(), "Ignoring capture request while busy");
            return Transition::Rejected;
        }
        if let Err(e) = input.validate() {
            warn!(error = %e, "Rejected analysis input");
            self.fail_to_idle(&e);
            return Transition::Applied;
        }

        let attempt = self.next_attempt();
        info!(attempt, source = %source, "Starting capture");
        let gateway = self.gateway.clone();
        let task_source = source.clone();
        let capture = self.spawn_stage(
            async move {
                match gateway.acquire_image(&task_source).await {
                    Ok(handle) => Action::ImageAcquired { attempt, handle },
                    Err(error) => Action::CaptureFailed { attempt, error },
                }
            },
            Action::CaptureFailed {
                attempt,
                error: DesignError::CaptureFailed("capture task panicked".to_string()),
            },
        );
        self.capture_task = Some(capture);
        self.state = State::Capturing { source, input };
        Transition::Applied
    }

    fn on_start_analysis(&mut self, input: AnalysisInput) -> Transition {
        if self.phase().is_busy() {
            debug!(phase = %self.phase(), "Ignoring analysis request while busy");
            return Transition::Rejected;
        }
        match self.builder.build(&input, None) {
            Ok(request) => {
                self.next_attempt();
                self.begin_analysis(request, false);
            }
            Err(e) => {
                warn!(error = %e, "Rejected analysis input");
                self.fail_to_idle(&e);
            }
        }
        Transition::Applied
    }

    fn on_cancel_capture(&mut self) -> Transition {
        if self.phase() != Phase::Capturing {
            return Transition::Rejected;
        }
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        // Anything the aborted task already posted is now stale.
        self.next_attempt();
        info!("Capture cancelled");
        self.state = State::Idle { last_error: None };
        Transition::Applied
    }

    fn on_reset(&mut self) -> Transition {
        if self.phase().is_busy() {
            return Transition::Rejected;
        }
        debug!(phase = %self.phase(), "Reset");
        self.state = State::Idle { last_error: None };
        Transition::Applied
    }

    /// Enter `Analyzing` and spawn the backend call for the current attempt.
    fn begin_analysis(&mut self, request: DesignRequest, persist: bool) {
        let attempt = self.attempt;
        info!(attempt, request_id = %request.id(), "Starting analysis");

        let gateway = self.gateway.clone();
        let backend = self.backend.clone();
        let task_request = request.clone();
        self.spawn_stage(
            async move {
                if persist {
                    if let Some(handle) = task_request.image_uri() {
                        if !gateway.persist_image(handle).await {
                            warn!(image = %handle, "Captured photo was not saved");
                        }
                    }
                }
                match backend.analyze(&task_request).await {
                    Ok(raw) => Action::BackendSucceeded { attempt, raw },
                    Err(error) => Action::BackendFailed { attempt, error },
                }
            },
            Action::BackendFailed {
                attempt,
                error: DesignError::BackendError("analysis task panicked".to_string()),
            },
        );

        self.state = State::Analyzing { request };
    }

    /// Run a stage in its own task and post the action it yields.
    ///
    /// A stage that panics posts `on_panic` instead. An aborted stage posts
    /// nothing.
    fn spawn_stage<F>(&self, stage: F, on_panic: Action) -> AbortHandle
    where
        F: Future<Output = Action> + Send + 'static,
    {
        let tx = self.tx.clone();
        let task = tokio::spawn(stage);
        let abort = task.abort_handle();
        tokio::spawn(async move {
            match task.await {
                Ok(action) => {
                    let _ = tx.send(action);
                }
                Err(e) if e.is_panic() => {
                    error!("Pipeline stage panicked");
                    let _ = tx.send(on_panic);
                }
                Err(_) => debug!("Pipeline stage cancelled"),
            }
        });
        abort
    }

    fn fail_to_idle(&mut self, error: &DesignError) {
        warn!(kind = %error.kind(), error = %error, "Returning to idle");
        self.state = State::Idle {
            last_error: Some(PipelineError::from(error)),
        };
    }

    fn next_attempt(&mut self) -> u64 {
        self.attempt += 1;
        self.attempt
    }

    fn is_current(&self, attempt: u64, phase: Phase) -> bool {
        attempt == self.attempt && self.phase() == phase
    }

    fn stale(&self, what: &str, attempt: u64) -> Transition {
        debug!(
            action = what,
            attempt,
            current = self.attempt,
            "Dropping stale completion"
        );
        Transition::Stale
    }

    fn take_state(&mut self) -> State {
        std::mem::replace(&mut self.state, State::Idle { last_error: None })
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
    }
}
