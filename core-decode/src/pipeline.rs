//! # Decode Pipeline
//!
//! A [`Pipeline`] is the fully assembled result of the sequencer: source,
//! engine, renderer and media kind, ready to run. [`Pipeline::start`] moves
//! them onto a dedicated worker thread and returns a [`DecoderHandle`] for
//! control from any other thread.
//!
//! ## Worker Loop
//!
//! ```text
//! on_prepare
//! loop {
//!     park until runnable (announce on_pause when parked in Pause)
//!     exit if stopped
//!     apply a pending seek
//!     input step unless end of stream was queued
//!     output step: render + release, first frame pauses, seek completion,
//!                  end-of-stream descriptor finishes
//! }
//! teardown -> on_destroy
//! ```
//!
//! Engine failures inside the loop are logged and absorbed; the worker backs
//! off for one output timeout and tries again.
//!
//! ## Callback Ordering
//!
//! State changes and the callbacks they trigger are paired under a reentrant
//! notification gate, so listeners observe callbacks in transition order no
//! matter which thread caused them. The state lock itself is never held while
//! a listener runs.

use crate::config::{PipelineConfig, PipelineId};
use crate::error::{DecodeError, Result, ShutdownIssue, ShutdownReport};
use crate::kind::MediaKind;
use crate::listener::StateListener;
use crate::pacer::RenderPacer;
use crate::pump::BufferPump;
use crate::state::{DecodeState, ResumeOutcome, StateCell, Transition, Wake};
use bridge_traits::{
    Clock, DecodingEngine, EngineError, FormatDescriptor, FrameBufferDescriptor, Renderer,
    SampleSource,
};
use core_runtime::config::DecoderSettings;
use parking_lot::ReentrantMutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, info_span, trace, warn};

// ============================================================================
// Assembled Resources
// ============================================================================

/// Resources owned by one pipeline. Released exactly once, either by the
/// worker's teardown or when dropped unstarted.
pub(crate) struct WorkerParts {
    pub(crate) kind: Box<dyn MediaKind>,
    pub(crate) source: Box<dyn SampleSource>,
    pub(crate) engine: Box<dyn DecodingEngine>,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) pump: BufferPump,
    pub(crate) format: FormatDescriptor,
    /// `false` while engine configuration is deferred.
    pub(crate) configured: bool,
    released: bool,
}

impl WorkerParts {
    pub(crate) fn new(
        kind: Box<dyn MediaKind>,
        source: Box<dyn SampleSource>,
        engine: Box<dyn DecodingEngine>,
        renderer: Box<dyn Renderer>,
        pump: BufferPump,
        format: FormatDescriptor,
        configured: bool,
    ) -> Self {
        Self {
            kind,
            source,
            engine,
            renderer,
            pump,
            format,
            configured,
            released: false,
        }
    }

    /// Finalize the media kind, stop the source, stop and release the engine.
    ///
    /// An engine that refuses to stop is still released.
    fn release(&mut self) -> Vec<ShutdownIssue> {
        let mut issues = Vec::new();
        if std::mem::replace(&mut self.released, true) {
            return issues;
        }

        self.kind.finish();
        self.renderer.release();
        self.source.stop();

        if self.configured {
            match self.engine.stop() {
                Ok(()) => {}
                Err(EngineError::IllegalState(message)) => {
                    warn!(reason = %message, "Engine already stopped");
                    issues.push(ShutdownIssue::EngineAlreadyStopped(message));
                }
                Err(e) => {
                    warn!(error = %e, "Engine stop failed, releasing anyway");
                    issues.push(ShutdownIssue::EngineStopFailed(e.to_string()));
                }
            }
        }
        self.engine.release();
        self.pump.clear_end_of_stream();
        issues
    }
}

impl Drop for WorkerParts {
    fn drop(&mut self) {
        if !self.released {
            let issues = self.release();
            debug!(issues = issues.len(), "Released resources of an unstarted pipeline");
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// An initialized pipeline that has not been started yet.
///
/// Dropping it releases the engine and source without notifying the listener.
pub struct Pipeline {
    id: PipelineId,
    config: PipelineConfig,
    settings: DecoderSettings,
    clock: Arc<dyn Clock>,
    listener: Arc<dyn StateListener>,
    parts: WorkerParts,
}

impl Pipeline {
    pub(crate) fn new(
        id: PipelineId,
        config: PipelineConfig,
        settings: DecoderSettings,
        clock: Arc<dyn Clock>,
        listener: Arc<dyn StateListener>,
        parts: WorkerParts,
    ) -> Self {
        Self {
            id,
            config,
            settings,
            clock,
            listener,
            parts,
        }
    }

    pub fn id(&self) -> PipelineId {
        self.id
    }

    /// Configuration with the duration and end position derived from the source.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn format(&self) -> &FormatDescriptor {
        &self.parts.format
    }

    /// Whether the engine waits for [`DecoderHandle::retry_configuration`].
    pub fn is_configuration_deferred(&self) -> bool {
        !self.parts.configured
    }

    /// Enter `Start` and spawn the worker thread.
    ///
    /// # Errors
    ///
    /// [`DecodeError::WorkerSpawn`] if the thread cannot be created; the
    /// pipeline's resources are released and the state returns to `Stop`.
    pub fn start(self) -> Result<DecoderHandle> {
        let Pipeline {
            id,
            config,
            settings,
            clock,
            listener,
            parts,
        } = self;

        let shared = Arc::new(Shared {
            id,
            cell: StateCell::new(),
            gate: ReentrantMutex::new(()),
            position_us: AtomicI64::new(config.start_position_us()),
            listener,
            config,
        });

        shared.serialized(|| {
            if let Some(transition) = shared.cell.begin() {
                shared.notify_transition(transition);
            }
        });

        let worker = Worker {
            shared: Arc::clone(&shared),
            pacer: RenderPacer::new(clock),
            sync_render: settings.sync_render,
            backoff: settings.output_dequeue_timeout,
            end_position_us: shared.config.end_position_us(),
            seek_target: None,
            finish_announced: false,
            finished: false,
            frames_rendered: 0,
            issues: Vec::new(),
            parts,
        };

        let name = format!("{}-{}", settings.worker_thread_prefix, id);
        match thread::Builder::new().name(name).spawn(move || worker.run()) {
            Ok(handle) => {
                info!(pipeline_id = %id, "Decode worker started");
                Ok(DecoderHandle {
                    shared,
                    worker: Some(handle),
                })
            }
            Err(e) => {
                shared.serialized(|| {
                    if let Some(transition) = shared.cell.stop() {
                        shared.notify_transition(transition);
                    }
                });
                Err(DecodeError::WorkerSpawn(e))
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("mime", &self.parts.format.mime)
            .field("configured", &self.parts.configured)
            .finish()
    }
}

// ============================================================================
// Shared State
// ============================================================================

struct Shared {
    id: PipelineId,
    cell: StateCell,
    /// Pairs state changes with their callbacks.
    gate: ReentrantMutex<()>,
    /// Presentation time of the last rendered frame, in microseconds.
    position_us: AtomicI64,
    listener: Arc<dyn StateListener>,
    config: PipelineConfig,
}

impl Shared {
    fn serialized<R>(&self, f: impl FnOnce() -> R) -> R {
        let _gate = self.gate.lock();
        f()
    }

    fn notify_transition(&self, transition: Transition) {
        debug!(
            pipeline_id = %self.id,
            from = %transition.from,
            to = %transition.to,
            "State transition"
        );
        self.listener
            .on_transition(self.id, transition.from, transition.to);
    }
}

// ============================================================================
// Worker
// ============================================================================

struct Worker {
    shared: Arc<Shared>,
    parts: WorkerParts,
    pacer: RenderPacer,
    sync_render: bool,
    backoff: Duration,
    end_position_us: Option<i64>,
    /// Frames before this timestamp are dropped after a seek.
    seek_target: Option<i64>,
    finish_announced: bool,
    finished: bool,
    frames_rendered: u64,
    issues: Vec<ShutdownIssue>,
}

impl Worker {
    fn run(mut self) -> ShutdownReport {
        let shared = Arc::clone(&self.shared);
        let span = info_span!("decode_pipeline", pipeline_id = %shared.id);
        let _entered = span.enter();

        debug!(mime = %self.parts.format.mime, "Worker loop entered");
        shared.serialized(|| shared.listener.on_prepare(shared.id));

        loop {
            let awaiting_configuration = !self.parts.configured;
            let wake = shared.cell.park(awaiting_configuration, || {
                debug!("Parked in pause");
                shared.serialized(|| {
                    // A resume may have won the gate since the park saw Pause.
                    if shared.cell.state() == DecodeState::Pause {
                        shared.listener.on_pause(shared.id);
                    } else {
                        trace!("Pause lifted before it was announced");
                    }
                });
            });

            match wake {
                Wake::Exit => break,
                Wake::RetryConfiguration => self.retry_configuration(),
                Wake::Run(_) => self.step(),
            }
        }

        self.teardown()
    }

    fn step(&mut self) {
        if let Some(target_us) = self.shared.cell.take_pending_seek() {
            self.apply_seek(target_us);
        }

        let state = self.shared.cell.state();
        if !state.is_runnable() {
            return;
        }
        if state != DecodeState::Decoding {
            self.pacer.reset();
        }

        if let Err(e) = self.pump_once(state) {
            warn!(error = %e, state = %state, "Engine error absorbed");
            thread::sleep(self.backoff);
        }
    }

    fn pump_once(&mut self, state: DecodeState) -> std::result::Result<(), EngineError> {
        let parts = &mut self.parts;
        if !parts.pump.is_end_of_stream() {
            parts
                .pump
                .push_input(parts.engine.as_mut(), parts.source.as_mut())?;
        }

        match parts.pump.pull_output(parts.engine.as_mut())? {
            Some(info) => self.handle_output(state, info),
            None => Ok(()),
        }
    }

    fn handle_output(
        &mut self,
        state: DecodeState,
        info: FrameBufferDescriptor,
    ) -> std::result::Result<(), EngineError> {
        if info.is_end_of_stream() {
            self.render(&info);
            self.parts.engine.release_output(info.slot, true)?;
            self.end_of_stream();
            return Ok(());
        }

        let pts = info.presentation_time_us;
        let before_target = self.seek_target.is_some_and(|target| pts < target);
        let past_end = self.end_position_us.is_some_and(|end| pts > end);
        if before_target || past_end {
            trace!(pts, before_target, past_end, "Frame dropped");
            return self.parts.engine.release_output(info.slot, false);
        }

        if state == DecodeState::Decoding && self.sync_render {
            if let Some(delay) = self.pacer.delay_for(pts) {
                self.shared.cell.sleep_interruptibly(delay);
                let cell = &self.shared.cell;
                if cell.has_pending_seek() || cell.state() == DecodeState::Seeking {
                    trace!(pts, "Paced frame superseded by seek");
                    return self.parts.engine.release_output(info.slot, false);
                }
            }
        }

        self.render(&info);
        self.parts.engine.release_output(info.slot, true)?;
        self.frames_rendered += 1;
        self.shared.position_us.store(pts, Ordering::SeqCst);

        let shared = &self.shared;
        match state {
            DecodeState::Start => shared.serialized(|| {
                let (transitions, announce) = shared.cell.complete_first_frame();
                for transition in transitions {
                    shared.notify_transition(transition);
                }
                if announce {
                    shared.listener.on_running(shared.id);
                }
            }),
            DecodeState::Seeking => {
                self.seek_target = None;
                shared.serialized(|| {
                    if let Some(completion) = shared.cell.finish_seek() {
                        debug!(pts, "Seek completed");
                        shared.notify_transition(completion.transition);
                        if completion.announce_running {
                            shared.listener.on_running(shared.id);
                        }
                    }
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn render(&mut self, info: &FrameBufferDescriptor) {
        let WorkerParts { pump, renderer, .. } = &mut self.parts;
        trace!(slot = %info.slot, pts = info.presentation_time_us, size = info.size, "Rendering");
        pump.with_output(info, |data| renderer.render(data, info));
    }

    fn end_of_stream(&mut self) {
        self.seek_target = None;
        let shared = Arc::clone(&self.shared);
        let _gate = shared.gate.lock();
        let Some(transition) = shared.cell.finish_stream() else {
            return;
        };

        info!(frames = self.frames_rendered, "End of stream");
        self.finished = true;
        shared.notify_transition(transition);
        if !std::mem::replace(&mut self.finish_announced, true) {
            shared.listener.on_finish(shared.id);
        }
    }

    fn apply_seek(&mut self, target_us: i64) {
        let parts = &mut self.parts;
        if let Err(e) = parts.pump.flush(parts.engine.as_mut()) {
            warn!(error = %e, "Engine flush failed");
        }
        let landed_us = parts.source.seek(target_us);
        debug!(target_us, landed_us, "Seek applied");

        self.seek_target = Some(target_us);
        self.pacer.reset();
    }

    fn retry_configuration(&mut self) {
        let parts = &mut self.parts;
        match parts
            .kind
            .configure_engine(parts.engine.as_mut(), &parts.format)
        {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                debug!(reason = %e, "Engine configuration still deferred");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Deferred engine configuration failed");
                self.issues
                    .push(ShutdownIssue::ConfigurationFailed(e.to_string()));
                return;
            }
        }

        if let Err(e) = parts.engine.start() {
            warn!(error = %e, "Engine failed to start after configuration");
            self.issues
                .push(ShutdownIssue::ConfigurationFailed(e.to_string()));
            return;
        }

        parts.pump.attach(parts.engine.as_ref());
        parts.configured = true;
        info!("Deferred engine configuration completed");
    }

    fn teardown(mut self) -> ShutdownReport {
        debug!("Tearing down pipeline");
        let mut issues = std::mem::take(&mut self.issues);
        issues.extend(self.parts.release());

        let shared = Arc::clone(&self.shared);
        let _gate = shared.gate.lock();
        if let Some(transition) = shared.cell.stop() {
            shared.notify_transition(transition);
        }

        let report = ShutdownReport {
            issues,
            frames_rendered: self.frames_rendered,
            finished: self.finished,
        };
        info!(
            frames = report.frames_rendered,
            issues = report.issues.len(),
            "Pipeline destroyed"
        );
        shared.listener.on_destroy(shared.id, &report);
        report
    }
}

// ============================================================================
// Control Handle
// ============================================================================

/// Control surface of a running pipeline.
///
/// All methods may be called from any thread. Dropping the handle stops the
/// worker and waits for its teardown.
pub struct DecoderHandle {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<ShutdownReport>>,
}

impl DecoderHandle {
    pub fn id(&self) -> PipelineId {
        self.shared.id
    }

    pub fn state(&self) -> DecodeState {
        self.shared.cell.state()
    }

    pub fn is_decoding(&self) -> bool {
        self.state() == DecodeState::Decoding
    }

    pub fn is_seeking(&self) -> bool {
        self.state() == DecodeState::Seeking
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == DecodeState::Stop
    }

    /// Pause decoding. A no-op when already paused.
    pub fn pause(&self) -> Result<()> {
        let shared = &self.shared;
        shared.serialized(|| {
            if let Some(transition) = shared.cell.pause()? {
                shared.notify_transition(transition);
            }
            Ok(())
        })
    }

    /// Resume decoding from `Pause`.
    ///
    /// Before the first frame, or while seeking, the request is applied once
    /// the worker gets there. A finished stream must be seeked instead.
    pub fn resume(&self) -> Result<()> {
        let shared = &self.shared;
        shared.serialized(|| {
            if let ResumeOutcome::Resumed(transition) = shared.cell.resume()? {
                shared.notify_transition(transition);
                shared.listener.on_running(shared.id);
            }
            Ok(())
        })
    }

    /// Seek to `position`, keeping the current play/pause intent.
    pub fn seek_to(&self, position: Duration) -> Result<()> {
        self.seek(position, false)
    }

    /// Seek to `position` and decode from there.
    pub fn seek_and_play(&self, position: Duration) -> Result<()> {
        self.seek(position, true)
    }

    fn seek(&self, position: Duration, play: bool) -> Result<()> {
        let target_us = i64::try_from(position.as_micros()).unwrap_or(i64::MAX);
        let shared = &self.shared;
        shared.serialized(|| {
            if let Some(transition) = shared.cell.request_seek(target_us, play)? {
                shared.notify_transition(transition);
            }
            Ok(())
        })
    }

    /// Ask the worker to retry a deferred engine configuration.
    pub fn retry_configuration(&self) -> Result<()> {
        self.shared.cell.request_configuration_retry()
    }

    /// Signal the worker to stop. Idempotent; teardown runs on the worker.
    pub fn stop(&self) {
        let shared = &self.shared;
        shared.serialized(|| {
            if let Some(transition) = shared.cell.stop() {
                shared.notify_transition(transition);
            }
        });
    }

    /// Wait for the worker to exit and return its teardown report.
    ///
    /// The worker only exits once stopped; see [`shutdown`](Self::shutdown).
    pub fn join(mut self) -> Result<ShutdownReport> {
        let worker = self.worker.take().ok_or(DecodeError::NotRunning)?;
        worker.join().map_err(|_| DecodeError::WorkerPanicked)
    }

    /// Stop the worker and wait for teardown.
    pub fn shutdown(self) -> Result<ShutdownReport> {
        self.stop();
        self.join()
    }

    /// Presentation time of the last rendered frame.
    pub fn current_timestamp(&self) -> Duration {
        let us = self.shared.position_us.load(Ordering::SeqCst);
        Duration::from_micros(u64::try_from(us).unwrap_or(0))
    }

    pub fn duration(&self) -> Duration {
        self.shared.config.duration
    }

    pub fn end_position(&self) -> Option<Duration> {
        self.shared.config.end_position
    }

    pub fn file_path(&self) -> &str {
        &self.shared.config.path
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }
}

impl Drop for DecoderHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.stop();
            if worker.join().is_err() {
                warn!(pipeline_id = %self.shared.id, "Decode worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("path", &self.shared.config.path)
            .finish()
    }
}
