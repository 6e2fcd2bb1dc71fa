//! Shared fixtures for core-decode integration tests.

#![allow(dead_code)]

use bridge_software::{MemorySampleSource, MemorySourceOpener, PassthroughEngineFactory};
use bridge_traits::{
    BufferFlags, BufferPool, DecodingEngine, EngineError, EngineFactory, FormatDescriptor,
    OutputStatus, PcmEncoding, SlotIndex, TrackKind, TrackParams,
};
use core_decode::{
    DecodeState, InitError, InitErrorKind, PipelineId, ShutdownReport, StateListener,
};
use core_runtime::config::{CoreConfig, DecoderSettings};
use mockall::mock;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const CLIP: &str = "/media/clip.raw";
pub const WAIT: Duration = Duration::from_secs(5);

/// One listener callback, as observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Prepare,
    Error(InitErrorKind),
    Running,
    Pause,
    Finish,
    Destroy(ShutdownReport),
    Transition(DecodeState, DecodeState),
}

/// Listener recording every callback, with blocking waits for tests.
#[derive(Default)]
pub struct RecordingListener {
    callbacks: Mutex<Vec<Callback>>,
    changed: Condvar,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, callback: Callback) {
        self.callbacks.lock().push(callback);
        self.changed.notify_all();
    }

    pub fn callbacks(&self) -> Vec<Callback> {
        self.callbacks.lock().clone()
    }

    /// Callbacks other than transitions.
    pub fn lifecycle(&self) -> Vec<Callback> {
        self.callbacks()
            .into_iter()
            .filter(|callback| !matches!(callback, Callback::Transition(..)))
            .collect()
    }

    pub fn transitions(&self) -> Vec<(DecodeState, DecodeState)> {
        self.callbacks()
            .into_iter()
            .filter_map(|callback| match callback {
                Callback::Transition(from, to) => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, expected: &Callback) -> usize {
        self.callbacks
            .lock()
            .iter()
            .filter(|callback| *callback == expected)
            .count()
    }

    /// Block until `predicate` holds over the recorded callbacks or `WAIT`
    /// elapses. Returns whether it held.
    pub fn wait_until(&self, predicate: impl Fn(&[Callback]) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        let mut callbacks = self.callbacks.lock();
        while !predicate(&callbacks) {
            if self.changed.wait_until(&mut callbacks, deadline).timed_out() {
                return predicate(&callbacks);
            }
        }
        true
    }

    /// Block until `expected` has been recorded `times` times.
    pub fn wait_for(&self, expected: Callback, times: usize) -> bool {
        self.wait_until(|callbacks| {
            callbacks.iter().filter(|callback| **callback == expected).count() >= times
        })
    }

    pub fn wait_for_destroy(&self) -> Option<ShutdownReport> {
        self.wait_until(|callbacks| {
            callbacks
                .iter()
                .any(|callback| matches!(callback, Callback::Destroy(_)))
        });
        self.callbacks().into_iter().find_map(|callback| match callback {
            Callback::Destroy(report) => Some(report),
            _ => None,
        })
    }
}

impl StateListener for RecordingListener {
    fn on_prepare(&self, _id: PipelineId) {
        self.record(Callback::Prepare);
    }

    fn on_error(&self, _id: PipelineId, error: &InitError) {
        self.record(Callback::Error(error.kind()));
    }

    fn on_running(&self, _id: PipelineId) {
        self.record(Callback::Running);
    }

    fn on_pause(&self, _id: PipelineId) {
        self.record(Callback::Pause);
    }

    fn on_finish(&self, _id: PipelineId) {
        self.record(Callback::Finish);
    }

    fn on_destroy(&self, _id: PipelineId, report: &ShutdownReport) {
        self.record(Callback::Destroy(report.clone()));
    }

    fn on_transition(&self, _id: PipelineId, from: DecodeState, to: DecodeState) {
        self.record(Callback::Transition(from, to));
    }
}

pub fn video_format(duration_us: i64) -> FormatDescriptor {
    FormatDescriptor::new(
        "video/raw",
        TrackParams::Video {
            width: 64,
            height: 48,
            rotation: 0,
            frame_rate: None,
        },
    )
    .with_duration_us(duration_us)
}

pub fn audio_format(duration_us: i64) -> FormatDescriptor {
    FormatDescriptor::new(
        "audio/raw",
        TrackParams::Audio {
            sample_rate: 48_000,
            channels: 2,
            pcm_encoding: PcmEncoding::S16Le,
        },
    )
    .with_duration_us(duration_us)
}

/// An opener serving `source` as the `kind` track of [`CLIP`].
pub fn opener_with(kind: TrackKind, source: MemorySampleSource) -> Arc<MemorySourceOpener> {
    let opener = Arc::new(MemorySourceOpener::new());
    opener.register(CLIP, kind, source);
    opener
}

/// Unpaced core configuration over in-memory bridges.
pub fn core_config(opener: Arc<MemorySourceOpener>) -> CoreConfig {
    core_config_with(opener, PassthroughEngineFactory::default())
}

pub fn core_config_with(
    opener: Arc<MemorySourceOpener>,
    factory: PassthroughEngineFactory,
) -> CoreConfig {
    CoreConfig::builder()
        .source_opener(opener)
        .engine_factory(Arc::new(factory))
        .settings(DecoderSettings::unpaced())
        .build()
        .expect("valid test configuration")
}

// ============================================================================
// Engine Doubles
// ============================================================================

mock! {
    pub Engine {}

    impl DecodingEngine for Engine {
        fn configure(&mut self, format: &FormatDescriptor) -> Result<(), EngineError>;
        fn start(&mut self) -> Result<(), EngineError>;
        fn input_buffers(&self) -> BufferPool;
        fn output_buffers(&self) -> BufferPool;
        fn dequeue_input_slot(&mut self, timeout: Duration) -> Result<Option<SlotIndex>, EngineError>;
        fn queue_input(
            &mut self,
            slot: SlotIndex,
            size: usize,
            presentation_time_us: i64,
            flags: BufferFlags,
        ) -> Result<(), EngineError>;
        fn dequeue_output_slot(&mut self, timeout: Duration) -> Result<OutputStatus, EngineError>;
        fn release_output(&mut self, slot: SlotIndex, render: bool) -> Result<(), EngineError>;
        fn flush(&mut self) -> Result<(), EngineError>;
        fn stop(&mut self) -> Result<(), EngineError>;
        fn release(&mut self);
    }
}

/// Factory handing out one prepared engine.
pub struct SingleEngineFactory {
    engine: Mutex<Option<MockEngine>>,
}

impl SingleEngineFactory {
    pub fn new(engine: MockEngine) -> Arc<Self> {
        Arc::new(Self {
            engine: Mutex::new(Some(engine)),
        })
    }
}

impl EngineFactory for SingleEngineFactory {
    fn create_decoder(&self, mime: &str) -> Result<Box<dyn DecodingEngine>, EngineError> {
        match self.engine.lock().take() {
            Some(engine) => Ok(Box::new(engine)),
            None => Err(EngineError::UnsupportedCodec(mime.to_string())),
        }
    }
}
