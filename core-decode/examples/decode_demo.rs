//! Decode pipeline demonstration
//!
//! Runs a paced audio pipeline over an in-memory clip, pausing, seeking and
//! resuming it while a second thread prints the lifecycle events published on
//! the event bus.
//!
//! Run with:
//! ```bash
//! cargo run -p core-decode --example decode_demo
//!
//! # JSON logs with worker-level detail
//! cargo run -p core-decode --example decode_demo -- json "core_decode=trace"
//! ```

use anyhow::Context;
use bridge_software::{
    MemorySampleSource, MemorySourceOpener, PassthroughEngineFactory, RecordingAudioSink,
};
use bridge_traits::time::LogLevel;
use bridge_traits::{FormatDescriptor, PcmEncoding, TrackKind, TrackParams};
use core_decode::{initialize, AudioKind, DecodeState, EventBusListener, PipelineConfig};
use core_runtime::config::{CoreConfig, DecoderSettings};
use core_runtime::events::EventStream;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const CLIP: &str = "/demo/tone.pcm";
const FRAME_INTERVAL_US: i64 = 20_000;
const FRAMES: usize = 25;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };
    let mut logging = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug);
    if let Some(filter) = args.get(2) {
        logging = logging.with_filter(filter.clone());
    }
    init_logging(logging).context("failed to initialize logging")?;

    let track = FormatDescriptor::new(
        "audio/raw",
        TrackParams::Audio {
            sample_rate: 48_000,
            channels: 2,
            pcm_encoding: PcmEncoding::S16Le,
        },
    )
    .with_duration_us(FRAMES as i64 * FRAME_INTERVAL_US);

    let opener = Arc::new(MemorySourceOpener::new());
    opener.register(
        CLIP,
        TrackKind::Audio,
        MemorySampleSource::uniform(track, FRAMES, FRAME_INTERVAL_US, 3_840),
    );

    let core = CoreConfig::builder()
        .source_opener(opener)
        .engine_factory(Arc::new(PassthroughEngineFactory::default()))
        .settings(DecoderSettings::default().with_worker_thread_prefix("demo-decode"))
        .build()?;

    let listener = EventBusListener::from_settings(&core.settings);
    let mut events = EventStream::new(listener.bus().subscribe());
    let printer = thread::spawn(move || {
        while let Ok(event) = events.blocking_recv() {
            println!("[{:?}] {}: {:?}", event.severity(), event.description(), event);
        }
    });

    let sink = RecordingAudioSink::new();
    let pipeline = initialize(
        PipelineConfig::new(CLIP),
        AudioKind::new(sink.clone()),
        &core,
        Arc::new(listener),
    )?;
    let handle = pipeline.start()?;
    info!(id = %handle.id(), duration = ?handle.duration(), "Pipeline started");

    handle.resume()?;
    thread::sleep(Duration::from_millis(150));

    handle.pause()?;
    info!(position = ?handle.current_timestamp(), "Paused");

    handle.seek_and_play(Duration::from_millis(300))?;

    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.state() != DecodeState::Finish && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }

    let report = handle.shutdown()?;
    info!(
        frames = report.frames_rendered,
        written = sink.written().len(),
        clean = report.is_clean(),
        "Pipeline destroyed"
    );

    printer
        .join()
        .map_err(|_| anyhow::anyhow!("event printer panicked"))?;
    Ok(())
}
