//! # Host Bridge Traits
//!
//! Contracts between the decode core and the collaborators it drives but does
//! not implement.
//!
//! ## Overview
//!
//! The decode core sequences buffer hand-off and lifecycle transitions. Everything
//! on either side of that exchange is supplied by the host:
//!
//! - A [`SampleSource`](media::SampleSource) demultiplexes a container into
//!   elementary-stream samples.
//! - A [`DecodingEngine`](engine::DecodingEngine) is the opaque hardware or
//!   software codec exposing input and output buffer pools.
//! - A [`Renderer`](render::Renderer) consumes decoded units. Audio and video
//!   outputs are wrapped through [`AudioSink`](render::AudioSink) and
//!   [`VideoSurface`](render::VideoSurface).
//!
//! ## Traits
//!
//! ### Media input
//! - [`SampleSource`](media::SampleSource) - Format description and sample reads
//! - [`SourceOpener`](media::SourceOpener) - Resolves paths and opens sources
//!
//! ### Decoding
//! - [`DecodingEngine`](engine::DecodingEngine) - Slot-based buffer exchange device
//! - [`EngineFactory`](engine::EngineFactory) - Creates engines by codec identifier
//!
//! ### Output
//! - [`Renderer`](render::Renderer) - Consumes one decoded unit at a time
//! - [`AudioSink`](render::AudioSink) / [`VideoSurface`](render::VideoSurface) - Host outputs
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Slot Ownership
//!
//! Engine buffers are addressed by [`SlotIndex`](engine::SlotIndex). A slot is
//! owned by the engine until it is dequeued; the caller then owns it until it
//! queues the slot back (input) or releases it (output). [`BufferPool`](engine::BufferPool)
//! handles only give access to slot memory, never ownership.
//!
//! ## Error Handling
//!
//! Source and output bridges report [`BridgeError`](error::BridgeError); engines
//! report [`EngineError`](engine::EngineError), which distinguishes recoverable
//! configuration deferral from hard failures.
//!
//! ## Thread Safety
//!
//! Per-pipeline bridges (`SampleSource`, `DecodingEngine`, `Renderer`) are
//! `Send` and are only ever touched by the pipeline's worker thread. Shared
//! factories (`SourceOpener`, `EngineFactory`, `Clock`) are `Send + Sync`.

pub mod engine;
pub mod error;
pub mod media;
pub mod render;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use engine::{
    BufferFlags, BufferPool, DecodingEngine, EngineError, EngineFactory, FrameBufferDescriptor,
    OutputStatus, SlotIndex,
};
pub use media::{FormatDescriptor, SampleSource, SourceOpener, TrackKind, TrackParams};
pub use render::{AudioParams, AudioSink, PcmEncoding, Renderer, VideoParams, VideoSurface};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
