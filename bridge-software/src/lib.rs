//! # Software Bridge Implementations
//!
//! In-process implementations of the bridge traits, for demos, tests and hosts
//! that feed pre-demultiplexed samples from memory.
//!
//! ## Overview
//!
//! - `MemorySampleSource` / `MemorySourceOpener` serve samples registered in memory
//! - `PassthroughEngine` is a slot-exchanging engine that copies each input
//!   sample into an output slot unchanged
//! - `RecordingAudioSink` / `RecordingVideoSurface` record what was presented
//!
//! None of these perform real demultiplexing or decompression.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_software::{MemorySampleSource, MemorySourceOpener, PassthroughEngineFactory};
//! use bridge_traits::{FormatDescriptor, TrackKind, TrackParams};
//!
//! let format = FormatDescriptor::new("video/raw", TrackParams::Unknown).with_duration_us(5_000);
//! let source = MemorySampleSource::uniform(format, 3, 1_000, 64);
//!
//! let opener = MemorySourceOpener::new();
//! opener.register("clip.raw", TrackKind::Video, source);
//! let factory = PassthroughEngineFactory::default();
//! ```

mod engine;
mod output;
mod source;

pub use engine::{PassthroughConfig, PassthroughEngine, PassthroughEngineFactory};
pub use output::{PresentedFrame, RecordingAudioSink, RecordingVideoSurface};
pub use source::{MemorySample, MemorySampleSource, MemorySourceOpener};
