//! # Core Decode Module
//!
//! Drives compressed elementary-stream samples through a decoding engine and
//! hands decoded units to a renderer, on one dedicated worker thread per
//! pipeline.
//!
//! ## Overview
//!
//! - **Sequencer** (`sequencer`): builds a [`Pipeline`] step by step, reporting
//!   the first failure once through the listener
//! - **State record** (`state`): lifecycle state, running flag and pending
//!   control requests behind one mutex/condition pair
//! - **Buffer pump** (`pump`): bounded slot exchange with the engine
//! - **Worker and handle** (`pipeline`): the decode loop and its thread-safe
//!   control surface
//! - **Media kinds** (`kind`): audio and video specializations
//! - **Listener** (`listener`): lifecycle callbacks, with an adapter onto the
//!   runtime event bus
//!
//! ## Usage
//!
//! ```ignore
//! use core_decode::{initialize, AudioKind, NoopListener, PipelineConfig};
//! use std::sync::Arc;
//!
//! let pipeline = initialize(
//!     PipelineConfig::new("/media/track.m4a"),
//!     AudioKind::new(host_sink),
//!     &core_config,
//!     Arc::new(NoopListener),
//! )?;
//! let handle = pipeline.start()?;
//! handle.resume()?;
//! // ...
//! let report = handle.shutdown()?;
//! ```

pub mod config;
pub mod error;
pub mod kind;
pub mod listener;
pub mod pacer;
pub mod pipeline;
pub mod pump;
pub mod sequencer;
pub mod state;

pub use config::{PipelineConfig, PipelineId};
pub use error::{
    DecodeError, InitError, InitErrorKind, Result, ShutdownIssue, ShutdownReport,
};
pub use kind::{AudioKind, MediaKind, VideoKind};
pub use listener::{EventBusListener, NoopListener, StateListener};
pub use pipeline::{DecoderHandle, Pipeline};
pub use pump::BufferPump;
pub use sequencer::initialize;
pub use state::{DecodeState, Transition};
