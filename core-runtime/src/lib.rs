//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the decode pipeline crates:
//! - Logging and tracing infrastructure
//! - Configuration management (bridges and decoder settings)
//! - Decoder event bus
//!
//! ## Overview
//!
//! This crate holds the ambient utilities the decode core depends on. It
//! establishes the logging conventions, the fail-fast configuration builder and
//! the broadcast channel hosts use to observe pipelines.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, DecoderSettings};
pub use error::{Error, Result};
pub use events::{DecoderEvent, EventBus, EventStream};
