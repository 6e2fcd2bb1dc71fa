//! # Core Configuration Module
//!
//! Configuration management for decode pipelines.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding the host bridges and the tunables shared by every pipeline created
//! from it. The builder fails fast when a required bridge is missing, so a
//! pipeline can never be sequenced against a half-configured host.
//!
//! ## Required Dependencies
//!
//! - `SourceOpener` - Resolves paths and opens sample sources
//! - `EngineFactory` - Creates decoding engines by codec id
//!
//! ## Optional Dependencies
//!
//! - `Clock` - Time source for render pacing (default: `SystemClock`)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, DecoderSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .source_opener(Arc::new(MyOpener))
//!     .engine_factory(Arc::new(MyEngineFactory))
//!     .settings(DecoderSettings::default().with_sync_render(false))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing bridges produce Error::CapabilityMissing
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, EngineFactory, SourceOpener, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Core configuration shared by all decode pipelines of a host.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Opens sample sources (required)
    pub source_opener: Arc<dyn SourceOpener>,

    /// Creates decoding engines (required)
    pub engine_factory: Arc<dyn EngineFactory>,

    /// Time source for render pacing
    pub clock: Arc<dyn Clock>,

    /// Pipeline tunables
    pub settings: DecoderSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("source_opener", &"SourceOpener { ... }")
            .field("engine_factory", &"EngineFactory { ... }")
            .field("clock", &"Clock { ... }")
            .field("settings", &self.settings)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()
    }
}

/// Tunables applied to every pipeline.
///
/// Every field has a serde default so partial JSON documents load cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderSettings {
    /// Bound on each wait for a free engine input slot.
    ///
    /// Default: 2000 µs.
    #[serde(default = "default_input_dequeue_timeout")]
    pub input_dequeue_timeout: Duration,

    /// Bound on each poll for decoded engine output.
    ///
    /// Default: 1000 µs.
    #[serde(default = "default_output_dequeue_timeout")]
    pub output_dequeue_timeout: Duration,

    /// Hold each frame until its presentation time while decoding.
    ///
    /// Default: true.
    #[serde(default = "default_sync_render")]
    pub sync_render: bool,

    /// Capacity of the decoder event broadcast channel.
    ///
    /// Default: 100.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Prefix of worker thread names; the pipeline id is appended.
    ///
    /// Default: `codec-decode`.
    #[serde(default = "default_worker_thread_prefix")]
    pub worker_thread_prefix: String,
}

fn default_input_dequeue_timeout() -> Duration {
    Duration::from_micros(2000)
}

fn default_output_dequeue_timeout() -> Duration {
    Duration::from_micros(1000)
}

fn default_sync_render() -> bool {
    true
}

fn default_event_buffer_size() -> usize {
    100
}

fn default_worker_thread_prefix() -> String {
    "codec-decode".to_string()
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            input_dequeue_timeout: default_input_dequeue_timeout(),
            output_dequeue_timeout: default_output_dequeue_timeout(),
            sync_render: default_sync_render(),
            event_buffer_size: default_event_buffer_size(),
            worker_thread_prefix: default_worker_thread_prefix(),
        }
    }
}

impl DecoderSettings {
    /// Settings for offline processing: no pacing, frames flow as fast as the
    /// engine produces them.
    pub fn unpaced() -> Self {
        Self {
            sync_render: false,
            ..Default::default()
        }
    }

    /// Parse settings from a JSON document; absent fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid decoder settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_sync_render(mut self, enabled: bool) -> Self {
        self.sync_render = enabled;
        self
    }

    pub fn with_dequeue_timeouts(mut self, input: Duration, output: Duration) -> Self {
        self.input_dequeue_timeout = input;
        self.output_dequeue_timeout = output;
        self
    }

    pub fn with_worker_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_thread_prefix = prefix.into();
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.input_dequeue_timeout.is_zero() {
            return Err(Error::Config(
                "input_dequeue_timeout must be > 0".to_string(),
            ));
        }

        if self.output_dequeue_timeout.is_zero() {
            return Err(Error::Config(
                "output_dequeue_timeout must be > 0".to_string(),
            ));
        }

        // Dequeues are polling waits; a long bound delays stop and pause.
        if self.input_dequeue_timeout > Duration::from_secs(1)
            || self.output_dequeue_timeout > Duration::from_secs(1)
        {
            return Err(Error::Config(
                "dequeue timeouts must not exceed 1 second".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config("event_buffer_size must be > 0".to_string()));
        }

        if self.worker_thread_prefix.trim().is_empty() {
            return Err(Error::Config(
                "worker_thread_prefix cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn source_opener_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SourceOpener".to_string(),
        message: "SourceOpener implementation is required to open sample sources. \
                 Inject the host demultiplexer, or bridge_software::MemorySourceOpener \
                 for in-memory samples."
            .to_string(),
    }
}

fn engine_factory_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "EngineFactory".to_string(),
        message: "EngineFactory implementation is required to create decoding engines. \
                 Inject the platform codec factory, or bridge_software::PassthroughEngineFactory \
                 for pass-through decoding."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    source_opener: Option<Arc<dyn SourceOpener>>,
    engine_factory: Option<Arc<dyn EngineFactory>>,
    clock: Option<Arc<dyn Clock>>,
    settings: Option<DecoderSettings>,
}

impl CoreConfigBuilder {
    /// Sets the source opener implementation (required).
    pub fn source_opener(mut self, opener: Arc<dyn SourceOpener>) -> Self {
        self.source_opener = Some(opener);
        self
    }

    /// Sets the engine factory implementation (required).
    pub fn engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engine_factory = Some(factory);
        self
    }

    /// Sets the clock used for render pacing.
    ///
    /// Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the pipeline tunables.
    pub fn settings(mut self, settings: DecoderSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge was not set
    /// - [`Error::Config`] when the settings are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let source_opener = self.source_opener.ok_or_else(source_opener_missing_error)?;
        let engine_factory = self
            .engine_factory
            .ok_or_else(engine_factory_missing_error)?;

        let config = CoreConfig {
            source_opener,
            engine_factory,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            settings: self.settings.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
