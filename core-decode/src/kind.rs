//! # Media Kinds
//!
//! A [`MediaKind`] specializes a pipeline for one kind of elementary stream.
//! The sequencer consults it while building the pipeline and the worker calls
//! [`MediaKind::finish`] during teardown.
//!
//! - [`AudioKind`] writes PCM to a host [`AudioSink`]
//! - [`VideoKind`] presents pictures on a host [`VideoSurface`] and defers
//!   engine configuration until the surface exists

use bridge_traits::{
    AudioParams, AudioSink, BridgeError, DecodingEngine, EngineError, FormatDescriptor,
    FrameBufferDescriptor, Renderer, TrackKind, TrackParams, VideoParams, VideoSurface,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Capability hooks specializing a pipeline for one track kind.
pub trait MediaKind: Send {
    /// Track selected from the source.
    fn track_kind(&self) -> TrackKind;

    /// Pre-check run before the source is opened.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    /// Read kind-specific parameters from the track format.
    fn init_params(&mut self, format: &FormatDescriptor) -> Result<(), String>;

    /// Build the renderer decoded units are handed to.
    fn create_renderer(&mut self) -> Result<Box<dyn Renderer>, BridgeError>;

    /// Configure `engine` for `format`.
    ///
    /// A recoverable error ([`EngineError::is_recoverable`]) defers
    /// configuration; the worker retries on request.
    fn configure_engine(
        &mut self,
        engine: &mut dyn DecodingEngine,
        format: &FormatDescriptor,
    ) -> Result<(), EngineError> {
        engine.configure(format)
    }

    /// Release kind-specific resources. Called once during teardown.
    fn finish(&mut self) {}
}

// ============================================================================
// Audio
// ============================================================================

type SharedSink = Arc<Mutex<Box<dyn AudioSink>>>;

/// Audio specialization over a host [`AudioSink`].
pub struct AudioKind {
    sink: SharedSink,
    params: Option<AudioParams>,
    opened: bool,
}

impl AudioKind {
    pub fn new(sink: impl AudioSink + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
            params: None,
            opened: false,
        }
    }

    pub fn params(&self) -> Option<AudioParams> {
        self.params
    }
}

impl std::fmt::Debug for AudioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioKind")
            .field("params", &self.params)
            .field("opened", &self.opened)
            .finish()
    }
}

impl MediaKind for AudioKind {
    fn track_kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn init_params(&mut self, format: &FormatDescriptor) -> Result<(), String> {
        match format.track {
            TrackParams::Audio {
                sample_rate,
                channels,
                pcm_encoding,
            } if sample_rate > 0 && channels > 0 => {
                let params = AudioParams {
                    sample_rate,
                    channels,
                    encoding: pcm_encoding,
                };
                debug!(sample_rate, channels, encoding = ?pcm_encoding, "Audio parameters");
                self.params = Some(params);
                Ok(())
            }
            TrackParams::Audio { .. } => Err(format!(
                "{}: sample rate and channel count must be non-zero",
                format.mime
            )),
            _ => Err(format!("{} is not an audio track", format.mime)),
        }
    }

    fn create_renderer(&mut self) -> Result<Box<dyn Renderer>, BridgeError> {
        let params = self
            .params
            .ok_or_else(|| BridgeError::NotAvailable("audio parameters unknown".to_string()))?;
        self.sink.lock().open(&params)?;
        self.opened = true;
        Ok(Box::new(AudioRenderer {
            sink: Arc::clone(&self.sink),
        }))
    }

    fn finish(&mut self) {
        if std::mem::take(&mut self.opened) {
            self.sink.lock().close();
        }
    }
}

struct AudioRenderer {
    sink: SharedSink,
}

impl Renderer for AudioRenderer {
    fn render(&mut self, data: &[u8], info: &FrameBufferDescriptor) {
        if data.is_empty() {
            return;
        }
        if let Err(e) = self.sink.lock().write(data, info.presentation_time_us) {
            warn!(error = %e, pts = info.presentation_time_us, "Audio write failed");
        }
    }
}

// ============================================================================
// Video
// ============================================================================

type SharedSurface = Arc<Mutex<Box<dyn VideoSurface>>>;

/// Video specialization over a host [`VideoSurface`].
pub struct VideoKind {
    surface: Option<SharedSurface>,
    params: Option<VideoParams>,
    attached: bool,
}

impl VideoKind {
    pub fn new(surface: impl VideoSurface + 'static) -> Self {
        Self {
            surface: Some(Arc::new(Mutex::new(Box::new(surface)))),
            params: None,
            attached: false,
        }
    }

    /// A video kind without an output surface. Fails the pre-check.
    pub fn headless() -> Self {
        Self {
            surface: None,
            params: None,
            attached: false,
        }
    }

    pub fn params(&self) -> Option<VideoParams> {
        self.params
    }

    fn surface(&self) -> Result<&SharedSurface, BridgeError> {
        self.surface
            .as_ref()
            .ok_or_else(|| BridgeError::NotAvailable("no output surface".to_string()))
    }
}

impl std::fmt::Debug for VideoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoKind")
            .field("has_surface", &self.surface.is_some())
            .field("params", &self.params)
            .field("attached", &self.attached)
            .finish()
    }
}

impl MediaKind for VideoKind {
    fn track_kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn check(&self) -> Result<(), String> {
        match self.surface {
            Some(_) => Ok(()),
            None => Err("video decoding requires an output surface".to_string()),
        }
    }

    fn init_params(&mut self, format: &FormatDescriptor) -> Result<(), String> {
        match format.track {
            TrackParams::Video {
                width,
                height,
                rotation,
                ..
            } => {
                debug!(width, height, rotation, "Video parameters");
                self.params = Some(VideoParams {
                    width,
                    height,
                    rotation,
                });
                Ok(())
            }
            _ => Err(format!("{} is not a video track", format.mime)),
        }
    }

    fn create_renderer(&mut self) -> Result<Box<dyn Renderer>, BridgeError> {
        Ok(Box::new(VideoRenderer {
            surface: Arc::clone(self.surface()?),
        }))
    }

    fn configure_engine(
        &mut self,
        engine: &mut dyn DecodingEngine,
        format: &FormatDescriptor,
    ) -> Result<(), EngineError> {
        let params = self
            .params
            .ok_or_else(|| EngineError::Configuration("video parameters unknown".to_string()))?;
        let surface = Arc::clone(
            self.surface()
                .map_err(|e| EngineError::Configuration(e.to_string()))?,
        );

        if !self.attached {
            let mut surface = surface.lock();
            if !surface.is_ready() {
                return Err(EngineError::ConfigurationDeferred(
                    "output surface not ready".to_string(),
                ));
            }
            surface
                .attach(&params)
                .map_err(|e| EngineError::Configuration(e.to_string()))?;
            self.attached = true;
        }

        engine.configure(format)
    }

    fn finish(&mut self) {
        if !std::mem::take(&mut self.attached) {
            return;
        }
        if let Some(surface) = &self.surface {
            surface.lock().detach();
        }
    }
}

struct VideoRenderer {
    surface: SharedSurface,
}

impl Renderer for VideoRenderer {
    fn render(&mut self, data: &[u8], info: &FrameBufferDescriptor) {
        if data.is_empty() {
            return;
        }
        if let Err(e) = self.surface.lock().present(data, info.presentation_time_us) {
            warn!(error = %e, pts = info.presentation_time_us, "Frame presentation failed");
        }
    }
}
