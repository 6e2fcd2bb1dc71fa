//! Output bridge traits.
//!
//! The decode core hands every decoded unit to a [`Renderer`]. Media-kind
//! implementations build renderers on top of the host outputs defined here:
//! an [`AudioSink`] for PCM and a [`VideoSurface`] for pictures.

use crate::engine::FrameBufferDescriptor;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// PCM sample encoding of decoded audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcmEncoding {
    U8,
    #[default]
    S16Le,
    S24Le,
    S32Le,
    F32Le,
}

impl PcmEncoding {
    /// Size of one sample of one channel in bytes.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PcmEncoding::U8 => 1,
            PcmEncoding::S16Le => 2,
            PcmEncoding::S24Le => 3,
            PcmEncoding::S32Le | PcmEncoding::F32Le => 4,
        }
    }
}

/// Parameters an [`AudioSink`] is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: PcmEncoding,
}

impl AudioParams {
    /// Bytes per interleaved frame (all channels).
    pub fn frame_size(&self) -> usize {
        self.encoding.bytes_per_sample() * usize::from(self.channels)
    }
}

/// Parameters a [`VideoSurface`] is attached with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation in degrees.
    pub rotation: u16,
}

/// Consumes decoded units.
///
/// Called only from the pipeline worker. `data` is the valid byte range of the
/// output slot; it is empty for the end-of-stream marker.
pub trait Renderer: Send {
    fn render(&mut self, data: &[u8], info: &FrameBufferDescriptor);

    /// Release host resources. Called once during pipeline teardown.
    fn release(&mut self) {}
}

/// Host audio output.
pub trait AudioSink: Send {
    fn open(&mut self, params: &AudioParams) -> Result<()>;

    /// Write interleaved PCM for presentation at `presentation_time_us`.
    fn write(&mut self, pcm: &[u8], presentation_time_us: i64) -> Result<()>;

    fn close(&mut self);
}

/// Host picture output.
pub trait VideoSurface: Send {
    /// Whether the surface can accept frames. Configuration waits for this.
    fn is_ready(&self) -> bool;

    fn attach(&mut self, params: &VideoParams) -> Result<()>;

    fn present(&mut self, frame: &[u8], presentation_time_us: i64) -> Result<()>;

    fn detach(&mut self);
}
