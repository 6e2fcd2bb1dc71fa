//! Recording output sinks.
//!
//! Both sinks are cheap handles over shared state: keep a clone to inspect what
//! a pipeline presented after handing the other clone to it.

use bridge_traits::{
    error::{BridgeError, Result},
    render::{AudioParams, AudioSink, VideoParams, VideoSurface},
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// One unit written to a recording sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedFrame {
    pub presentation_time_us: i64,
    pub size: usize,
}

#[derive(Debug, Default)]
struct AudioState {
    params: Option<AudioParams>,
    written: Vec<PresentedFrame>,
    closed: bool,
}

/// Audio sink that records PCM writes instead of playing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudioSink {
    state: Arc<Mutex<AudioState>>,
}

impl RecordingAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> Option<AudioParams> {
        self.state.lock().params
    }

    pub fn written(&self) -> Vec<PresentedFrame> {
        self.state.lock().written.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl AudioSink for RecordingAudioSink {
    fn open(&mut self, params: &AudioParams) -> Result<()> {
        if params.sample_rate == 0 || params.channels == 0 {
            return Err(BridgeError::OperationFailed(format!(
                "invalid audio parameters: {params:?}"
            )));
        }
        let mut state = self.state.lock();
        state.params = Some(*params);
        state.closed = false;
        Ok(())
    }

    fn write(&mut self, pcm: &[u8], presentation_time_us: i64) -> Result<()> {
        let mut state = self.state.lock();
        if state.params.is_none() || state.closed {
            return Err(BridgeError::NotAvailable("audio sink not open".to_string()));
        }
        trace!(presentation_time_us, bytes = pcm.len(), "PCM written");
        state.written.push(PresentedFrame {
            presentation_time_us,
            size: pcm.len(),
        });
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }
}

#[derive(Debug, Default)]
struct VideoState {
    params: Option<VideoParams>,
    presented: Vec<PresentedFrame>,
    detached: bool,
}

/// Video surface that records presented frames.
///
/// Starts not ready; call [`set_ready`](Self::set_ready) to simulate the host
/// creating the surface.
#[derive(Debug, Clone, Default)]
pub struct RecordingVideoSurface {
    ready: Arc<AtomicBool>,
    state: Arc<Mutex<VideoState>>,
}

impl RecordingVideoSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface that is ready immediately.
    pub fn ready() -> Self {
        let surface = Self::default();
        surface.set_ready(true);
        surface
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn params(&self) -> Option<VideoParams> {
        self.state.lock().params
    }

    pub fn presented(&self) -> Vec<PresentedFrame> {
        self.state.lock().presented.clone()
    }

    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }
}

impl VideoSurface for RecordingVideoSurface {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn attach(&mut self, params: &VideoParams) -> Result<()> {
        if !self.is_ready() {
            return Err(BridgeError::NotAvailable("surface not ready".to_string()));
        }
        let mut state = self.state.lock();
        state.params = Some(*params);
        state.detached = false;
        Ok(())
    }

    fn present(&mut self, frame: &[u8], presentation_time_us: i64) -> Result<()> {
        let mut state = self.state.lock();
        if state.params.is_none() {
            return Err(BridgeError::NotAvailable("surface not attached".to_string()));
        }
        trace!(presentation_time_us, bytes = frame.len(), "Frame presented");
        state.presented.push(PresentedFrame {
            presentation_time_us,
            size: frame.len(),
        });
        Ok(())
    }

    fn detach(&mut self) {
        self.state.lock().detached = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::render::PcmEncoding;

    #[test]
    fn test_audio_sink_records_writes() {
        let inspector = RecordingAudioSink::new();
        let mut sink = inspector.clone();

        assert!(sink.write(&[0; 4], 0).is_err());

        sink.open(&AudioParams {
            sample_rate: 44_100,
            channels: 2,
            encoding: PcmEncoding::S16Le,
        })
        .unwrap();
        sink.write(&[0; 4], 10).unwrap();
        sink.close();

        assert_eq!(
            inspector.written(),
            vec![PresentedFrame {
                presentation_time_us: 10,
                size: 4
            }]
        );
        assert!(inspector.is_closed());
    }

    #[test]
    fn test_surface_requires_ready() {
        let inspector = RecordingVideoSurface::new();
        let mut surface = inspector.clone();
        let params = VideoParams {
            width: 640,
            height: 480,
            rotation: 0,
        };

        assert!(!surface.is_ready());
        assert!(surface.attach(&params).is_err());

        inspector.set_ready(true);
        surface.attach(&params).unwrap();
        surface.present(&[1, 2, 3], 33_000).unwrap();
        surface.detach();

        assert_eq!(inspector.params(), Some(params));
        assert_eq!(inspector.presented().len(), 1);
        assert!(inspector.is_detached());
    }
}
