//! In-memory sample sources.

use bridge_traits::{
    error::{BridgeError, Result},
    media::{FormatDescriptor, SampleSource, SourceOpener, TrackKind},
};
use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One elementary-stream sample held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySample {
    pub timestamp_us: i64,
    pub data: Bytes,
    /// Whether seeks may land on this sample.
    pub key_frame: bool,
}

/// Sample source over a fixed list of samples.
///
/// Cloning yields an independent reader over the same sample data, positioned
/// at the start.
#[derive(Debug, Clone)]
pub struct MemorySampleSource {
    format: Option<FormatDescriptor>,
    samples: Arc<Vec<MemorySample>>,
    cursor: usize,
    current_timestamp: i64,
    stopped: bool,
}

impl MemorySampleSource {
    pub fn new(format: FormatDescriptor) -> Self {
        Self {
            format: Some(format),
            samples: Arc::new(Vec::new()),
            cursor: 0,
            current_timestamp: 0,
            stopped: false,
        }
    }

    /// A source that reports no format, as a corrupt container would.
    pub fn without_format() -> Self {
        Self {
            format: None,
            ..Self::new(FormatDescriptor::new(
                "",
                bridge_traits::media::TrackParams::Unknown,
            ))
        }
    }

    /// `count` key-frame samples of `size` bytes spaced `interval_us` apart.
    ///
    /// Sample `i` is filled with the byte `i as u8`.
    pub fn uniform(format: FormatDescriptor, count: usize, interval_us: i64, size: usize) -> Self {
        let samples = (0..count)
            .map(|i| MemorySample {
                timestamp_us: i as i64 * interval_us,
                data: Bytes::from(vec![i as u8; size]),
                key_frame: true,
            })
            .collect();
        Self {
            samples: Arc::new(samples),
            ..Self::new(format)
        }
    }

    pub fn with_sample(self, timestamp_us: i64, data: impl Into<Bytes>) -> Self {
        self.push(MemorySample {
            timestamp_us,
            data: data.into(),
            key_frame: true,
        })
    }

    /// Append a sample seeks cannot land on.
    pub fn with_delta_sample(self, timestamp_us: i64, data: impl Into<Bytes>) -> Self {
        self.push(MemorySample {
            timestamp_us,
            data: data.into(),
            key_frame: false,
        })
    }

    fn push(mut self, sample: MemorySample) -> Self {
        Arc::make_mut(&mut self.samples).push(sample);
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Index of the last key frame at or before `position_us`.
    fn sync_index(&self, position_us: i64) -> usize {
        self.samples
            .iter()
            .enumerate()
            .take_while(|(_, sample)| sample.timestamp_us <= position_us)
            .filter(|(_, sample)| sample.key_frame)
            .map(|(index, _)| index)
            .last()
            .unwrap_or(0)
    }
}

impl SampleSource for MemorySampleSource {
    fn format(&self) -> Option<&FormatDescriptor> {
        self.format.as_ref()
    }

    fn read_sample(&mut self, buffer: &mut BytesMut) -> Option<usize> {
        if self.stopped {
            return None;
        }
        let sample = self.samples.get(self.cursor)?;
        buffer.clear();
        buffer.extend_from_slice(&sample.data);
        self.current_timestamp = sample.timestamp_us;
        self.cursor += 1;
        Some(sample.data.len())
    }

    fn current_timestamp(&self) -> i64 {
        self.current_timestamp
    }

    fn seek(&mut self, position_us: i64) -> i64 {
        self.cursor = self.sync_index(position_us);
        let landed = self
            .samples
            .get(self.cursor)
            .map(|sample| sample.timestamp_us)
            .unwrap_or(0);
        debug!(requested_us = position_us, landed_us = landed, "Memory source seek");
        landed
    }

    fn set_start_position(&mut self, position_us: i64) {
        self.seek(position_us);
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Opener resolving paths against a registry of in-memory media.
///
/// Each path may carry one audio and one video track.
#[derive(Debug, Default)]
pub struct MemorySourceOpener {
    media: RwLock<HashMap<String, HashMap<TrackKind, MemorySampleSource>>>,
}

impl MemorySourceOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` as the `kind` track of `path`, replacing any previous one.
    pub fn register(&self, path: impl Into<String>, kind: TrackKind, source: MemorySampleSource) {
        self.media
            .write()
            .entry(path.into())
            .or_default()
            .insert(kind, source);
    }

    pub fn unregister(&self, path: &str) -> bool {
        self.media.write().remove(path).is_some()
    }
}

impl SourceOpener for MemorySourceOpener {
    fn exists(&self, path: &str) -> bool {
        self.media.read().contains_key(path)
    }

    fn open(&self, path: &str, track: TrackKind) -> Result<Box<dyn SampleSource>> {
        let media = self.media.read();
        let tracks = media
            .get(path)
            .ok_or_else(|| BridgeError::NotFound(path.to_string()))?;
        let source = tracks
            .get(&track)
            .ok_or_else(|| BridgeError::MissingTrack(track.as_str().to_string()))?;
        debug!(path, track = track.as_str(), samples = source.len(), "Opened memory source");
        Ok(Box::new(source.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::media::TrackParams;

    fn format() -> FormatDescriptor {
        FormatDescriptor::new("video/raw", TrackParams::Unknown).with_duration_us(5_000)
    }

    #[test]
    fn test_reads_until_exhausted() {
        let mut source = MemorySampleSource::uniform(format(), 3, 1_000, 4);
        let mut buffer = BytesMut::new();

        assert_eq!(source.read_sample(&mut buffer), Some(4));
        assert_eq!(&buffer[..], &[0, 0, 0, 0]);
        assert_eq!(source.read_sample(&mut buffer), Some(4));
        assert_eq!(source.current_timestamp(), 1_000);
        assert_eq!(source.read_sample(&mut buffer), Some(4));
        assert_eq!(source.read_sample(&mut buffer), None);
        assert_eq!(source.read_sample(&mut buffer), None);
    }

    #[test]
    fn test_seek_lands_on_key_frame() {
        let mut source = MemorySampleSource::new(format())
            .with_sample(0, vec![0u8; 2])
            .with_delta_sample(1_000, vec![1u8; 2])
            .with_sample(2_000, vec![2u8; 2])
            .with_delta_sample(3_000, vec![3u8; 2]);

        assert_eq!(source.seek(1_500), 0);
        assert_eq!(source.seek(3_500), 2_000);

        let mut buffer = BytesMut::new();
        source.read_sample(&mut buffer);
        assert_eq!(source.current_timestamp(), 2_000);
    }

    #[test]
    fn test_stopped_source_is_exhausted() {
        let mut source = MemorySampleSource::uniform(format(), 3, 1_000, 4);
        source.stop();
        assert!(source.is_stopped());
        assert_eq!(source.read_sample(&mut BytesMut::new()), None);
    }

    #[test]
    fn test_opener_resolves_tracks() {
        let opener = MemorySourceOpener::new();
        opener.register(
            "clip.raw",
            TrackKind::Video,
            MemorySampleSource::uniform(format(), 2, 1_000, 4),
        );

        assert!(opener.exists("clip.raw"));
        assert!(!opener.exists("missing.raw"));
        assert!(opener.open("clip.raw", TrackKind::Video).is_ok());
        assert!(matches!(
            opener.open("clip.raw", TrackKind::Audio),
            Err(BridgeError::MissingTrack(kind)) if kind == "audio"
        ));
        assert!(matches!(
            opener.open("missing.raw", TrackKind::Video),
            Err(BridgeError::NotFound(_))
        ));

        assert!(opener.unregister("clip.raw"));
        assert!(!opener.exists("clip.raw"));
    }
}
