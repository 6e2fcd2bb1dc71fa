//! Media input bridge traits and format descriptions.
//!
//! A [`SampleSource`] yields one elementary-stream sample per read for a single
//! selected track. Hosts provide a [`SourceOpener`] that resolves a path and
//! selects the track matching the requested [`TrackKind`].

use crate::error::Result;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Kind of elementary stream a pipeline decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    /// MIME type prefix used by codecs of this kind (`audio/`, `video/`).
    pub fn mime_prefix(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio/",
            TrackKind::Video => "video/",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }
}

/// Track-specific parameters carried by a [`FormatDescriptor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackParams {
    Audio {
        /// Sample rate in hertz.
        sample_rate: u32,
        /// Number of interleaved channels.
        channels: u16,
        /// PCM encoding of the decoded output.
        pcm_encoding: crate::render::PcmEncoding,
    },
    Video {
        width: u32,
        height: u32,
        /// Clockwise rotation in degrees.
        rotation: u16,
        /// Nominal frame rate, when the container reports one.
        frame_rate: Option<f32>,
    },
    /// The source could not classify the track.
    Unknown,
}

/// Format description of the selected track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Codec identifier (e.g. `video/avc`, `audio/mp4a-latm`).
    pub mime: String,
    /// Track duration in microseconds, when known.
    pub duration_us: Option<i64>,
    /// Media-specific parameters.
    pub track: TrackParams,
    /// Additional key/value hints passed through to the engine.
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl FormatDescriptor {
    pub fn new(mime: impl Into<String>, track: TrackParams) -> Self {
        Self {
            mime: mime.into(),
            duration_us: None,
            track,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_duration_us(mut self, duration_us: i64) -> Self {
        self.duration_us = Some(duration_us);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Track kind inferred from the MIME prefix.
    pub fn track_kind(&self) -> Option<TrackKind> {
        if self.mime.starts_with(TrackKind::Audio.mime_prefix()) {
            Some(TrackKind::Audio)
        } else if self.mime.starts_with(TrackKind::Video.mime_prefix()) {
            Some(TrackKind::Video)
        } else {
            None
        }
    }
}

/// Demultiplexed sample supplier for one track.
///
/// Timestamps are in microseconds.
pub trait SampleSource: Send {
    /// Format description of the selected track, `None` when unavailable.
    fn format(&self) -> Option<&FormatDescriptor>;

    /// Read the next sample into `buffer`, replacing its contents.
    ///
    /// Returns the sample size, or `None` once the track is exhausted.
    fn read_sample(&mut self, buffer: &mut BytesMut) -> Option<usize>;

    /// Presentation timestamp of the sample returned by the last read.
    fn current_timestamp(&self) -> i64;

    /// Seek to the sync sample at or before `position_us`.
    ///
    /// Returns the timestamp of the sample that the next read will yield.
    fn seek(&mut self, position_us: i64) -> i64;

    /// Set the position reads start from.
    fn set_start_position(&mut self, position_us: i64);

    /// Stop reading and release underlying resources.
    fn stop(&mut self);
}

/// Resolves paths and opens [`SampleSource`]s.
pub trait SourceOpener: Send + Sync {
    /// Whether `path` refers to an existing source.
    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    /// Open `path` and select its first track of kind `track`.
    fn open(&self, path: &str, track: TrackKind) -> Result<Box<dyn SampleSource>>;
}
