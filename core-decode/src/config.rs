//! Per-pipeline configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier of a decode pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineId(pub Uuid);

impl PipelineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to decode and which window of it to present.
///
/// `duration` is filled in by the sequencer from the source format. When no
/// end position is given it defaults to the duration; if the duration is also
/// unknown the window is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub path: String,
    #[serde(default)]
    pub start_position: Duration,
    #[serde(default)]
    pub end_position: Option<Duration>,
    #[serde(default)]
    pub duration: Duration,
}

impl PipelineConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            start_position: Duration::ZERO,
            end_position: None,
            duration: Duration::ZERO,
        }
    }

    pub fn with_start_position(mut self, position: Duration) -> Self {
        self.start_position = position;
        self
    }

    pub fn with_end_position(mut self, position: Duration) -> Self {
        self.end_position = Some(position);
        self
    }

    /// Record the track duration reported by the source, in microseconds.
    ///
    /// Durations are kept at millisecond precision.
    pub(crate) fn apply_source_duration(&mut self, duration_us: Option<i64>) {
        if let Some(us) = duration_us.filter(|us| *us > 0) {
            self.duration = Duration::from_millis((us / 1000) as u64);
            if self.end_position.is_none() {
                self.end_position = Some(self.duration);
            }
        }
    }

    /// End of the presentation window in microseconds, `None` when unbounded.
    pub fn end_position_us(&self) -> Option<i64> {
        self.end_position.map(|end| end.as_micros() as i64)
    }

    pub fn start_position_us(&self) -> i64 {
        self.start_position.as_micros() as i64
    }
}
