//! Render pacing.
//!
//! Maps presentation timestamps onto wall-clock time from an anchor taken at
//! the first frame after every (re)start. The worker waits out the returned
//! delay before rendering.

use bridge_traits::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Frames due further ahead than this rebase the anchor instead of waiting.
const MAX_LEAD_US: i64 = 500_000;

#[derive(Debug, Clone, Copy)]
struct Anchor {
    wall_us: i64,
    pts_us: i64,
}

/// Holds frames until their presentation time.
pub struct RenderPacer {
    clock: Arc<dyn Clock>,
    anchor: Option<Anchor>,
}

impl RenderPacer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            anchor: None,
        }
    }

    /// How long to wait before presenting a frame at `pts_us`.
    ///
    /// `None` means render now: the first frame after a reset, late frames,
    /// and discontinuities beyond the maximum lead.
    pub fn delay_for(&mut self, pts_us: i64) -> Option<Duration> {
        let now = self.clock.unix_timestamp_micros();
        let Some(anchor) = self.anchor else {
            self.anchor = Some(Anchor {
                wall_us: now,
                pts_us,
            });
            return None;
        };

        let lead = anchor.wall_us + (pts_us - anchor.pts_us) - now;
        if lead <= 0 {
            return None;
        }
        if lead > MAX_LEAD_US {
            trace!(pts_us, lead_us = lead, "Timestamp discontinuity, rebasing");
            self.anchor = Some(Anchor {
                wall_us: now,
                pts_us,
            });
            return None;
        }
        Some(Duration::from_micros(lead as u64))
    }

    /// Forget the anchor; the next frame renders immediately.
    pub fn reset(&mut self) {
        self.anchor = None;
    }
}

impl std::fmt::Debug for RenderPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPacer")
            .field("anchor", &self.anchor)
            .finish()
    }
}
