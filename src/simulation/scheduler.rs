//! Frame Scheduler and resize debouncing.
//!
//! Both are driven by explicit millisecond timestamps so they can be stepped
//! deterministically; the Bevy systems feed them `Time<Real>`.

use bevy::prelude::Resource;

use super::pipeline::MAX_DT;
use super::store::Viewport;
use crate::quality::QualityTier;

/// Quiet period before a burst of resize events turns into one reallocation.
pub const RESIZE_QUIET_MS: f64 = 120.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickDecision {
    /// Not visible: no work at all
    Paused,
    /// Too soon after the previous step
    Skip,
    /// Run one solver step with this `dt` in seconds
    Step { dt: f32 },
}

/// How early a callback may arrive and still count as on time.
pub const STEP_SLACK_MS: f64 = 2.0;

/// Frame-rate cap over display callbacks.
///
/// Steps are paced against an ideal cadence (`anchor`, advanced by one
/// interval per step), not against the callback that ran the last step.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct FrameScheduler {
    interval_ms: f64,
    slack_ms: f64,
    anchor_ms: Option<f64>,
    last_step_ms: Option<f64>,
}

impl FrameScheduler {
    pub fn new(frame_rate_cap: f32) -> Self {
        Self::with_interval(1000.0 / frame_rate_cap.max(1.0) as f64)
    }

    pub fn for_tier(tier: &QualityTier) -> Self {
        Self::with_interval(tier.frame_interval_ms())
    }

    fn with_interval(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            slack_ms: STEP_SLACK_MS.min(interval_ms * 0.25),
            anchor_ms: None,
            last_step_ms: None,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    /// Decide what the callback at `now_ms` does.
    pub fn tick(&mut self, now_ms: f64, visible: bool) -> TickDecision {
        if !visible {
            return TickDecision::Paused;
        }
        let (Some(anchor), Some(last)) = (self.anchor_ms, self.last_step_ms) else {
            self.anchor_ms = Some(now_ms);
            self.last_step_ms = Some(now_ms);
            return TickDecision::Step {
                dt: ((self.interval_ms / 1000.0) as f32).min(MAX_DT),
            };
        };
        if now_ms - anchor < self.interval_ms - self.slack_ms {
            return TickDecision::Skip;
        }

        let mut next_anchor = anchor + self.interval_ms;
        // more than one interval behind (slow host, long pause): re-anchor
        if now_ms - next_anchor > self.interval_ms {
            next_anchor = now_ms;
        }
        self.anchor_ms = Some(next_anchor);
        self.last_step_ms = Some(now_ms);
        TickDecision::Step {
            dt: (((now_ms - last) / 1000.0) as f32).min(MAX_DT),
        }
    }
}

/// Coalesces resize notifications into the last one once things go quiet.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct ResizeDebouncer {
    pending: Option<(f64, Viewport)>,
}

impl ResizeDebouncer {
    pub fn notify(&mut self, now_ms: f64, viewport: Viewport) {
        self.pending = Some((now_ms, viewport));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The settled viewport, once [`RESIZE_QUIET_MS`] have passed since the last notification.
    pub fn poll(&mut self, now_ms: f64) -> Option<Viewport> {
        match self.pending {
            Some((at, viewport)) if now_ms - at >= RESIZE_QUIET_MS => {
                self.pending = None;
                Some(viewport)
            }
            _ => None,
        }
    }
}
