// SPDX-License-Identifier: CEPL-1.0
use std::time::{Duration, Instant};

use tracing::debug;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Counts loop iterations and reports a frames-per-second figure once per
/// second.
#[derive(Debug)]
pub struct FrameClock {
    window_start: Instant,
    last_tick: Instant,
    frames: u32,
    last_delta: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            window_start: now,
            last_tick: now,
            frames: 0,
            last_delta: Duration::ZERO,
        }
    }

    pub fn tick(&mut self) -> Option<u32> {
        self.tick_at(Instant::now())
    }

    /// Records one frame at `now`. Returns the frame count of the window that
    /// just closed, if a full report interval has elapsed.
    pub fn tick_at(&mut self, now: Instant) -> Option<u32> {
        self.last_delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.frames = self.frames.saturating_add(1);

        if now.saturating_duration_since(self.window_start) < REPORT_INTERVAL {
            return None;
        }

        let fps = self.frames;
        debug!("fps ~ {}", fps);
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }

    /// Time between the two most recent ticks.
    pub fn last_delta(&self) -> Duration {
        self.last_delta
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
