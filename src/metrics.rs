// src/metrics.rs
//! Derived driving metrics: recent max speed and 0-60 mph timing
//!
//! Both trackers are only fed samples from a current fix with reliable HDOP.
//! When a sample is skipped they keep their last values untouched.

use serde::Serialize;
use tracing::{info, warn};

/// Below this a vehicle is considered stopped; arms the max-speed reset
const STOPPED_MPH: f64 = 1.0;
/// A new max-speed window starts once the vehicle exceeds this after stopping
const MOVING_OFF_MPH: f64 = 10.0;
const TARGET_MPH: f64 = 60.0;

/// Zero out GPS jitter while stationary
pub fn clamp_speed(raw_mph: f64, noise_floor_mph: f64) -> f64 {
    if raw_mph < noise_floor_mph {
        0.0
    } else {
        raw_mph
    }
}

/// "Best speed since the last stop"
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaxSpeedTracker {
    pub speed_max: f64,
    pub reset_armed: bool,
    #[serde(skip)]
    ceiling: f64,
}

impl MaxSpeedTracker {
    /// `ceiling` rejects decoder glitches; speeds at or above it never become the max
    pub fn new(ceiling: f64) -> Self {
        Self {
            speed_max: 0.0,
            reset_armed: false,
            ceiling,
        }
    }

    pub fn update(&mut self, speed: f64, reliable: bool) {
        if !reliable {
            return;
        }

        if speed > self.speed_max && speed < self.ceiling {
            self.speed_max = speed;
        }
        if speed < STOPPED_MPH {
            self.reset_armed = true;
        }
        if speed > MOVING_OFF_MPH && self.reset_armed {
            // Forget the previous drive
            self.reset_armed = false;
            self.speed_max = speed;
        }
    }
}

impl Default for MaxSpeedTracker {
    fn default() -> Self {
        Self::new(200.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AccelState {
    #[default]
    Idle,
    Armed,
    Timing,
    Completed,
}

/// 0-60 mph timer.
///
/// Arms when the vehicle pulls away from a stop, completes at 60 mph, and only
/// re-arms after the vehicle has been near-stationary again. A run that takes
/// longer than the timeout is discarded and the previous result is shown.
/// Stopping before 60 leaves the partial time on display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccelTimer {
    state: AccelState,
    start_ms: u64,
    elapsed_ms: u64,
    last_completed_ms: Option<u64>,
    timeout_ms: u64,
}

impl AccelTimer {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            state: AccelState::Idle,
            start_ms: 0,
            elapsed_ms: 0,
            last_completed_ms: None,
            timeout_ms,
        }
    }

    pub fn update(&mut self, speed: f64, reliable: bool, now: u64) {
        if !reliable {
            return;
        }

        if speed <= STOPPED_MPH {
            // Disarm only; a partial run keeps showing how far it got
            self.state = AccelState::Idle;
            return;
        }

        match self.state {
            AccelState::Idle => {
                if speed < TARGET_MPH {
                    self.state = AccelState::Armed;
                    self.start_ms = now;
                    self.elapsed_ms = 0;
                }
            }
            AccelState::Armed | AccelState::Timing => {
                let elapsed = now.saturating_sub(self.start_ms);
                if elapsed > self.timeout_ms {
                    warn!("0-60 run abandoned after {:.2}s", elapsed as f64 / 1000.0);
                    self.elapsed_ms = self.last_completed_ms.unwrap_or(0);
                    self.state = AccelState::Completed;
                } else if speed >= TARGET_MPH {
                    info!("0-60: {:.2}s", elapsed as f64 / 1000.0);
                    self.elapsed_ms = elapsed;
                    self.last_completed_ms = Some(elapsed);
                    self.state = AccelState::Completed;
                } else {
                    self.elapsed_ms = elapsed;
                    self.state = AccelState::Timing;
                }
            }
            // Disarmed until the vehicle stops again
            AccelState::Completed => {}
        }
    }

    pub fn state(&self) -> AccelState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, AccelState::Armed | AccelState::Timing)
    }

    /// Running time while timing, otherwise the value left by the last run
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn last_completed_ms(&self) -> Option<u64> {
        self.last_completed_ms
    }
}

impl Default for AccelTimer {
    fn default() -> Self {
        Self::new(60_000)
    }
}
