//! Playback timer for the active exercise.
//!
//! [`PlaybackTimer`] is the pure countdown state machine; it only moves when
//! `tick()` is called. [`TickSchedule`] is the cooperative one-second task that
//! tells the run loop when to call it. The schedule is armed only while the
//! timer is running, and dropping it releases any pending tick.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Observable state of the playback timer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    /// Paused with time left
    Idle,
    /// Counting down
    Running,
    /// No time left for the current exercise
    Exhausted,
}

/// Countdown over one exercise's duration
#[derive(Clone, Debug)]
pub struct PlaybackTimer {
    duration_seconds: u32,
    remaining_seconds: u32,
    playing: bool,
}

impl PlaybackTimer {
    /// A paused timer with the full duration remaining
    pub fn new(duration_seconds: u32) -> Self {
        // Catalog validation rejects zero durations; clamp so progress math
        // never divides by zero.
        let duration_seconds = duration_seconds.max(1);
        Self {
            duration_seconds,
            remaining_seconds: duration_seconds,
            playing: false,
        }
    }

    pub fn state(&self) -> TimerState {
        if self.remaining_seconds == 0 {
            TimerState::Exhausted
        } else if self.playing {
            TimerState::Running
        } else {
            TimerState::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// Elapsed share of the duration, in `[0, 100]`.
    ///
    /// Derived from the remaining count so it is exactly 100 at zero.
    pub fn progress_percent(&self) -> f64 {
        let elapsed = self.duration_seconds - self.remaining_seconds;
        100.0 * f64::from(elapsed) / f64::from(self.duration_seconds)
    }

    /// Flip play/pause. An exhausted timer keeps its flag flipped but never ticks.
    pub fn toggle(&mut self) -> TimerState {
        self.playing = !self.playing;
        tracing::debug!(playing = self.playing, "Playback toggled");
        self.state()
    }

    /// Count one elapsed second. Returns false when nothing was counted.
    pub fn tick(&mut self) -> bool {
        if self.state() != TimerState::Running {
            return false;
        }
        self.remaining_seconds -= 1;
        if self.remaining_seconds == 0 {
            tracing::info!("Exercise timer finished");
        }
        true
    }

    /// Restart the countdown for a new duration, keeping the play flag
    pub fn reset(&mut self, duration_seconds: u32) {
        let playing = self.playing;
        *self = Self::new(duration_seconds);
        self.playing = playing;
    }
}

/// Format seconds as `m:ss` (e.g. 600 → "10:00", 65 → "1:05")
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Cancellable recurring tick that drives a [`PlaybackTimer`]
#[derive(Debug)]
pub struct TickSchedule {
    period: Duration,
    interval: Option<Interval>,
}

impl TickSchedule {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// True while a tick is pending
    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Arm when the timer is running, cancel otherwise.
    ///
    /// An already armed schedule keeps its phase, so toggling twice inside one
    /// period does not shift the next tick.
    pub fn sync(&mut self, timer: &PlaybackTimer) {
        if timer.state() == TimerState::Running {
            if self.interval.is_none() {
                self.arm();
            }
        } else {
            self.cancel();
        }
    }

    /// Drop any pending tick, then re-arm from now if the timer is running
    pub fn restart(&mut self, timer: &PlaybackTimer) {
        self.cancel();
        self.sync(timer);
    }

    pub fn cancel(&mut self) {
        if self.interval.take().is_some() {
            tracing::debug!("Cancelled pending tick");
        }
    }

    /// Wait for the next tick. Never completes while disarmed.
    ///
    /// Cancel safe: dropping the future does not lose a tick.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn arm(&mut self) {
        // First tick one full period after arming; a resumed timer never
        // counts a partial second.
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        tracing::debug!(period_ms = self.period.as_millis() as u64, "Armed tick schedule");
    }
}
