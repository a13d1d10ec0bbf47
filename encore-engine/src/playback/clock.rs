//! Elapsed play time accounting
//!
//! [`elapsed_seconds`] is a pure function over the clock fields; [`ClockState`]
//! is the per-session record of those fields. Used for progress reporting
//! only, never to drive transitions.

use tokio::time::{Duration, Instant};

/// Seconds of audio heard since `start`, excluding pauses
///
/// `current_pause_start` is set while paused; the pause in progress counts
/// as not playing. The result is clamped to `[0, track_duration]` when the
/// duration is known.
pub fn elapsed_seconds(
    start: Instant,
    accumulated_pause: Duration,
    current_pause_start: Option<Instant>,
    now: Instant,
    track_duration: Option<u64>,
) -> u64 {
    let frozen_at = current_pause_start.unwrap_or(now).min(now);
    let played = frozen_at
        .saturating_duration_since(start)
        .saturating_sub(accumulated_pause)
        .as_secs();

    match track_duration {
        Some(duration) => played.min(duration),
        None => played,
    }
}

/// Clock fields for the current track
#[derive(Debug, Clone, Default)]
pub struct ClockState {
    start: Option<Instant>,
    accumulated_pause: Duration,
    pause_start: Option<Instant>,
    /// Position the clock was re-based to by a seek
    offset_secs: u64,
}

impl ClockState {
    /// Reset and start counting from `now`
    pub fn start(&mut self, now: Instant) {
        *self = Self {
            start: Some(now),
            ..Self::default()
        };
    }

    /// Freeze the clock; no-op when already paused or not started
    pub fn pause(&mut self, now: Instant) {
        if self.start.is_some() && self.pause_start.is_none() {
            self.pause_start = Some(now);
        }
    }

    /// Fold the pause in progress into the accumulated pause
    pub fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.pause_start.take() {
            self.accumulated_pause += now.saturating_duration_since(paused_at);
        }
    }

    /// Re-base so that exactly `position_secs` have elapsed at `now`
    ///
    /// Pause state is preserved: a paused clock stays frozen at the new
    /// position.
    pub fn rebase(&mut self, now: Instant, position_secs: u64) {
        let paused = self.pause_start.is_some();
        *self = Self {
            start: Some(now),
            accumulated_pause: Duration::ZERO,
            pause_start: paused.then_some(now),
            offset_secs: position_secs,
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.start.is_some() && self.pause_start.is_none()
    }

    /// Elapsed seconds at `now`, 0 when not started
    pub fn elapsed(&self, now: Instant, track_duration: Option<u64>) -> u64 {
        match self.start {
            Some(start) => {
                let played = elapsed_seconds(start, self.accumulated_pause, self.pause_start, now, None);
                let position = self.offset_secs.saturating_add(played);
                match track_duration {
                    Some(duration) => position.min(duration),
                    None => position,
                }
            }
            None => 0,
        }
    }
}
