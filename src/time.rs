//! Frame clock for the simulation.
//!
//! Simulation time is the running sum of (scaled, clamped) frame deltas
//! rather than wall-clock time, so pausing or a long stall never makes the
//! flow field jump.
//!
//! # Example
//!
//! ```
//! use flowtrail::time::FrameClock;
//!
//! let mut clock = FrameClock::new();
//! clock.set_fixed_delta(Some(1.0 / 60.0));
//! let tick = clock.tick();
//! assert_eq!(tick.frame, 1);
//! ```

use std::time::{Duration, Instant};

/// Largest delta fed to the simulation in one frame.
pub const MAX_DELTA: f32 = 0.1;

/// Timing of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Simulation seconds since start.
    pub time: f32,
    /// Simulation seconds since the previous tick; never negative.
    pub delta: f32,
    /// Ticks since start, counting this one.
    pub frame: u64,
}

/// Time tracking for the frame driver.
#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    elapsed_secs: f32,
    delta_secs: f32,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    fixed_delta: Option<f32>,
    time_scale: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_tick: now,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            time_scale: 1.0,
        }
    }

    /// Advance by the wall-clock time since the last tick (or the fixed delta).
    pub fn tick(&mut self) -> FrameTick {
        let now = Instant::now();
        let raw = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count + 1 - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count + 1;
            self.fps_update_time = now;
        }

        self.advance(self.fixed_delta.unwrap_or(raw))
    }

    /// Advance by an explicit raw delta, applying pause, scale and clamp.
    pub fn advance(&mut self, raw_delta: f32) -> FrameTick {
        let delta = if self.paused || !raw_delta.is_finite() {
            0.0
        } else {
            (raw_delta * self.time_scale).clamp(0.0, MAX_DELTA)
        };

        self.delta_secs = delta;
        self.elapsed_secs += delta;
        self.frame_count += 1;
        self.current()
    }

    /// Timing of the most recent tick.
    pub fn current(&self) -> FrameTick {
        FrameTick {
            time: self.elapsed_secs,
            delta: self.delta_secs,
            frame: self.frame_count,
        }
    }

    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// While paused, ticks still count frames but carry a zero delta.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Use a constant delta instead of wall-clock timing. `None` restores real timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    /// Speed multiplier; negative values clamp to zero.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.elapsed(), 0.0);
        assert!(!clock.is_paused());
    }

    #[test]
    fn test_tick_measures_wall_clock() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let tick = clock.tick();
        assert!(tick.delta > 0.0);
        assert_eq!(tick.time, tick.delta);
        assert_eq!(tick.frame, 1);
    }

    #[test]
    fn test_advance_accumulates() {
        let mut clock = FrameClock::new();
        clock.advance(0.25);
        let tick = clock.advance(0.05);
        assert!((tick.time - 0.15).abs() < 1e-6);
        assert_eq!(tick.delta, 0.05);
        assert_eq!(tick.frame, 2);
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(5.0).delta, MAX_DELTA);
        assert_eq!(clock.advance(-1.0).delta, 0.0);
        assert_eq!(clock.advance(f32::NAN).delta, 0.0);
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut clock = FrameClock::new();
        clock.advance(0.05);
        clock.set_paused(true);
        let tick = clock.advance(0.05);
        assert_eq!(tick.delta, 0.0);
        assert_eq!(tick.time, 0.05);
        assert_eq!(tick.frame, 2);
    }

    #[test]
    fn test_time_scale() {
        let mut clock = FrameClock::new();
        clock.set_time_scale(0.5);
        assert_eq!(clock.advance(0.05).delta, 0.025);
        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
    }

    #[test]
    fn test_fixed_delta() {
        let mut clock = FrameClock::new();
        clock.set_fixed_delta(Some(1.0 / 60.0));
        thread::sleep(Duration::from_millis(30));
        let tick = clock.tick();
        assert!((tick.delta - 1.0 / 60.0).abs() < 1e-6);
    }
}
