//! Simulated-time stopwatches and frame-rate smoothing.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Stopwatch over simulated time.
///
/// The timer never reads the wall clock: the tick loop feeds it the simulated
/// duration of every frame, so pausing or scaling the simulation is reflected
/// exactly. `ratio` is the simulated-to-real time ratio the tick applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timer {
    pub t: f64,
    pub running: bool,
    pub ratio: f64,
}

impl Default for Timer {
    fn default() -> Self {
        Timer {
            t: 0.0,
            running: false,
            ratio: 1.0,
        }
    }
}

impl Timer {
    pub fn running() -> Self {
        Timer {
            running: true,
            ..Timer::default()
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Zeroes and stops the timer, keeping its ratio.
    pub fn reset(&mut self) {
        self.t = 0.0;
        self.running = false;
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio;
    }

    /// Adds `sim_dt` seconds if running.
    pub fn advance(&mut self, sim_dt: f64) {
        if self.running {
            self.t += sim_dt;
        }
    }

    pub fn result(&self) -> f64 {
        self.t
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_duration(self.t))
    }
}

/// Formats seconds as `H:MM:SS`, with a six digit fraction when the time rounded to
/// hundredths is not whole.
pub fn format_duration(seconds: f64) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    let whole = centis / 100;
    let fraction = centis % 100;
    let (hours, minutes, secs) = (whole / 3600, (whole / 60) % 60, whole % 60);
    if fraction == 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!(
            "{}:{:02}:{:02}.{:06}",
            hours,
            minutes,
            secs,
            fraction * 10_000
        )
    }
}

/// Running mean frame rate over the most recent frames.
#[derive(Debug, Clone)]
pub struct FpsSmoother {
    frames: VecDeque<f64>,
    capacity: usize,
}

impl FpsSmoother {
    pub const DEFAULT_FRAMES: usize = 20;

    pub fn new(capacity: usize) -> Self {
        FpsSmoother {
            frames: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Records one frame duration in seconds.
    pub fn record(&mut self, frame_dt: f64) {
        self.frames.push_back(frame_dt);
        if self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }

    pub fn fps(&self) -> f64 {
        let total: f64 = self.frames.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.frames.len() as f64 / total
    }
}

impl Default for FpsSmoother {
    fn default() -> Self {
        FpsSmoother::new(Self::DEFAULT_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_timer_only_counts_while_running() {
        let mut timer = Timer::default();
        timer.advance(1.0);
        assert_eq!(timer.result(), 0.0);
        timer.start();
        timer.advance(1.5);
        timer.stop();
        timer.advance(3.0);
        assert_eq!(timer.result(), 1.5);
    }

    #[test]
    fn test_reset_keeps_ratio() {
        let mut timer = Timer::running();
        timer.set_ratio(2.0);
        timer.advance(4.0);
        timer.reset();
        assert_eq!(timer.result(), 0.0);
        assert!(!timer.running);
        assert_eq!(timer.ratio, 2.0);
    }

    #[test]
    fn test_timer_file_form() {
        let timer: Timer = serde_json::from_str(r#"{"running": true}"#).unwrap();
        assert_eq!(timer, Timer::running());
        let json = serde_json::to_value(Timer::default()).unwrap();
        assert_eq!(json, serde_json::json!({"t": 0.0, "running": false, "ratio": 1.0}));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00");
        assert_eq!(format_duration(65.5), "0:01:05.500000");
        assert_eq!(format_duration(3725.0), "1:02:05");
        assert_eq!(format_duration(12.344), "0:00:12.340000");
        assert_eq!(format_duration(59.999), "0:01:00");
    }

    #[test]
    fn test_fps_smoother_window() {
        let mut fps = FpsSmoother::new(2);
        assert_eq!(fps.fps(), 0.0);
        fps.record(0.5);
        fps.record(0.1);
        fps.record(0.1);
        assert_approx_eq!(fps.fps(), 10.0, 1e-9);
    }
}
