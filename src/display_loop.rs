//! Frame loop that drives the controller. The controller only needs the frame times and
//! a way to say that the displayed geometry changed, so the loop here is headless: it
//! produces frames at the fixed rate, optionally paced by the wall clock.

use std::time::{Duration, Instant};
use tracing::{debug, error};
use crate::kinematics_error::KinematicsError;

/// Times of the frame. All are measured from the same (arbitrary) epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Time of this frame
    pub now: Duration,
    /// Time of the first frame
    pub first: Duration,
    /// Time of the previous frame (equals `now` on the first frame)
    pub last: Duration,
}

impl FrameTick {
    /// The very first frame at the given time.
    pub fn first(now: Duration) -> Self {
        FrameTick { now, first: now, last: now }
    }

    /// The frame following this one.
    pub fn next(&self, now: Duration) -> Self {
        FrameTick { now, first: self.first, last: self.now }
    }

    /// Seconds since the first frame
    pub fn elapsed(&self) -> f64 {
        self.now.saturating_sub(self.first).as_secs_f64()
    }

    /// Seconds since the previous frame, zero if the clock went backwards.
    pub fn delta(&self) -> f64 {
        self.now.saturating_sub(self.last).as_secs_f64()
    }
}

/// Parameters passed to the display callback once per frame.
#[derive(Debug, Clone)]
pub struct DisplayParams {
    tick: FrameTick,
    update: bool,
}

impl DisplayParams {
    pub fn new(tick: FrameTick) -> Self {
        DisplayParams { tick, update: false }
    }

    pub fn tick(&self) -> &FrameTick {
        &self.tick
    }

    /// Tell the loop the geometry changed and must be redrawn.
    pub fn set_update(&mut self) {
        self.update = true;
    }

    pub fn needs_update(&self) -> bool {
        self.update
    }
}

/// Called once per frame. An error stops the loop, the frame is not retried.
pub trait DisplayCallback {
    fn display(&mut self, params: &mut DisplayParams) -> Result<(), KinematicsError>;
}

/// What happened while the loop was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopSummary {
    pub frames: usize,
    /// Frames after which the callback requested redraw
    pub updates: usize,
}

/// Fixed rate loop without the window.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessLoop {
    /// Frames per second
    pub rate_hz: f64,

    /// How long to run. Frames are produced at 0, 1/rate, 2/rate, ... up to and including
    /// this time.
    pub duration: Duration,

    /// Sleep between frames to follow the wall clock.
    pub realtime: bool,
}

impl HeadlessLoop {
    pub fn new(rate_hz: f64, duration: Duration) -> Self {
        HeadlessLoop { rate_hz, duration, realtime: false }
    }

    /// Time between frames. Fails if the rate is not a positive number or the period does
    /// not fit into [Duration].
    pub fn period(&self) -> Result<Duration, KinematicsError> {
        if !(self.rate_hz.is_finite() && self.rate_hz > 0.0) {
            return Err(KinematicsError::ParseError(format!("Frame rate must be positive, got {}", self.rate_hz)));
        }
        Duration::try_from_secs_f64(1.0 / self.rate_hz)
            .map_err(|e| KinematicsError::ParseError(format!("Frame rate {} is too low: {}", self.rate_hz, e)))
    }

    /// Time of the frame with the given number, computed directly from the rate so that
    /// rounding does not accumulate. `None` if it does not fit into [Duration].
    fn frame_time(&self, frame: usize) -> Option<Duration> {
        Duration::try_from_secs_f64(frame as f64 / self.rate_hz).ok()
    }

    /// Run frames until the duration is over, or until the callback fails.
    pub fn run<C: DisplayCallback + ?Sized>(&self, callback: &mut C) -> Result<LoopSummary, KinematicsError> {
        let period = self.period()?;
        debug!("Frame loop at {} Hz (period {:?}) for {:?}", self.rate_hz, period, self.duration);
        let started = Instant::now();
        let mut summary = LoopSummary::default();
        let mut tick = FrameTick::first(Duration::ZERO);

        loop {
            if self.realtime {
                let elapsed = started.elapsed();
                if tick.now > elapsed {
                    std::thread::sleep(tick.now - elapsed);
                }
            }

            let mut params = DisplayParams::new(tick);
            if let Err(e) = callback.display(&mut params) {
                error!("Frame {} at {:.3} s failed: {}", summary.frames, tick.elapsed(), e);
                return Err(e);
            }
            summary.frames += 1;
            if params.needs_update() {
                summary.updates += 1;
            }

            match self.frame_time(summary.frames) {
                Some(next) if next <= self.duration => tick = tick.next(next),
                _ => break,
            }
        }
        debug!("Frame loop finished after {} frames", summary.frames);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records all ticks it sees, requests redraw on every second frame.
    struct Recorder {
        ticks: Vec<FrameTick>,
        fail_at: Option<usize>,
    }

    impl DisplayCallback for Recorder {
        fn display(&mut self, params: &mut DisplayParams) -> Result<(), KinematicsError> {
            if Some(self.ticks.len()) == self.fail_at {
                return Err(KinematicsError::Numerical("test".to_string()));
            }
            if self.ticks.len() % 2 == 0 {
                params.set_update();
            }
            self.ticks.push(*params.tick());
            Ok(())
        }
    }

    #[test]
    fn test_ticks() {
        let mut recorder = Recorder { ticks: Vec::new(), fail_at: None };
        let summary = HeadlessLoop::new(100.0, Duration::from_millis(50)).run(&mut recorder).unwrap();
        assert_eq!(summary.frames, 6); // 0, 10, 20, 30, 40, 50 ms
        assert_eq!(summary.updates, 3);

        let first = recorder.ticks[0];
        assert_eq!(first.now, first.first);
        assert_eq!(first.now, first.last);
        assert_eq!(first.delta(), 0.0);

        for pair in recorder.ticks.windows(2) {
            assert_eq!(pair[1].last, pair[0].now);
            assert!((pair[1].delta() - 0.01).abs() < 1e-9);
        }
        assert!((recorder.ticks[5].elapsed() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_stops_on_error() {
        let mut recorder = Recorder { ticks: Vec::new(), fail_at: Some(3) };
        let result = HeadlessLoop::new(100.0, Duration::from_secs(1)).run(&mut recorder);
        assert!(matches!(result, Err(KinematicsError::Numerical(_))));
        assert_eq!(recorder.ticks.len(), 3);
    }

    #[test]
    fn test_rejects_bad_rate() {
        let mut recorder = Recorder { ticks: Vec::new(), fail_at: None };
        for rate in [0.0, -5.0, f64::NAN, 1e-30] {
            let result = HeadlessLoop::new(rate, Duration::from_secs(1)).run(&mut recorder);
            assert!(matches!(result, Err(KinematicsError::ParseError(_))), "rate {}", rate);
        }
        assert!(recorder.ticks.is_empty());
    }

    #[test]
    fn test_includes_last_frame() {
        // 1/60 s is not exact in nanoseconds, the frame at 1 s must still be produced
        let mut recorder = Recorder { ticks: Vec::new(), fail_at: None };
        let summary = HeadlessLoop::new(60.0, Duration::from_secs(1)).run(&mut recorder).unwrap();
        assert_eq!(summary.frames, 61);
        assert_eq!(recorder.ticks[60].now, Duration::from_secs(1));
        for pair in recorder.ticks.windows(2) {
            assert!((pair[1].delta() - 1.0 / 60.0).abs() < 1e-8);
        }
    }

    #[test]
    fn test_delta_clamped() {
        let tick = FrameTick::first(Duration::from_millis(30)).next(Duration::from_millis(20));
        assert_eq!(tick.delta(), 0.0);
        assert!((tick.elapsed() - 0.0).abs() < 1e-15);
    }
}
