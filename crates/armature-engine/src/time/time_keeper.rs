use std::time::Instant;

/// Frame timing for one loop.
///
/// `delta` is clamped to `max_delta` so a stall (debugger, minimized window)
/// does not produce a huge simulation step. Total time and the FPS counter use
/// the unclamped delta.
#[derive(Debug, Clone)]
pub struct TimeKeeper {
    /// Upper bound for [`delta`](Self::delta), in seconds.
    pub max_delta: f32,

    last: Instant,
    delta: f32,
    total_time: f32,
    frames_per_second: f32,
    frame_count: u32,
    frame_time: f32,
}

impl TimeKeeper {
    pub const DEFAULT_MAX_DELTA: f32 = 0.064;

    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a keeper whose first delta is measured from `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            max_delta: Self::DEFAULT_MAX_DELTA,
            last: start,
            delta: 0.0,
            total_time: 0.0,
            frames_per_second: 0.0,
            frame_count: 0,
            frame_time: 0.0,
        }
    }

    /// Resets the baseline without touching the counters.
    ///
    /// Useful when resuming from suspension.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Advances to the current instant and returns the clamped delta.
    pub fn update(&mut self) -> f32 {
        self.update_at(Instant::now())
    }

    /// Advances to `now` and returns the clamped delta.
    pub fn update_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;

        self.frame_time += delta;
        self.total_time += delta;
        self.delta = delta.min(self.max_delta);

        self.frame_count += 1;
        if self.frame_time > 1.0 {
            self.frames_per_second = self.frame_count as f32 / self.frame_time;
            self.frame_time = 0.0;
            self.frame_count = 0;
        }
        self.delta
    }

    /// Clamped time since the previous update, in seconds.
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Unclamped time accumulated over all updates, in seconds.
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Frames per second over the last full second; `0` until one has elapsed.
    pub fn frames_per_second(&self) -> f32 {
        self.frames_per_second
    }
}

impl Default for TimeKeeper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn delta_is_clamped_but_total_is_not() {
        let start = Instant::now();
        let mut time = TimeKeeper::starting_at(start);

        let d = time.update_at(start + ms(16));
        assert!((d - 0.016).abs() < 1e-4);

        let d = time.update_at(start + ms(16) + ms(500));
        assert_eq!(d, TimeKeeper::DEFAULT_MAX_DELTA);
        assert_eq!(time.delta(), TimeKeeper::DEFAULT_MAX_DELTA);
        assert!((time.total_time() - 0.516).abs() < 1e-4);
    }

    #[test]
    fn custom_max_delta() {
        let start = Instant::now();
        let mut time = TimeKeeper::starting_at(start);
        time.max_delta = 0.01;
        assert_eq!(time.update_at(start + ms(20)), 0.01);
    }

    #[test]
    fn fps_updates_once_per_second() {
        let start = Instant::now();
        let mut time = TimeKeeper::starting_at(start);
        let mut now = start;

        // 1/16 s steps accumulate exactly.
        let step = Duration::from_micros(62_500);
        for _ in 0..16 {
            now += step;
            time.update_at(now);
        }
        // Exactly 1.0 s elapsed: not yet past the threshold.
        assert_eq!(time.frames_per_second(), 0.0);

        now += step;
        time.update_at(now);
        assert_eq!(time.frames_per_second(), 17.0 / 1.0625);
    }

    #[test]
    fn instant_before_baseline_yields_zero() {
        let start = Instant::now() + ms(100);
        let mut time = TimeKeeper::starting_at(start);
        assert_eq!(time.update_at(start - ms(50)), 0.0);
    }
}
