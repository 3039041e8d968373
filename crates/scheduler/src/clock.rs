use std::time::Instant;

/// Frame clock measured in seconds. With `auto_start`, the first reading
/// starts it and returns zero.
#[derive(Debug, Clone)]
pub struct Clock {
    auto_start: bool,
    start_time: Option<Instant>,
    old_time: Option<Instant>,
    elapsed: f32,
    running: bool,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Clock {
    pub fn new(auto_start: bool) -> Self {
        Self {
            auto_start,
            start_time: None,
            old_time: None,
            elapsed: 0.0,
            running: false,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.start_time = Some(now);
        self.old_time = Some(now);
        self.elapsed = 0.0;
        self.running = true;
    }

    pub fn stop(&mut self, now: Instant) {
        self.elapsed(now);
        self.running = false;
        self.auto_start = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    pub fn delta(&mut self, now: Instant) -> f32 {
        if self.auto_start && !self.running {
            self.start(now);
            return 0.0;
        }
        if !self.running {
            return 0.0;
        }
        let previous = self.old_time.unwrap_or(now);
        let diff = now.saturating_duration_since(previous).as_secs_f32();
        self.old_time = Some(now);
        self.elapsed += diff;
        diff
    }

    pub fn elapsed(&mut self, now: Instant) -> f32 {
        self.delta(now);
        self.elapsed
    }
}
