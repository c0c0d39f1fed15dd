use std::thread;
use std::time::{Duration, Instant};

/// Optional frame-rate limiter for watched runs. The simulation never
/// depends on it; `unlimited()` makes `wait` a no-op.
pub struct FramePacer {
    tick: Option<Duration>,
    last_update: Instant,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        let tick = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
        Self { tick, last_update: Instant::now() }
    }

    pub fn unlimited() -> Self {
        Self { tick: None, last_update: Instant::now() }
    }

    pub fn from_fps(fps: Option<u32>) -> Self {
        fps.map_or_else(Self::unlimited, Self::new)
    }

    /// Sleeps out whatever is left of the current tick.
    pub fn wait(&mut self) {
        if let Some(tick) = self.tick {
            let elapsed = self.last_update.elapsed();
            if elapsed < tick {
                thread::sleep(tick - elapsed);
            }
            self.last_update = Instant::now();
        }
    }
}
