/// Simulation clock with a scaled timeline (gameplay) and an unscaled one (wall time).
///
/// Deadlines and cooldowns are stored as absolute `time()` values and compared
/// each tick, so a paused clock (`time_scale == 0`) freezes them while
/// `unscaled_time()` keeps advancing.
#[derive(Debug, Clone, PartialEq)]
pub struct SimClock {
    time: f64,
    unscaled_time: f64,
    time_scale: f32,
    delta_seconds: f32,
    unscaled_delta_seconds: f32,
    tick: u64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            time: 0.0,
            unscaled_time: 0.0,
            time_scale: 1.0,
            delta_seconds: 0.0,
            unscaled_delta_seconds: 0.0,
            tick: 0,
        }
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances both timelines by one step of `unscaled_dt_seconds`.
    pub fn advance(&mut self, unscaled_dt_seconds: f32) {
        let unscaled = if unscaled_dt_seconds.is_finite() {
            unscaled_dt_seconds.max(0.0)
        } else {
            0.0
        };
        let scaled = unscaled * self.time_scale;
        self.unscaled_delta_seconds = unscaled;
        self.delta_seconds = scaled;
        self.unscaled_time += unscaled as f64;
        self.time += scaled as f64;
        self.tick = self.tick.saturating_add(1);
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn unscaled_time(&self) -> f64 {
        self.unscaled_time
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta_seconds
    }

    pub fn unscaled_delta_seconds(&self) -> f32 {
        self.unscaled_delta_seconds
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = if time_scale.is_finite() {
            time_scale.max(0.0)
        } else {
            1.0
        };
    }

    pub fn is_paused(&self) -> bool {
        self.time_scale <= 0.0
    }
}
