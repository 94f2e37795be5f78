//! Trapezoidal step profile shared by the simulated and pin-driven steppers.
//!
//! [`Ramp`] integrates speed and position from millisecond timestamps.
//! Speed is limited by both `max_speed` and the braking curve
//! `v = sqrt(2 a d)`, so a move always decelerates into its target.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

/// Step profile state.
///
/// # Example
///
/// ```rust
/// use rs_ramps::motion::Ramp;
///
/// let mut ramp = Ramp::new(400.0, 800.0);
/// ramp.move_to(-100);
///
/// let mut moved = 0;
/// for t in 0..2000 {
///     moved += ramp.advance(t);
/// }
/// assert_eq!(moved, -100);
/// assert_eq!(ramp.current_position(), -100);
/// assert_eq!(ramp.speed(), 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct Ramp {
    position: i64,
    target: i64,
    speed: f32,
    max_speed: f32,
    acceleration: f32,
    fraction: f32,
    last_ms: Option<u64>,
}

impl Default for Ramp {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl Ramp {
    /// New profile at position 0.
    pub fn new(max_speed: f32, acceleration: f32) -> Self {
        Self {
            position: 0,
            target: 0,
            speed: 0.0,
            max_speed: max_speed.abs(),
            acceleration: acceleration.abs(),
            fraction: 0.0,
            last_ms: None,
        }
    }

    /// Set an absolute target.
    pub fn move_to(&mut self, target: i64) {
        self.target = target;
    }

    /// Set the speed limit in steps per second.
    pub fn set_max_speed(&mut self, steps_per_s: f32) {
        self.max_speed = steps_per_s.abs();
    }

    /// Speed limit in steps per second.
    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    /// Set acceleration. Zero means speed changes are instantaneous.
    pub fn set_acceleration(&mut self, steps_per_s2: f32) {
        self.acceleration = steps_per_s2.abs();
    }

    /// Acceleration in steps per second squared.
    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    /// Redefine the position, dropping any target and speed.
    pub fn set_current_position(&mut self, position: i64) {
        self.position = position;
        self.target = position;
        self.speed = 0.0;
        self.fraction = 0.0;
    }

    /// Position in steps.
    pub fn current_position(&self) -> i64 {
        self.position
    }

    /// Absolute target in steps.
    pub fn target_position(&self) -> i64 {
        self.target
    }

    /// Signed steps remaining.
    pub fn distance_to_go(&self) -> i64 {
        self.target.saturating_sub(self.position)
    }

    /// Signed speed in steps per second.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// True while there is distance to cover or speed to shed.
    pub fn is_running(&self) -> bool {
        self.distance_to_go() != 0 || self.speed != 0.0
    }

    /// Retarget to the nearest point the motor can brake to.
    pub fn stop(&mut self) {
        if self.speed == 0.0 {
            self.target = self.position;
            return;
        }
        let braking = if self.acceleration > 0.0 {
            (self.speed * self.speed / (2.0 * self.acceleration)).ceil() as i64
        } else {
            0
        };
        self.target = if self.speed > 0.0 {
            self.position.saturating_add(braking)
        } else {
            self.position.saturating_sub(braking)
        };
    }

    /// Halt on the spot.
    pub fn stop_now(&mut self) {
        self.speed = 0.0;
        self.fraction = 0.0;
        self.target = self.position;
    }

    /// Advance to `now_ms` and return the signed number of whole steps taken.
    ///
    /// The first call only records the time base.
    pub fn advance(&mut self, now_ms: u64) -> i64 {
        let dt = match self.last_ms {
            Some(last) => now_ms.saturating_sub(last) as f32 / 1000.0,
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        if dt <= 0.0 {
            return 0;
        }

        let distance = self.distance_to_go();
        if distance == 0 {
            self.speed = 0.0;
            self.fraction = 0.0;
            return 0;
        }

        let remaining = distance as f32;
        let braking_speed = if self.acceleration > 0.0 {
            (2.0 * self.acceleration * remaining.abs()).sqrt()
        } else {
            self.max_speed
        };
        let direction = if distance > 0 { 1.0 } else { -1.0 };
        let desired = direction * self.max_speed.min(braking_speed);

        if self.acceleration > 0.0 {
            let dv = self.acceleration * dt;
            self.speed = if self.speed < desired {
                (self.speed + dv).min(desired)
            } else {
                (self.speed - dv).max(desired)
            };
        } else {
            self.speed = desired;
        }

        self.fraction += self.speed * dt;
        let mut steps = self.fraction as i64;
        self.fraction -= steps as f32;

        // never overshoot while approaching the target
        if (distance > 0 && steps > distance) || (distance < 0 && steps < distance) {
            steps = distance;
            self.fraction = 0.0;
        }
        self.position += steps;

        if self.position == self.target {
            self.speed = 0.0;
            self.fraction = 0.0;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_until_idle(ramp: &mut Ramp, start_ms: u64, limit_ms: u64) -> u64 {
        let mut t = start_ms;
        while ramp.is_running() && t < start_ms + limit_ms {
            ramp.advance(t);
            t += 1;
        }
        t
    }

    #[test]
    fn first_advance_sets_time_base() {
        let mut ramp = Ramp::new(1000.0, 1000.0);
        ramp.move_to(100);
        assert_eq!(ramp.advance(5000), 0);
        assert_eq!(ramp.current_position(), 0);
    }

    #[test]
    fn reaches_target_and_settles() {
        let mut ramp = Ramp::new(1000.0, 500.0);
        ramp.move_to(300);
        run_until_idle(&mut ramp, 0, 10_000);
        assert_eq!(ramp.current_position(), 300);
        assert_eq!(ramp.distance_to_go(), 0);
        assert_eq!(ramp.speed(), 0.0);
    }

    #[test]
    fn speed_never_exceeds_limit() {
        let mut ramp = Ramp::new(200.0, 10_000.0);
        ramp.move_to(10_000);
        for t in 0..500 {
            ramp.advance(t);
            assert!(ramp.speed() <= 200.0 + 0.01);
        }
    }

    #[test]
    fn accelerates_gradually() {
        let mut ramp = Ramp::new(1000.0, 100.0);
        ramp.move_to(100_000);
        ramp.advance(0);
        ramp.advance(100);
        // 100 steps/s² for 0.1 s
        assert!((ramp.speed() - 10.0).abs() < 0.01);
    }

    #[test]
    fn stop_decelerates_past_current_position() {
        let mut ramp = Ramp::new(1000.0, 1000.0);
        ramp.move_to(100_000);
        for t in 0..=500 {
            ramp.advance(t);
        }
        let pos = ramp.current_position();
        ramp.stop();
        assert!(ramp.target_position() > pos);
        run_until_idle(&mut ramp, 501, 10_000);
        assert_eq!(ramp.speed(), 0.0);
        assert!(ramp.current_position() >= pos);
    }

    #[test]
    fn stop_now_halts_immediately() {
        let mut ramp = Ramp::new(1000.0, 1000.0);
        ramp.move_to(-100_000);
        for t in 0..=200 {
            ramp.advance(t);
        }
        assert!(ramp.speed() < 0.0);
        ramp.stop_now();
        assert_eq!(ramp.speed(), 0.0);
        assert_eq!(ramp.distance_to_go(), 0);
        assert!(!ramp.is_running());
    }

    #[test]
    fn zero_acceleration_jumps_to_speed() {
        let mut ramp = Ramp::new(100.0, 0.0);
        ramp.move_to(1000);
        ramp.advance(0);
        ramp.advance(100);
        assert_eq!(ramp.speed(), 100.0);
        assert!((9..=10).contains(&ramp.current_position()));
    }

    #[test]
    fn set_current_position_clears_motion() {
        let mut ramp = Ramp::new(100.0, 100.0);
        ramp.move_to(50);
        ramp.set_current_position(7);
        assert_eq!(ramp.current_position(), 7);
        assert_eq!(ramp.distance_to_go(), 0);
        assert!(!ramp.is_running());
    }
}
