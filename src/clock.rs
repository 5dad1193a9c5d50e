//! The virtual game clock.
//!
//! Simulated time is a pair of counters: the current day (starting at 1) and the current second
//! within that day, in `[0, day_length)`. The clock advances one second per tick. How often a tick
//! happens in real time is controlled by a [`SimulationSpeed`] multiplier and a base interval;
//! when the speed is [`SimulationSpeed::Paused`] or the explicit pause flag is set the clock is
//! halted and [`VirtualClock::advance`] leaves it untouched.
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::OutbreakError;

/// The default length of a simulated day, in simulated seconds.
pub const DEFAULT_DAY_LENGTH: u32 = 5000;

/// The speed settings offered to the player.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SimulationSpeed {
    /// Hard pause. No second advances and nothing fires.
    Paused,
    Half,
    #[default]
    Normal,
    Double,
}

impl SimulationSpeed {
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            SimulationSpeed::Paused => 0.0,
            SimulationSpeed::Half => 0.5,
            SimulationSpeed::Normal => 1.0,
            SimulationSpeed::Double => 2.0,
        }
    }
}

/// What happened during one successful [`VirtualClock::advance`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockAdvance {
    pub day: u32,
    pub second: u32,
    /// True when this advance crossed midnight and started a new day.
    pub rolled_over: bool,
}

#[derive(Clone, Debug)]
pub struct VirtualClock {
    current_day: u32,
    current_second: u32,
    day_length: u32,
    speed: SimulationSpeed,
    paused: bool,
    base_interval: Duration,
}

impl VirtualClock {
    /// Creates a clock on day 1 at midday.
    ///
    /// # Errors
    ///
    /// Returns an error if `day_length` is zero.
    pub fn new(day_length: u32) -> Result<VirtualClock, OutbreakError> {
        VirtualClock::starting_at(day_length, 1, day_length / 2)
    }

    /// Creates a clock positioned at an arbitrary instant.
    ///
    /// # Errors
    ///
    /// Returns an error if `day` is zero or `second` does not fit in a day.
    pub fn starting_at(day_length: u32, day: u32, second: u32) -> Result<VirtualClock, OutbreakError> {
        if day_length == 0 {
            return Err(OutbreakError::ConfigError(
                "day_length must be positive".to_string(),
            ));
        }
        if second >= day_length {
            return Err(OutbreakError::SecondOutOfRange { second, day_length });
        }
        if day == 0 {
            return Err(OutbreakError::ConfigError("days start at 1".to_string()));
        }
        Ok(VirtualClock {
            current_day: day,
            current_second: second,
            day_length,
            speed: SimulationSpeed::Normal,
            paused: false,
            base_interval: Duration::from_secs(1),
        })
    }

    /// Sets how long one simulated second lasts in real time at normal speed.
    #[must_use]
    pub fn with_base_interval(mut self, base_interval: Duration) -> VirtualClock {
        self.base_interval = base_interval;
        self
    }

    #[must_use]
    pub fn current_day(&self) -> u32 {
        self.current_day
    }

    #[must_use]
    pub fn current_second(&self) -> u32 {
        self.current_second
    }

    /// The current instant as `(day, second)`. Tuples compare chronologically.
    #[must_use]
    pub fn now(&self) -> (u32, u32) {
        (self.current_day, self.current_second)
    }

    #[must_use]
    pub fn day_length(&self) -> u32 {
        self.day_length
    }

    #[must_use]
    pub fn speed(&self) -> SimulationSpeed {
        self.speed
    }

    #[must_use]
    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn set_speed(&mut self, speed: SimulationSpeed) {
        self.speed = speed;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// True when either the pause flag or a zero speed keeps the clock from ticking.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.paused || self.speed.multiplier() <= 0.0
    }

    /// Real time to wait before the next tick, or `None` while halted.
    #[must_use]
    pub fn tick_interval(&self) -> Option<Duration> {
        if self.is_halted() {
            return None;
        }
        Some(self.base_interval.div_f64(self.speed.multiplier()))
    }

    /// Moves the clock forward by one simulated second.
    ///
    /// Returns `None` without touching any state while the clock is halted.
    pub fn advance(&mut self) -> Option<ClockAdvance> {
        if self.is_halted() {
            return None;
        }
        self.current_second += 1;
        let rolled_over = self.current_second >= self.day_length;
        if rolled_over {
            self.current_second = 0;
            self.current_day += 1;
        }
        Some(ClockAdvance {
            day: self.current_day,
            second: self.current_second,
            rolled_over,
        })
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        VirtualClock {
            current_day: 1,
            current_second: DEFAULT_DAY_LENGTH / 2,
            day_length: DEFAULT_DAY_LENGTH,
            speed: SimulationSpeed::Normal,
            paused: false,
            base_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_day_length_is_rejected() {
        assert!(matches!(
            VirtualClock::new(0),
            Err(OutbreakError::ConfigError(message)) if message == "day_length must be positive"
        ));
    }

    #[test]
    fn starts_at_midday_of_day_one() {
        let clock = VirtualClock::new(5000).unwrap();
        assert_eq!(clock.now(), VirtualClock::default().now());
        assert_eq!(clock.now(), (1, 2500));
        assert_eq!(clock.speed(), SimulationSpeed::Normal);
        assert!(!clock.is_halted());
    }

    #[test]
    fn advances_and_rolls_over_once_per_day() {
        let mut clock = VirtualClock::starting_at(10, 1, 8).unwrap();
        assert_eq!(
            clock.advance(),
            Some(ClockAdvance {
                day: 1,
                second: 9,
                rolled_over: false
            })
        );
        assert_eq!(
            clock.advance(),
            Some(ClockAdvance {
                day: 2,
                second: 0,
                rolled_over: true
            })
        );

        let rollovers = (0..30)
            .filter_map(|_| clock.advance())
            .filter(|advance| advance.rolled_over)
            .count();
        assert_eq!(rollovers, 3);
        assert_eq!(clock.now(), (5, 0));
    }

    #[test]
    fn zero_speed_halts_without_state_change() {
        let mut clock = VirtualClock::starting_at(10, 3, 4).unwrap();
        clock.set_speed(SimulationSpeed::Paused);
        assert!(clock.is_halted());
        assert_eq!(clock.advance(), None);
        assert_eq!(clock.tick_interval(), None);
        assert_eq!(clock.now(), (3, 4));
    }

    #[test]
    fn pause_flag_and_speed_gate_independently() {
        let mut clock = VirtualClock::new(10).unwrap();
        clock.pause();
        clock.set_speed(SimulationSpeed::Double);
        assert_eq!(clock.advance(), None);

        clock.resume();
        assert!(clock.advance().is_some());

        clock.set_speed(SimulationSpeed::Paused);
        assert!(!clock.is_paused());
        assert_eq!(clock.advance(), None);
    }

    #[test]
    fn tick_interval_scales_with_speed() {
        let mut clock = VirtualClock::new(10).unwrap().with_base_interval(Duration::from_millis(100));
        assert_eq!(clock.tick_interval(), Some(Duration::from_millis(100)));
        clock.set_speed(SimulationSpeed::Double);
        assert_eq!(clock.tick_interval(), Some(Duration::from_millis(50)));
        clock.set_speed(SimulationSpeed::Half);
        assert_eq!(clock.tick_interval(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn rejects_invalid_starting_instants() {
        assert!(matches!(
            VirtualClock::starting_at(10, 1, 10),
            Err(OutbreakError::SecondOutOfRange {
                second: 10,
                day_length: 10
            })
        ));
        assert!(VirtualClock::starting_at(10, 0, 0).is_err());
        assert!(VirtualClock::starting_at(0, 1, 0).is_err());
    }
}
