use crate::types::{ControlMode, Cycle, TemperatureRange};

/// Dwell limits applied to the actuator. Zero disables the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DwellGuards {
    pub max_on_time_ms: u64,
    pub min_off_time_ms: u64,
}

/// Band edges and cycle names seen from the actuator's point of view.
struct Policy {
    start_demand: bool,
    end_demand: bool,
    active: Cycle,
    resting: Cycle,
}

impl Policy {
    fn for_mode(mode: ControlMode, temp: f32, range: TemperatureRange) -> Self {
        let min = range.min as f32;
        let max = range.max as f32;
        match mode {
            ControlMode::Heater => Self {
                start_demand: temp < min,
                end_demand: temp > max,
                active: Cycle::Heating,
                resting: Cycle::Cooling,
            },
            ControlMode::Cooler => Self {
                start_demand: temp > max,
                end_demand: temp < min,
                active: Cycle::Cooling,
                resting: Cycle::Heating,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HysteresisController {
    cycle: Cycle,
    last_switch_ms: Option<u64>,
}

impl Default for HysteresisController {
    fn default() -> Self {
        Self::new()
    }
}

impl HysteresisController {
    pub fn new() -> Self {
        Self {
            cycle: Cycle::Heating,
            last_switch_ms: None,
        }
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn last_switch_ms(&self) -> Option<u64> {
        self.last_switch_ms
    }

    /// Time since the last recorded switch; before any switch the clock origin counts.
    pub fn since_last_switch(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_switch_ms.unwrap_or(0))
    }

    pub fn record_switch(&mut self, now_ms: u64) {
        self.last_switch_ms = Some(now_ms);
    }

    pub fn forget_last_switch(&mut self) {
        self.last_switch_ms = None;
    }

    /// Decides the next actuator state. The first matching rule wins.
    pub fn evaluate(
        &mut self,
        temp: f32,
        mode: ControlMode,
        range: TemperatureRange,
        actuator_on: bool,
        now_ms: u64,
        guards: DwellGuards,
    ) -> bool {
        let policy = Policy::for_mode(mode, temp, range);
        let elapsed = self.since_last_switch(now_ms);
        let rested = elapsed >= guards.min_off_time_ms;
        let overrun = guards.max_on_time_ms > 0 && elapsed >= guards.max_on_time_ms;

        let next = if actuator_on && policy.end_demand {
            self.cycle = policy.resting;
            false
        } else if actuator_on && overrun {
            false
        } else if !actuator_on
            && policy.start_demand
            && (self.last_switch_ms.is_none() || rested)
        {
            self.cycle = policy.active;
            true
        } else if !actuator_on && self.cycle == policy.active && rested {
            true
        } else {
            actuator_on
        };

        if next != actuator_on {
            self.record_switch(now_ms);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: TemperatureRange = TemperatureRange { min: 18, max: 22 };
    const GUARDS: DwellGuards = DwellGuards {
        max_on_time_ms: 1_800_000,
        min_off_time_ms: 600_000,
    };

    fn switched_at(cycle: Cycle, at: u64) -> HysteresisController {
        HysteresisController {
            cycle,
            last_switch_ms: Some(at),
        }
    }

    #[test]
    fn heater_turns_off_above_max_and_starts_cooling() {
        let mut controller = switched_at(Cycle::Heating, 1_000);

        let next = controller.evaluate(22.5, ControlMode::Heater, RANGE, true, 2_000, GUARDS);

        assert!(!next);
        assert_eq!(controller.cycle(), Cycle::Cooling);
        assert_eq!(controller.last_switch_ms(), Some(2_000));
    }

    #[test]
    fn heater_first_activation_ignores_min_off() {
        let mut controller = HysteresisController::new();

        let next = controller.evaluate(15.0, ControlMode::Heater, RANGE, false, 10, GUARDS);

        assert!(next);
        assert_eq!(controller.cycle(), Cycle::Heating);
        assert_eq!(controller.last_switch_ms(), Some(10));
    }

    #[test]
    fn heater_waits_for_min_off_after_a_switch() {
        let mut controller = switched_at(Cycle::Cooling, 1_000_000);

        assert!(!controller.evaluate(15.0, ControlMode::Heater, RANGE, false, 1_599_999, GUARDS));
        assert_eq!(controller.last_switch_ms(), Some(1_000_000));

        assert!(controller.evaluate(15.0, ControlMode::Heater, RANGE, false, 1_600_000, GUARDS));
        assert_eq!(controller.cycle(), Cycle::Heating);
    }

    #[test]
    fn max_on_guard_cuts_off_without_changing_cycle() {
        let mut controller = switched_at(Cycle::Heating, 0);

        assert!(controller.evaluate(20.0, ControlMode::Heater, RANGE, true, 1_799_999, GUARDS));
        assert!(!controller.evaluate(20.0, ControlMode::Heater, RANGE, true, 1_800_000, GUARDS));
        assert_eq!(controller.cycle(), Cycle::Heating);
    }

    #[test]
    fn heating_cycle_resumes_inside_band_after_rest() {
        let mut controller = switched_at(Cycle::Heating, 5_000_000);

        assert!(!controller.evaluate(20.0, ControlMode::Heater, RANGE, false, 5_300_000, GUARDS));
        assert!(controller.evaluate(20.0, ControlMode::Heater, RANGE, false, 5_600_000, GUARDS));
        assert_eq!(controller.last_switch_ms(), Some(5_600_000));
    }

    #[test]
    fn cooling_cycle_does_not_resume_heater() {
        let mut controller = switched_at(Cycle::Cooling, 0);

        assert!(!controller.evaluate(20.0, ControlMode::Heater, RANGE, false, 9_000_000, GUARDS));
    }

    #[test]
    fn zero_max_on_disables_the_guard() {
        let guards = DwellGuards {
            max_on_time_ms: 0,
            ..GUARDS
        };
        let mut controller = switched_at(Cycle::Heating, 0);

        assert!(controller.evaluate(20.0, ControlMode::Heater, RANGE, true, u64::MAX / 2, guards));
    }

    #[test]
    fn cooler_mirrors_heater() {
        let mut controller = HysteresisController::new();
        assert!(controller.evaluate(23.0, ControlMode::Cooler, RANGE, false, 10, GUARDS));
        assert_eq!(controller.cycle(), Cycle::Cooling);

        assert!(controller.evaluate(19.0, ControlMode::Cooler, RANGE, true, 20, GUARDS));
        assert!(!controller.evaluate(17.5, ControlMode::Cooler, RANGE, true, 30, GUARDS));
        assert_eq!(controller.cycle(), Cycle::Heating);

        // Inside the band a heating cycle never restarts a cooler.
        assert!(!controller.evaluate(20.0, ControlMode::Cooler, RANGE, false, 10_000_000, GUARDS));
        assert!(controller.evaluate(22.5, ControlMode::Cooler, RANGE, false, 10_000_000, GUARDS));
    }

    #[test]
    fn temperature_at_band_edge_holds_state() {
        let mut controller = switched_at(Cycle::Cooling, 0);

        assert!(!controller.evaluate(18.0, ControlMode::Heater, RANGE, false, 700_000, GUARDS));
        assert!(controller.evaluate(22.0, ControlMode::Heater, RANGE, true, 700_000, GUARDS));
    }
}
