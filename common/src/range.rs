use crate::{
    config::ThermostatConfig,
    error::RangeError,
    thermostat::EngineAction,
    types::{RangeBound, TemperatureRange},
};

pub fn validate_range(
    config: &ThermostatConfig,
    min: i32,
    max: i32,
) -> Result<TemperatureRange, RangeError> {
    if !(config.range_min_min..=config.range_min_max).contains(&min) {
        return Err(RangeError::MinOutOfBounds {
            value: min,
            low: config.range_min_min,
            high: config.range_min_max,
        });
    }
    if !(config.range_max_min..=config.range_max_max).contains(&max) {
        return Err(RangeError::MaxOutOfBounds {
            value: max,
            low: config.range_max_min,
            high: config.range_max_max,
        });
    }
    if min >= max {
        return Err(RangeError::Inverted { min, max });
    }
    Ok(TemperatureRange { min, max })
}

/// One notification per bound whose value moved.
pub(crate) fn push_range_changes(
    previous: TemperatureRange,
    current: TemperatureRange,
    actions: &mut Vec<EngineAction>,
) {
    if previous.min != current.min {
        actions.push(EngineAction::RangeChanged(RangeBound::Min, current.min));
    }
    if previous.max != current.max {
        actions.push(EngineAction::RangeChanged(RangeBound::Max, current.max));
    }
}

/// Paces requests to the range authority: fast until the first band arrives, then regular.
#[derive(Debug, Clone, Default)]
pub struct RangeRequestTimer {
    last_request_ms: u64,
    received: bool,
}

impl RangeRequestTimer {
    pub fn poll(&mut self, config: &ThermostatConfig, now_ms: u64) -> bool {
        let interval = if self.received {
            config.range_request_regular_ms
        } else {
            config.range_request_initial_ms
        };

        if now_ms.saturating_sub(self.last_request_ms) > interval {
            self.last_request_ms = now_ms;
            true
        } else {
            false
        }
    }

    pub fn mark_received(&mut self, now_ms: u64) {
        self.received = true;
        self.last_request_ms = now_ms;
    }
}
