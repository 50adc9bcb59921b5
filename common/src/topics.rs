use crate::types::RangeBound;

pub const REMOTE_SENSOR_DATA_SUFFIX: &str = "data";

pub const TOPIC_HOLD_TEMP: &str = "hold_temp";
pub const TOPIC_NOTIFY_TEMP_RANGE_MIN: &str = "notify_temp_range_min";
pub const TOPIC_NOTIFY_TEMP_RANGE_MAX: &str = "notify_temp_range_max";
pub const TOPIC_ASK_TEMP_RANGE: &str = "ask_temp_range";
pub const TOPIC_CONTROLLER_STATE: &str = "thermostat/state";
pub const TOPIC_RELAY: &str = "relay/0";
pub const TOPIC_SENSOR_STATUS: &str = "status";

/// Topic a remote sensor node publishes its JSON readings on.
pub fn remote_sensor_topic(sensor_name: &str) -> String {
    format!("{sensor_name}/{REMOTE_SENSOR_DATA_SUFFIX}")
}

pub fn rooted(root: &str, suffix: &str) -> String {
    format!("{root}/{suffix}")
}

pub fn range_notify_topic(root: &str, bound: RangeBound) -> String {
    match bound {
        RangeBound::Min => rooted(root, TOPIC_NOTIFY_TEMP_RANGE_MIN),
        RangeBound::Max => rooted(root, TOPIC_NOTIFY_TEMP_RANGE_MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_rooted() {
        assert_eq!(remote_sensor_topic("attic"), "attic/data");
        assert_eq!(rooted("boiler", TOPIC_HOLD_TEMP), "boiler/hold_temp");
        assert_eq!(
            range_notify_topic("boiler", RangeBound::Max),
            "boiler/notify_temp_range_max"
        );
    }
}
