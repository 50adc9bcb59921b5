use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{BurnCounters, ControlMode, TemperatureRange};

const MILLIS_IN_SEC: u64 = 1_000;
const MILLIS_IN_MIN: u64 = 60_000;

pub const NAME_THERMOSTAT_ENABLED: &str = "thermostatEnabled";
pub const NAME_THERMOSTAT_MODE: &str = "thermostatMode";
pub const NAME_TEMP_RANGE_MIN: &str = "tempRangeMin";
pub const NAME_TEMP_RANGE_MAX: &str = "tempRangeMax";
pub const NAME_REMOTE_SENSOR_NAME: &str = "remoteSensorName";
pub const NAME_REMOTE_TEMP_MAX_WAIT: &str = "remoteTempMaxWait";
pub const NAME_ALONE_ON_TIME: &str = "aloneOnTime";
pub const NAME_ALONE_OFF_TIME: &str = "aloneOffTime";
pub const NAME_MAX_ON_TIME: &str = "maxOnTime";
pub const NAME_MIN_OFF_TIME: &str = "minOffTime";
pub const NAME_BURN_TOTAL: &str = "burnTotal";
pub const NAME_BURN_TODAY: &str = "burnToday";
pub const NAME_BURN_YESTERDAY: &str = "burnYesterday";
pub const NAME_BURN_THIS_MONTH: &str = "burnThisMonth";
pub const NAME_BURN_PREV_MONTH: &str = "burnPrevMonth";
pub const NAME_BURN_DAY: &str = "burnDay";
pub const NAME_BURN_MONTH: &str = "burnMonth";

/// Limits and cadences that are not user editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    pub range_min_min: i32,
    pub range_min_max: i32,
    pub range_max_min: i32,
    pub range_max_max: i32,
    pub state_update_interval_ms: u64,
    pub range_request_initial_ms: u64,
    pub range_request_regular_ms: u64,
    pub local_dead_band: f32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            range_min_min: 3,
            range_min_max: 30,
            range_max_min: 8,
            range_max_max: 35,
            state_update_interval_ms: 60_000,
            range_request_initial_ms: 15_000,
            range_request_regular_ms: 60_000,
            local_dead_band: 0.1,
        }
    }
}

/// Everything the thermostat keeps in the settings store, under the store's key names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    #[serde(rename = "thermostatEnabled")]
    pub enabled: bool,
    #[serde(rename = "thermostatMode")]
    pub cooler_mode: bool,
    #[serde(rename = "tempRangeMin")]
    pub range_min: i32,
    #[serde(rename = "tempRangeMax")]
    pub range_max: i32,
    #[serde(rename = "remoteSensorName")]
    pub remote_sensor_name: String,
    #[serde(rename = "remoteTempMaxWait")]
    pub remote_temp_max_wait_s: u32,
    #[serde(rename = "aloneOnTime")]
    pub alone_on_time_min: u32,
    #[serde(rename = "aloneOffTime")]
    pub alone_off_time_min: u32,
    #[serde(rename = "maxOnTime")]
    pub max_on_time_min: u32,
    #[serde(rename = "minOffTime")]
    pub min_off_time_min: u32,
    #[serde(flatten)]
    pub burn: BurnCounters,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cooler_mode: false,
            range_min: 18,
            range_max: 22,
            remote_sensor_name: String::new(),
            remote_temp_max_wait_s: 120,
            alone_on_time_min: 5,
            alone_off_time_min: 55,
            max_on_time_min: 30,
            min_off_time_min: 10,
            burn: BurnCounters::default(),
        }
    }
}

impl PersistedSettings {
    /// Replaces a stored band that the current limits would reject.
    pub fn sanitize(&mut self, config: &ThermostatConfig) {
        if crate::range::validate_range(config, self.range_min, self.range_max).is_err() {
            let defaults = Self::default();
            self.range_min = defaults.range_min;
            self.range_max = defaults.range_max;
        }
    }

    pub fn mode(&self) -> ControlMode {
        ControlMode::from_cooler(self.cooler_mode)
    }

    pub fn range(&self) -> TemperatureRange {
        TemperatureRange {
            min: self.range_min,
            max: self.range_max,
        }
    }

    pub fn timings(&self) -> Timings {
        Timings {
            remote_max_wait_ms: u64::from(self.remote_temp_max_wait_s) * MILLIS_IN_SEC,
            alone_on_time_ms: u64::from(self.alone_on_time_min) * MILLIS_IN_MIN,
            alone_off_time_ms: u64::from(self.alone_off_time_min) * MILLIS_IN_MIN,
            max_on_time_ms: u64::from(self.max_on_time_min) * MILLIS_IN_MIN,
            min_off_time_ms: u64::from(self.min_off_time_min) * MILLIS_IN_MIN,
        }
    }
}

/// Dwell and freshness windows in milliseconds. Zero disables a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timings {
    pub remote_max_wait_ms: u64,
    pub alone_on_time_ms: u64,
    pub alone_off_time_ms: u64,
    pub max_on_time_ms: u64,
    pub min_off_time_ms: u64,
}

/// One key/value write for the settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    Enabled(bool),
    CoolerMode(bool),
    RangeMin(i32),
    RangeMax(i32),
    RemoteSensorName(String),
    RemoteTempMaxWait(u32),
    AloneOnTime(u32),
    AloneOffTime(u32),
    MaxOnTime(u32),
    MinOffTime(u32),
    BurnTotal(u32),
    BurnToday(u32),
    BurnYesterday(u32),
    BurnThisMonth(u32),
    BurnPrevMonth(u32),
    BurnDay(u32),
    BurnMonth(u32),
}

impl Setting {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Enabled(_) => NAME_THERMOSTAT_ENABLED,
            Self::CoolerMode(_) => NAME_THERMOSTAT_MODE,
            Self::RangeMin(_) => NAME_TEMP_RANGE_MIN,
            Self::RangeMax(_) => NAME_TEMP_RANGE_MAX,
            Self::RemoteSensorName(_) => NAME_REMOTE_SENSOR_NAME,
            Self::RemoteTempMaxWait(_) => NAME_REMOTE_TEMP_MAX_WAIT,
            Self::AloneOnTime(_) => NAME_ALONE_ON_TIME,
            Self::AloneOffTime(_) => NAME_ALONE_OFF_TIME,
            Self::MaxOnTime(_) => NAME_MAX_ON_TIME,
            Self::MinOffTime(_) => NAME_MIN_OFF_TIME,
            Self::BurnTotal(_) => NAME_BURN_TOTAL,
            Self::BurnToday(_) => NAME_BURN_TODAY,
            Self::BurnYesterday(_) => NAME_BURN_YESTERDAY,
            Self::BurnThisMonth(_) => NAME_BURN_THIS_MONTH,
            Self::BurnPrevMonth(_) => NAME_BURN_PREV_MONTH,
            Self::BurnDay(_) => NAME_BURN_DAY,
            Self::BurnMonth(_) => NAME_BURN_MONTH,
        }
    }

    pub fn value(&self) -> Value {
        match self {
            Self::Enabled(value) | Self::CoolerMode(value) => Value::from(*value),
            Self::RangeMin(value) | Self::RangeMax(value) => Value::from(*value),
            Self::RemoteSensorName(name) => Value::from(name.as_str()),
            Self::RemoteTempMaxWait(value)
            | Self::AloneOnTime(value)
            | Self::AloneOffTime(value)
            | Self::MaxOnTime(value)
            | Self::MinOffTime(value)
            | Self::BurnTotal(value)
            | Self::BurnToday(value)
            | Self::BurnYesterday(value)
            | Self::BurnThisMonth(value)
            | Self::BurnPrevMonth(value)
            | Self::BurnDay(value)
            | Self::BurnMonth(value) => Value::from(*value),
        }
    }
}

/// Partial update of the user-editable settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(rename = "thermostatEnabled", default)]
    pub enabled: Option<bool>,
    #[serde(rename = "thermostatMode", default)]
    pub cooler_mode: Option<bool>,
    #[serde(rename = "tempRangeMin", default)]
    pub range_min: Option<i32>,
    #[serde(rename = "tempRangeMax", default)]
    pub range_max: Option<i32>,
    #[serde(rename = "remoteSensorName", default)]
    pub remote_sensor_name: Option<String>,
    #[serde(rename = "remoteTempMaxWait", default)]
    pub remote_temp_max_wait_s: Option<u32>,
    #[serde(rename = "aloneOnTime", default)]
    pub alone_on_time_min: Option<u32>,
    #[serde(rename = "aloneOffTime", default)]
    pub alone_off_time_min: Option<u32>,
    #[serde(rename = "maxOnTime", default)]
    pub max_on_time_min: Option<u32>,
    #[serde(rename = "minOffTime", default)]
    pub min_off_time_min: Option<u32>,
}

impl SettingsUpdate {
    /// Writes the provided values into `settings` and returns the store writes they imply.
    pub fn apply_to(&self, settings: &mut PersistedSettings) -> Vec<Setting> {
        let mut writes = Vec::new();

        if let Some(enabled) = self.enabled {
            settings.enabled = enabled;
            writes.push(Setting::Enabled(enabled));
        }
        if let Some(cooler) = self.cooler_mode {
            settings.cooler_mode = cooler;
            writes.push(Setting::CoolerMode(cooler));
        }
        if let Some(min) = self.range_min {
            settings.range_min = min;
            writes.push(Setting::RangeMin(min));
        }
        if let Some(max) = self.range_max {
            settings.range_max = max;
            writes.push(Setting::RangeMax(max));
        }
        if let Some(name) = &self.remote_sensor_name {
            settings.remote_sensor_name = name.trim().to_string();
            writes.push(Setting::RemoteSensorName(settings.remote_sensor_name.clone()));
        }
        if let Some(wait) = self.remote_temp_max_wait_s {
            settings.remote_temp_max_wait_s = wait;
            writes.push(Setting::RemoteTempMaxWait(wait));
        }
        if let Some(minutes) = self.alone_on_time_min {
            settings.alone_on_time_min = minutes;
            writes.push(Setting::AloneOnTime(minutes));
        }
        if let Some(minutes) = self.alone_off_time_min {
            settings.alone_off_time_min = minutes;
            writes.push(Setting::AloneOffTime(minutes));
        }
        if let Some(minutes) = self.max_on_time_min {
            settings.max_on_time_min = minutes;
            writes.push(Setting::MaxOnTime(minutes));
        }
        if let Some(minutes) = self.min_off_time_min {
            settings.min_off_time_min = minutes;
            writes.push(Setting::MinOffTime(minutes));
        }

        writes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub mqtt_client_id: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            mqtt_client_id: "relay-thermostat".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub network: NetworkConfig,
    pub topic_root: String,
    pub timezone: String,
    pub local_sensor_path: Option<String>,
    pub relay_gpio_path: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thermostat: ThermostatConfig::default(),
            network: NetworkConfig::default(),
            topic_root: "thermostat".to_string(),
            timezone: "UTC".to_string(),
            local_sensor_path: None,
            relay_gpio_path: None,
        }
    }
}
