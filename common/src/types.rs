use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Heater,
    Cooler,
}

impl ControlMode {
    pub fn from_cooler(cooler: bool) -> Self {
        if cooler {
            Self::Cooler
        } else {
            Self::Heater
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heater => "HEATER",
            Self::Cooler => "COOLER",
        }
    }
}

/// Direction of the current regulation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cycle {
    Heating,
    Cooling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureSource {
    None,
    Local,
    Remote,
}

impl TemperatureSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "autonomous",
            Self::Local => "local temperature",
            Self::Remote => "remote temperature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeBound {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub min: i32,
    pub max: i32,
}

/// Last reading received from the network sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RemoteTemperature {
    pub value: f32,
    pub last_update_ms: Option<u64>,
}

impl RemoteTemperature {
    pub fn is_fresh(&self, now_ms: u64, max_wait_ms: u64) -> bool {
        self.last_update_ms
            .map(|last| now_ms.saturating_sub(last) < max_wait_ms)
            .unwrap_or(false)
    }
}

/// Burn time accumulators, one unit per tick spent with the actuator on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BurnCounters {
    #[serde(rename = "burnTotal", default)]
    pub total: u32,
    #[serde(rename = "burnToday", default)]
    pub today: u32,
    #[serde(rename = "burnYesterday", default)]
    pub yesterday: u32,
    #[serde(rename = "burnThisMonth", default)]
    pub this_month: u32,
    #[serde(rename = "burnPrevMonth", default)]
    pub prev_month: u32,
    #[serde(rename = "burnDay", default)]
    pub current_day: u32,
    #[serde(rename = "burnMonth", default)]
    pub current_month: u32,
}

/// Day of month and month number, available only once wall time is synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDate {
    pub day: u32,
    pub month: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    #[serde(rename = "thermostatEnabled")]
    pub enabled: bool,
    #[serde(rename = "thermostatMode")]
    pub cooler_mode: bool,
    pub mode: &'static str,
    #[serde(rename = "tempRangeMin")]
    pub range_min: i32,
    #[serde(rename = "tempRangeMax")]
    pub range_max: i32,
    #[serde(rename = "remoteSensorName")]
    pub remote_sensor_name: String,
    #[serde(rename = "remoteTempMaxWait")]
    pub remote_temp_max_wait_s: u32,
    #[serde(rename = "maxOnTime")]
    pub max_on_time_min: u32,
    #[serde(rename = "minOffTime")]
    pub min_off_time_min: u32,
    #[serde(rename = "aloneOnTime")]
    pub alone_on_time_min: u32,
    #[serde(rename = "aloneOffTime")]
    pub alone_off_time_min: u32,
    #[serde(rename = "burnTotal")]
    pub burn_total: u32,
    #[serde(rename = "burnToday")]
    pub burn_today: u32,
    #[serde(rename = "burnYesterday")]
    pub burn_yesterday: u32,
    #[serde(rename = "burnThisMonth")]
    pub burn_this_month: u32,
    #[serde(rename = "burnPrevMonth")]
    pub burn_prev_month: u32,
    #[serde(rename = "burnTodayString")]
    pub burn_today_string: String,
    #[serde(rename = "burnTotalString")]
    pub burn_total_string: String,
    #[serde(rename = "thermostatOperationMode")]
    pub operation_mode: &'static str,
    #[serde(rename = "remoteTmp")]
    pub remote_temp: Option<f32>,
    pub cycle: Cycle,
    #[serde(rename = "relayOn")]
    pub relay_on: bool,
    #[serde(rename = "timeSynced")]
    pub time_synced: bool,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatePayload {
    pub enabled: bool,
    pub mode: &'static str,
    pub min: i32,
    pub max: i32,
    pub source: TemperatureSource,
    pub temp: Option<f32>,
    pub relay: bool,
    #[serde(rename = "burnToday")]
    pub burn_today: u32,
}

pub fn format_burn_time(minutes: u32) -> String {
    if minutes < 60 {
        format!("{minutes} min")
    } else {
        format!("{} h {} min", minutes / 60, minutes % 60)
    }
}
