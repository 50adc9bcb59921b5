pub mod arbiter;
pub mod burn;
pub mod config;
pub mod error;
pub mod fallback;
pub mod hysteresis;
pub mod payload;
pub mod range;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use config::{PersistedSettings, RuntimeConfig, Setting, SettingsUpdate, ThermostatConfig};
pub use error::{PayloadError, RangeError};
pub use thermostat::{EngineAction, ThermostatEngine, TickInputs};
pub use topics::*;
pub use types::{
    format_burn_time, BurnCounters, CalendarDate, ControlMode, ControllerStatePayload,
    ControllerStatus, Cycle, RangeBound, RemoteTemperature, TemperatureRange, TemperatureSource,
};
