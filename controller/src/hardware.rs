use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, warn};

/// The single output the thermostat drives.
pub trait Relay: Send {
    fn set(&mut self, on: bool) -> anyhow::Result<()>;
    fn is_on(&self) -> bool;
}

pub trait LocalSensor: Send {
    fn read_celsius(&mut self) -> Option<f32>;
}

/// Relay without hardware behind it; state only lives in memory.
#[derive(Debug, Default)]
pub struct SimulatedRelay {
    on: bool,
}

impl Relay for SimulatedRelay {
    fn set(&mut self, on: bool) -> anyhow::Result<()> {
        self.on = on;
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// GPIO line exported through sysfs, e.g. `/sys/class/gpio/gpio17/value`.
#[derive(Debug)]
pub struct SysfsRelay {
    path: PathBuf,
    last_written: bool,
}

impl SysfsRelay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: false,
        }
    }
}

impl Relay for SysfsRelay {
    fn set(&mut self, on: bool) -> anyhow::Result<()> {
        std::fs::write(&self.path, if on { "1" } else { "0" })
            .with_context(|| format!("failed to write relay line {}", self.path.display()))?;
        self.last_written = on;
        Ok(())
    }

    fn is_on(&self) -> bool {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw.trim() == "1",
            Err(err) => {
                warn!("relay line {} unreadable: {err}", self.path.display());
                self.last_written
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct NoLocalSensor;

impl LocalSensor for NoLocalSensor {
    fn read_celsius(&mut self) -> Option<f32> {
        None
    }
}

/// Reads a decimal Celsius value from a file kept current by a sensor daemon.
#[derive(Debug)]
pub struct FileSensor {
    path: PathBuf,
}

impl FileSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LocalSensor for FileSensor {
    fn read_celsius(&mut self) -> Option<f32> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!("local sensor {} unreadable: {err}", self.path.display());
                return None;
            }
        };
        raw.trim().parse::<f32>().ok()
    }
}

pub struct Hardware {
    pub relay: Box<dyn Relay>,
    pub sensor: Box<dyn LocalSensor>,
}

impl Hardware {
    pub fn from_paths(relay_gpio_path: Option<&str>, local_sensor_path: Option<&str>) -> Self {
        let relay: Box<dyn Relay> = match relay_gpio_path {
            Some(path) => Box::new(SysfsRelay::new(path)),
            None => Box::new(SimulatedRelay::default()),
        };
        let sensor: Box<dyn LocalSensor> = match local_sensor_path {
            Some(path) => Box::new(FileSensor::new(path)),
            None => Box::new(NoLocalSensor),
        };
        Self { relay, sensor }
    }
}
