use crate::types::{RemoteTemperature, TemperatureSource};

/// Temperature chosen for one evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Remote(f32),
    Local(f32),
    Unavailable,
}

impl Reading {
    pub fn source(self) -> TemperatureSource {
        match self {
            Self::Remote(_) => TemperatureSource::Remote,
            Self::Local(_) => TemperatureSource::Local,
            Self::Unavailable => TemperatureSource::None,
        }
    }

    pub fn temperature(self) -> Option<f32> {
        match self {
            Self::Remote(temp) | Self::Local(temp) => Some(temp),
            Self::Unavailable => None,
        }
    }
}

/// Local sensors report exactly zero when absent, so readings inside the
/// dead band around zero count as no reading.
pub fn usable_local(raw: Option<f32>, dead_band: f32) -> Option<f32> {
    raw.filter(|temp| temp.is_finite() && !(-dead_band < *temp && *temp < dead_band))
}

pub fn select_source(
    remote: &RemoteTemperature,
    local: Option<f32>,
    now_ms: u64,
    remote_max_wait_ms: u64,
    dead_band: f32,
) -> Reading {
    if remote.is_fresh(now_ms, remote_max_wait_ms) {
        return Reading::Remote(remote.value);
    }

    match usable_local(local, dead_band) {
        Some(temp) => Reading::Local(temp),
        None => Reading::Unavailable,
    }
}
