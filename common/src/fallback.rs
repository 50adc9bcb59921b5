/// Windows used while no temperature source is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AloneWindows {
    pub on_time_ms: u64,
    pub off_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackCommand {
    Hold,
    ForceOff,
}

impl FallbackCommand {
    pub fn next_state(self, actuator_on: bool) -> bool {
        match self {
            Self::Hold => actuator_on,
            Self::ForceOff => false,
        }
    }
}

/// Without a temperature the actuator is only ever shut down once its window
/// elapses; it is never energised. An elapsed off window re-asserts off.
pub fn evaluate(
    actuator_on: bool,
    since_last_switch_ms: u64,
    windows: AloneWindows,
) -> FallbackCommand {
    let window = if actuator_on {
        windows.on_time_ms
    } else {
        windows.off_time_ms
    };

    if since_last_switch_ms > window {
        FallbackCommand::ForceOff
    } else {
        FallbackCommand::Hold
    }
}
