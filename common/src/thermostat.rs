use crate::{
    arbiter::{self, Reading},
    burn::BurnAccountant,
    config::{PersistedSettings, Setting, SettingsUpdate, ThermostatConfig},
    error::RangeError,
    fallback::{self, AloneWindows, FallbackCommand},
    hysteresis::{DwellGuards, HysteresisController},
    range::{self, RangeRequestTimer},
    types::{
        format_burn_time, BurnCounters, CalendarDate, ControlMode, ControllerStatePayload,
        ControllerStatus, Cycle, RangeBound, RemoteTemperature, TemperatureRange,
        TemperatureSource,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    SetActuator(bool),
    Persist(Setting),
    RangeChanged(RangeBound, i32),
    SourceChanged(TemperatureSource),
    RequestRange,
}

/// Collaborator readings, sampled once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInputs {
    pub now_ms: u64,
    pub actuator_on: bool,
    pub local_temp: Option<f32>,
    pub date: Option<CalendarDate>,
    pub bus_connected: bool,
}

#[derive(Debug, Clone)]
pub struct ThermostatEngine {
    pub config: ThermostatConfig,
    settings: PersistedSettings,

    remote: RemoteTemperature,
    source: TemperatureSource,
    last_temperature: Option<f32>,

    hysteresis: HysteresisController,
    burn: BurnAccountant,
    range_requests: RangeRequestTimer,

    last_evaluation_ms: Option<u64>,
    // State the engine last drove the actuator to; a mismatch means an outside writer.
    commanded: Option<bool>,
}

impl ThermostatEngine {
    pub fn new(config: ThermostatConfig, mut settings: PersistedSettings) -> Self {
        settings.sanitize(&config);
        let burn = BurnAccountant::new(settings.burn);
        Self {
            config,
            settings,
            remote: RemoteTemperature::default(),
            source: TemperatureSource::None,
            last_temperature: None,
            hysteresis: HysteresisController::new(),
            burn,
            range_requests: RangeRequestTimer::default(),
            last_evaluation_ms: None,
            commanded: None,
        }
    }

    /// Snapshot of every persisted value, burn counters included.
    pub fn settings(&self) -> PersistedSettings {
        PersistedSettings {
            burn: self.burn.counters(),
            ..self.settings.clone()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn is_cooler_mode(&self) -> bool {
        self.settings.cooler_mode
    }

    pub fn mode(&self) -> ControlMode {
        self.settings.mode()
    }

    pub fn range(&self) -> TemperatureRange {
        self.settings.range()
    }

    pub fn remote_sensor_name(&self) -> &str {
        &self.settings.remote_sensor_name
    }

    pub fn remote_temperature(&self) -> RemoteTemperature {
        self.remote
    }

    pub fn burn_counters(&self) -> BurnCounters {
        self.burn.counters()
    }

    pub fn temperature_source(&self) -> TemperatureSource {
        self.source
    }

    pub fn last_temperature(&self) -> Option<f32> {
        self.last_temperature
    }

    pub fn cycle(&self) -> Cycle {
        self.hysteresis.cycle()
    }

    pub fn last_switch_ms(&self) -> Option<u64> {
        self.hysteresis.last_switch_ms()
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Vec<EngineAction> {
        self.settings.enabled = enabled;
        vec![EngineAction::Persist(Setting::Enabled(enabled))]
    }

    pub fn set_cooler_mode(&mut self, cooler: bool) -> Vec<EngineAction> {
        self.settings.cooler_mode = cooler;
        vec![EngineAction::Persist(Setting::CoolerMode(cooler))]
    }

    /// Replaces the stored remote reading. Non-finite values are dropped.
    pub fn on_remote_temperature(&mut self, value: f32, now_ms: u64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.remote = RemoteTemperature {
            value,
            last_update_ms: Some(now_ms),
        };
        true
    }

    pub fn apply_range_update(
        &mut self,
        min: i32,
        max: i32,
        now_ms: u64,
    ) -> (bool, Vec<EngineAction>) {
        match self.try_apply_range_update(min, max, now_ms) {
            Ok(actions) => (true, actions),
            Err(_) => (false, Vec::new()),
        }
    }

    pub fn try_apply_range_update(
        &mut self,
        min: i32,
        max: i32,
        now_ms: u64,
    ) -> Result<Vec<EngineAction>, RangeError> {
        let next = range::validate_range(&self.config, min, max)?;
        let previous = self.settings.range();

        self.settings.range_min = next.min;
        self.settings.range_max = next.max;
        self.range_requests.mark_received(now_ms);

        let mut actions = vec![
            EngineAction::Persist(Setting::RangeMin(next.min)),
            EngineAction::Persist(Setting::RangeMax(next.max)),
        ];
        range::push_range_changes(previous, next, &mut actions);
        Ok(actions)
    }

    /// Applies edited settings the way a settings reload does: persist what
    /// was given, then notify each range bound that moved.
    pub fn apply_settings_update(
        &mut self,
        update: &SettingsUpdate,
    ) -> Result<Vec<EngineAction>, RangeError> {
        let previous = self.settings.range();
        range::validate_range(
            &self.config,
            update.range_min.unwrap_or(previous.min),
            update.range_max.unwrap_or(previous.max),
        )?;

        let mut actions: Vec<EngineAction> = update
            .apply_to(&mut self.settings)
            .into_iter()
            .map(EngineAction::Persist)
            .collect();
        range::push_range_changes(previous, self.settings.range(), &mut actions);
        Ok(actions)
    }

    pub fn reset_burn_counters(&mut self) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        self.burn.reset(&mut actions);
        actions
    }

    /// One pass of the host loop: range requests while the bus is up, then a
    /// control evaluation once the state update interval has passed.
    pub fn tick(&mut self, inputs: TickInputs) -> Vec<EngineAction> {
        if !self.settings.enabled {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if inputs.bus_connected && self.range_requests.poll(&self.config, inputs.now_ms) {
            actions.push(EngineAction::RequestRange);
        }

        let due = self
            .last_evaluation_ms
            .map(|last| inputs.now_ms.saturating_sub(last) >= self.config.state_update_interval_ms)
            .unwrap_or(true);
        if due {
            self.last_evaluation_ms = Some(inputs.now_ms);
            actions.append(&mut self.evaluate(inputs));
        }

        actions
    }

    /// Burn accounting, source arbitration and the actuator decision for one tick.
    pub fn evaluate(&mut self, inputs: TickInputs) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        let now_ms = inputs.now_ms;
        let actuator_on = inputs.actuator_on;

        if self.commanded.is_some_and(|commanded| commanded != actuator_on) {
            self.hysteresis.forget_last_switch();
            self.commanded = None;
        }

        self.burn.tick(actuator_on, inputs.date, &mut actions);

        let timings = self.settings.timings();
        let previous_source = self.source;
        let reading = arbiter::select_source(
            &self.remote,
            inputs.local_temp,
            now_ms,
            timings.remote_max_wait_ms,
            self.config.local_dead_band,
        );
        self.source = reading.source();
        self.last_temperature = reading.temperature();

        match reading {
            Reading::Remote(temp) | Reading::Local(temp) => {
                let guards = DwellGuards {
                    max_on_time_ms: timings.max_on_time_ms,
                    min_off_time_ms: timings.min_off_time_ms,
                };
                let next = self.hysteresis.evaluate(
                    temp,
                    self.settings.mode(),
                    self.settings.range(),
                    actuator_on,
                    now_ms,
                    guards,
                );
                if next != actuator_on {
                    self.command(next, &mut actions);
                }
            }
            Reading::Unavailable => {
                let windows = AloneWindows {
                    on_time_ms: timings.alone_on_time_ms,
                    off_time_ms: timings.alone_off_time_ms,
                };
                let since = self.hysteresis.since_last_switch(now_ms);
                if fallback::evaluate(actuator_on, since, windows) == FallbackCommand::ForceOff {
                    self.hysteresis.record_switch(now_ms);
                    self.command(false, &mut actions);
                }
            }
        }

        if previous_source != self.source {
            actions.push(EngineAction::SourceChanged(self.source));
        }

        actions
    }

    pub fn status(&self, relay_on: bool, time_synced: bool, timezone: &str) -> ControllerStatus {
        let burn = self.burn.counters();
        ControllerStatus {
            enabled: self.settings.enabled,
            cooler_mode: self.settings.cooler_mode,
            mode: self.settings.mode().as_str(),
            range_min: self.settings.range_min,
            range_max: self.settings.range_max,
            remote_sensor_name: self.settings.remote_sensor_name.clone(),
            remote_temp_max_wait_s: self.settings.remote_temp_max_wait_s,
            max_on_time_min: self.settings.max_on_time_min,
            min_off_time_min: self.settings.min_off_time_min,
            alone_on_time_min: self.settings.alone_on_time_min,
            alone_off_time_min: self.settings.alone_off_time_min,
            burn_total: burn.total,
            burn_today: burn.today,
            burn_yesterday: burn.yesterday,
            burn_this_month: burn.this_month,
            burn_prev_month: burn.prev_month,
            burn_today_string: format_burn_time(burn.today),
            burn_total_string: format_burn_time(burn.total),
            operation_mode: self.source.label(),
            remote_temp: (self.source == TemperatureSource::Remote).then_some(self.remote.value),
            cycle: self.hysteresis.cycle(),
            relay_on,
            time_synced,
            timezone: timezone.to_string(),
        }
    }

    pub fn state_payload(&self, relay_on: bool) -> ControllerStatePayload {
        ControllerStatePayload {
            enabled: self.settings.enabled,
            mode: self.settings.mode().as_str(),
            min: self.settings.range_min,
            max: self.settings.range_max,
            source: self.source,
            temp: self.last_temperature,
            relay: relay_on,
            burn_today: self.burn.counters().today,
        }
    }

    fn command(&mut self, on: bool, actions: &mut Vec<EngineAction>) {
        self.commanded = Some(on);
        actions.push(EngineAction::SetActuator(on));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn engine() -> ThermostatEngine {
        ThermostatEngine::new(ThermostatConfig::default(), PersistedSettings::default())
    }

    fn inputs(now_ms: u64, actuator_on: bool, local_temp: Option<f32>) -> TickInputs {
        TickInputs {
            now_ms,
            actuator_on,
            local_temp,
            date: None,
            bus_connected: false,
        }
    }

    #[test]
    fn cold_local_reading_turns_heater_on() {
        let mut engine = engine();

        let actions = engine.evaluate(inputs(1_000, false, Some(15.0)));

        assert_eq!(
            actions,
            vec![
                EngineAction::SetActuator(true),
                EngineAction::SourceChanged(TemperatureSource::Local),
            ]
        );
        assert_eq!(engine.cycle(), Cycle::Heating);
        assert_eq!(engine.last_switch_ms(), Some(1_000));
    }

    #[test]
    fn on_ticks_persist_burn_before_deciding() {
        let mut engine = engine();
        engine.evaluate(inputs(0, false, Some(15.0)));

        let actions = engine.evaluate(inputs(60_000, true, Some(23.0)));

        assert_eq!(
            actions,
            vec![
                EngineAction::Persist(Setting::BurnTotal(1)),
                EngineAction::Persist(Setting::BurnToday(1)),
                EngineAction::Persist(Setting::BurnThisMonth(1)),
                EngineAction::SetActuator(false),
            ]
        );
        assert_eq!(engine.cycle(), Cycle::Cooling);
    }

    #[test]
    fn fresh_remote_overrides_local() {
        let mut engine = engine();
        engine.on_remote_temperature(25.0, 0);
        engine.evaluate(inputs(1_000, false, Some(15.0)));

        assert_eq!(engine.temperature_source(), TemperatureSource::Remote);
        assert_eq!(engine.last_temperature(), Some(25.0));
        assert_eq!(engine.status(false, false, "UTC").remote_temp, Some(25.0));
    }

    #[test]
    fn non_finite_remote_is_rejected() {
        let mut engine = engine();
        assert!(!engine.on_remote_temperature(f32::NAN, 0));
        assert_eq!(engine.remote_temperature().last_update_ms, None);
    }

    #[test]
    fn source_change_notifies_once() {
        let mut engine = engine();
        engine.evaluate(inputs(0, false, Some(20.0)));

        let actions = engine.evaluate(inputs(60_000, false, Some(20.0)));
        assert!(actions.is_empty());

        let actions = engine.evaluate(inputs(120_000, false, None));
        assert_eq!(
            actions,
            vec![EngineAction::SourceChanged(TemperatureSource::None)]
        );
    }

    #[test]
    fn fallback_reasserts_off_and_records_switch() {
        let mut engine = engine();

        let actions = engine.evaluate(inputs(3_300_001, false, None));

        assert_eq!(actions, vec![EngineAction::SetActuator(false)]);
        assert_eq!(engine.last_switch_ms(), Some(3_300_001));
    }

    #[test]
    fn range_update_notifies_changed_bounds_only() {
        let mut engine = engine();

        let (accepted, actions) = engine.apply_range_update(18, 25, 100);

        assert!(accepted);
        assert_eq!(
            actions,
            vec![
                EngineAction::Persist(Setting::RangeMin(18)),
                EngineAction::Persist(Setting::RangeMax(25)),
                EngineAction::RangeChanged(RangeBound::Max, 25),
            ]
        );
        assert_eq!(engine.range(), TemperatureRange { min: 18, max: 25 });
    }

    #[test]
    fn rejected_range_update_leaves_state() {
        let mut engine = engine();

        let (accepted, actions) = engine.apply_range_update(40, 45, 100);

        assert!(!accepted);
        assert!(actions.is_empty());
        assert_eq!(engine.range(), PersistedSettings::default().range());
    }

    #[test]
    fn settings_update_validates_combined_range() {
        let mut engine = engine();
        let update = SettingsUpdate {
            range_min: Some(25),
            ..SettingsUpdate::default()
        };

        assert_eq!(
            engine.apply_settings_update(&update),
            Err(RangeError::Inverted { min: 25, max: 22 })
        );

        let update = SettingsUpdate {
            range_min: Some(16),
            max_on_time_min: Some(0),
            ..SettingsUpdate::default()
        };
        let actions = engine.apply_settings_update(&update).unwrap();
        assert_eq!(
            actions,
            vec![
                EngineAction::Persist(Setting::RangeMin(16)),
                EngineAction::Persist(Setting::MaxOnTime(0)),
                EngineAction::RangeChanged(RangeBound::Min, 16),
            ]
        );
    }

    #[test]
    fn disabled_engine_does_nothing() {
        let mut engine = engine();
        engine.set_enabled(false);

        let actions = engine.tick(TickInputs {
            bus_connected: true,
            ..inputs(100_000, false, Some(10.0))
        });

        assert!(actions.is_empty());
    }

    #[test]
    fn tick_respects_state_update_interval() {
        let mut engine = engine();

        assert!(!engine.tick(inputs(0, false, Some(15.0))).is_empty());
        assert!(engine.tick(inputs(59_999, true, Some(15.0))).is_empty());
        assert_eq!(
            engine.tick(inputs(60_000, true, Some(15.0))),
            vec![
                EngineAction::Persist(Setting::BurnTotal(1)),
                EngineAction::Persist(Setting::BurnToday(1)),
                EngineAction::Persist(Setting::BurnThisMonth(1)),
            ]
        );
    }

    #[test]
    fn tick_requests_range_while_connected() {
        let mut engine = engine();

        let actions = engine.tick(TickInputs {
            bus_connected: true,
            ..inputs(15_001, false, Some(20.0))
        });

        assert_eq!(actions.first(), Some(&EngineAction::RequestRange));
    }

    #[test]
    fn external_override_forgets_last_switch() {
        let mut engine = engine();
        engine.evaluate(inputs(0, false, Some(15.0)));
        assert_eq!(engine.last_switch_ms(), Some(0));

        // Relay found off although the engine turned it on.
        let actions = engine.evaluate(inputs(60_000, false, Some(15.0)));

        assert_eq!(actions, vec![EngineAction::SetActuator(true)]);
        assert_eq!(engine.last_switch_ms(), Some(60_000));
    }

    #[test]
    fn reset_counters_keeps_settings_snapshot_in_sync() {
        let mut settings = PersistedSettings::default();
        settings.burn.total = 99;
        let mut engine = ThermostatEngine::new(ThermostatConfig::default(), settings);

        let actions = engine.reset_burn_counters();

        assert_eq!(actions.len(), 5);
        assert_eq!(engine.settings().burn.total, 0);
    }

    #[test]
    fn mode_and_enabled_setters_persist() {
        let mut engine = engine();

        assert_eq!(
            engine.set_cooler_mode(true),
            vec![EngineAction::Persist(Setting::CoolerMode(true))]
        );
        assert!(engine.is_cooler_mode());
        assert_eq!(engine.mode(), ControlMode::Cooler);
        assert_eq!(engine.state_payload(false).mode, "COOLER");
    }
}
