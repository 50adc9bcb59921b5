use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Datelike, Offset, Utc};
use chrono_tz::Tz;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{debug, info, warn};

use relay_thermostat_common::{
    payload::{parse_range_override, parse_remote_temperature},
    range_notify_topic, remote_sensor_topic, rooted, CalendarDate, EngineAction,
    PersistedSettings, RuntimeConfig, Setting, SettingsUpdate, ThermostatEngine, TickInputs,
    TOPIC_ASK_TEMP_RANGE, TOPIC_CONTROLLER_STATE, TOPIC_HOLD_TEMP, TOPIC_RELAY,
};

use crate::hardware::Hardware;

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const CONTROL_POLL_INTERVAL: Duration = Duration::from_secs(1);
const STATE_PUBLISH_INTERVAL: Duration = Duration::from_secs(10);
// Wall clocks before this year have not been set by a time source yet.
const MIN_SYNCED_YEAR: i32 = 2020;

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<ThermostatEngine>>,
    hardware: Arc<Mutex<Hardware>>,
    timezone: Arc<Mutex<String>>,
    time_synced: Arc<AtomicBool>,
    mqtt_connected: Arc<AtomicBool>,
    topic_root: Arc<String>,
    mqtt: AsyncClient,
    store: AppStore,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    settings_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct TimezoneUpdate {
    timezone: String,
}

#[derive(Debug, Serialize)]
struct TimeStatus {
    #[serde(rename = "timeSynced")]
    time_synced: bool,
    timezone: String,
    #[serde(rename = "nowEpoch")]
    now_epoch: i64,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    let settings = store.load_settings().await.unwrap_or_else(|err| {
        warn!("failed to load thermostat settings from store: {err:#}");
        PersistedSettings::default()
    });

    let engine = ThermostatEngine::new(runtime.thermostat.clone(), settings);
    info!(
        "thermostat enabled={} mode={} range={}..{}",
        engine.is_enabled(),
        engine.mode().as_str(),
        engine.range().min,
        engine.range().max
    );

    let hardware = Hardware::from_paths(
        runtime.relay_gpio_path.as_deref(),
        runtime.local_sensor_path.as_deref(),
    );

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options =
        MqttOptions::new(runtime.network.mqtt_client_id.clone(), mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        engine: Arc::new(Mutex::new(engine)),
        hardware: Arc::new(Mutex::new(hardware)),
        timezone: Arc::new(Mutex::new(runtime.timezone)),
        time_synced: Arc::new(AtomicBool::new(false)),
        mqtt_connected: Arc::new(AtomicBool::new(false)),
        topic_root: Arc::new(runtime.topic_root),
        mqtt,
        store,
    };

    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_control_loop(app_state.clone());
    spawn_state_publish_loop(app_state.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/enabled", post(handle_set_enabled))
        .route("/api/mode", post(handle_set_mode))
        .route("/api/range", post(handle_set_range))
        .route("/api/settings", put(handle_put_settings))
        .route("/api/counters/reset", post(handle_reset_counters))
        .route("/api/time", get(handle_get_time))
        .route("/api/timezone", put(handle_put_timezone))
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn subscribe_topics(app_state: &AppState) -> anyhow::Result<()> {
    let hold_topic = rooted(&app_state.topic_root, TOPIC_HOLD_TEMP);
    app_state.mqtt.try_subscribe(hold_topic, QoS::AtMostOnce)?;

    if let Some(topic) = remote_topic(app_state).await {
        app_state.mqtt.try_subscribe(topic, QoS::AtMostOnce)?;
    }
    Ok(())
}

async fn remote_topic(app_state: &AppState) -> Option<String> {
    let engine = app_state.engine.lock().await;
    let name = engine.remote_sensor_name();
    (!name.is_empty()).then(|| remote_sensor_topic(name))
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    app_state.mqtt_connected.store(true, Ordering::Relaxed);
                    if let Err(err) = subscribe_topics(&app_state).await {
                        warn!("mqtt subscribe failed: {err:#}");
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    app_state.mqtt_connected.store(false, Ordering::Relaxed);
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_control_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CONTROL_POLL_INTERVAL);

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let timezone = { app_state.timezone.lock().await.clone() };
            let date = calendar_in_timezone(&timezone);
            app_state
                .time_synced
                .store(date.is_some(), Ordering::Relaxed);

            let (actuator_on, local_temp) = {
                let mut hardware = app_state.hardware.lock().await;
                (hardware.relay.is_on(), hardware.sensor.read_celsius())
            };

            let actions = {
                let mut engine = app_state.engine.lock().await;
                engine.tick(TickInputs {
                    now_ms,
                    actuator_on,
                    local_temp,
                    date,
                    bus_connected: app_state.mqtt_connected.load(Ordering::Relaxed),
                })
            };

            if !actions.is_empty() {
                execute_engine_actions(&app_state, actions).await;
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATE_PUBLISH_INTERVAL);
        loop {
            interval.tick().await;
            publish_state(&app_state).await;
        }
    });
}

// Control-path output never waits on the broker; a full request queue drops the message.
async fn publish_state(app_state: &AppState) {
    let relay_on = app_state.hardware.lock().await.relay.is_on();
    let payload = {
        let engine = app_state.engine.lock().await;
        serde_json::to_vec(&engine.state_payload(relay_on))
    };

    match payload {
        Ok(body) => {
            let topic = rooted(&app_state.topic_root, TOPIC_CONTROLLER_STATE);
            if let Err(err) = app_state.mqtt.try_publish(topic, QoS::AtLeastOnce, true, body) {
                warn!("controller state publish dropped: {err}");
            }
        }
        Err(err) => warn!("controller state serialization failed: {err}"),
    }
}

async fn execute_engine_actions(app_state: &AppState, actions: Vec<EngineAction>) {
    for action in actions {
        match action {
            EngineAction::SetActuator(on) => {
                let realized = {
                    let mut hardware = app_state.hardware.lock().await;
                    switch_relay(&mut hardware, on)
                };
                publish(app_state, TOPIC_RELAY, if realized { "1" } else { "0" });
            }
            EngineAction::Persist(setting) => {
                if let Err(err) = app_state.store.save_setting(&setting).await {
                    warn!("failed to persist {}: {err:#}", setting.key());
                }
            }
            EngineAction::RangeChanged(bound, value) => {
                info!("temperature range {bound:?} = {value}");
                let topic = range_notify_topic(&app_state.topic_root, bound);
                if let Err(err) = app_state.mqtt.try_publish(
                    topic,
                    QoS::AtLeastOnce,
                    true,
                    value.to_string(),
                ) {
                    warn!("range notification publish dropped: {err}");
                }
            }
            EngineAction::SourceChanged(source) => {
                info!("operation mode: {}", source.label());
                publish_state(app_state).await;
            }
            EngineAction::RequestRange => {
                debug!("requesting temperature range");
                publish(app_state, TOPIC_ASK_TEMP_RANGE, "");
            }
        }
    }
}

/// Drives the relay and returns the state it actually ended up in.
fn switch_relay(hardware: &mut Hardware, on: bool) -> bool {
    match hardware.relay.set(on) {
        Ok(()) => info!("relay switched {}", if on { "ON" } else { "OFF" }),
        Err(err) => warn!("relay switch failed: {err:#}"),
    }
    hardware.relay.is_on()
}

fn publish(app_state: &AppState, suffix: &str, payload: &str) {
    let topic = rooted(&app_state.topic_root, suffix);
    if let Err(err) = app_state
        .mqtt
        .try_publish(topic, QoS::AtLeastOnce, true, payload.to_string())
    {
        warn!("publish to {suffix} dropped: {err}");
    }
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;
    let now_ms = monotonic_ms();

    if topic == rooted(&app_state.topic_root, TOPIC_HOLD_TEMP) {
        let (min, max) = parse_range_override(&message).context("bad hold temperature payload")?;
        let result = {
            let mut engine = app_state.engine.lock().await;
            engine.try_apply_range_update(min, max, now_ms)
        };
        match result {
            Ok(actions) => {
                info!("hold temperature range: ({min} - {max})");
                execute_engine_actions(app_state, actions).await;
            }
            Err(err) => warn!("hold temperature range rejected: {err}"),
        }
        return Ok(());
    }

    if remote_topic(app_state).await.as_deref() == Some(topic.as_str()) {
        let temp = parse_remote_temperature(&message).context("bad remote sensor payload")?;
        let accepted = app_state
            .engine
            .lock()
            .await
            .on_remote_temperature(temp, now_ms);
        if accepted {
            debug!("remote sensor temperature: {temp:.1}");
        }
    }

    Ok(())
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let timezone = state.timezone.lock().await.clone();
    let time_synced = state.time_synced.load(Ordering::Relaxed);
    let relay_on = state.hardware.lock().await.relay.is_on();

    let status = {
        let engine = state.engine.lock().await;
        engine.status(relay_on, time_synced, &timezone)
    };

    Json(status)
}

async fn handle_set_enabled(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(enabled) = parse_flag(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid value. Use 'on' or 'off'");
    };

    let actions = state.engine.lock().await.set_enabled(enabled);
    execute_engine_actions(&state, actions).await;

    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_mode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };

    let cooler = match value.to_ascii_uppercase().as_str() {
        "HEATER" => false,
        "COOLER" => true,
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid mode. Use 'HEATER' or 'COOLER'",
            )
        }
    };

    let actions = state.engine.lock().await.set_cooler_mode(cooler);
    execute_engine_actions(&state, actions).await;

    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_range(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let bound = |name: &str| params.get(name).and_then(|value| value.parse::<i32>().ok());
    let (Some(min), Some(max)) = (bound("min"), bound("max")) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Integer 'min' and 'max' parameters are required",
        );
    };

    let result = {
        let mut engine = state.engine.lock().await;
        engine.try_apply_range_update(min, max, monotonic_ms())
    };
    match result {
        Ok(actions) => execute_engine_actions(&state, actions).await,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }

    handle_get_status(State(state)).await.into_response()
}

async fn handle_put_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> impl IntoResponse {
    let previous_topic = remote_topic(&state).await;

    let result = {
        let mut engine = state.engine.lock().await;
        engine.apply_settings_update(&update)
    };
    let actions = match result {
        Ok(actions) => actions,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    execute_engine_actions(&state, actions).await;

    let current_topic = remote_topic(&state).await;
    if previous_topic != current_topic {
        if let Err(err) = resubscribe_remote(&state, previous_topic, current_topic) {
            warn!("failed to follow remote sensor rename: {err:#}");
        }
    }

    handle_get_status(State(state)).await.into_response()
}

fn resubscribe_remote(
    state: &AppState,
    previous: Option<String>,
    current: Option<String>,
) -> anyhow::Result<()> {
    if let Some(topic) = previous {
        state.mqtt.try_unsubscribe(topic)?;
    }
    if let Some(topic) = current {
        info!("following remote sensor on {topic}");
        state.mqtt.try_subscribe(topic, QoS::AtMostOnce)?;
    }
    Ok(())
}

async fn handle_reset_counters(State(state): State<AppState>) -> impl IntoResponse {
    info!("resetting burn counters");
    let actions = state.engine.lock().await.reset_burn_counters();
    execute_engine_actions(&state, actions).await;
    handle_get_status(State(state)).await.into_response()
}

async fn handle_get_time(State(state): State<AppState>) -> impl IntoResponse {
    let timezone = state.timezone.lock().await.clone();
    Json(TimeStatus {
        time_synced: state.time_synced.load(Ordering::Relaxed),
        timezone,
        now_epoch: Utc::now().timestamp(),
    })
}

async fn handle_put_timezone(
    State(state): State<AppState>,
    Json(update): Json<TimezoneUpdate>,
) -> impl IntoResponse {
    if update.timezone.parse::<Tz>().is_err() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid timezone value");
    }

    {
        let mut timezone = state.timezone.lock().await;
        *timezone = update.timezone;
    }

    if let Err(err) = persist_timezone(&state).await {
        warn!("failed to persist timezone update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }

    handle_get_time(State(state)).await.into_response()
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("THERMOSTAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.thermostat"));
        Self::in_dir(&data_dir)
    }

    fn in_dir(data_dir: &Path) -> Self {
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            settings_path: Arc::new(data_dir.join("settings.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        self.read_runtime_config_locked().await
    }

    /// Read-modify-write of `runtime.json` under a single guard.
    async fn save_timezone(&self, timezone: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut runtime = self.read_runtime_config_locked().await?;
        runtime.timezone = timezone.to_string();
        write_json(self.runtime_path.as_ref(), &runtime).await
    }

    /// Missing keys take their defaults.
    async fn load_settings(&self) -> anyhow::Result<PersistedSettings> {
        let map = {
            let _guard = self.lock.lock().await;
            self.read_settings_map_locked().await?
        };
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    async fn save_setting(&self, setting: &Setting) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_settings_map_locked().await?;
        map.insert(setting.key().to_string(), setting.value());
        write_json(self.settings_path.as_ref(), &map).await
    }

    async fn read_runtime_config_locked(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_settings_map_locked(&self) -> anyhow::Result<Map<String, Value>> {
        match tokio::fs::read(self.settings_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<Map<String, Value>>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(err.into()),
        }
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, payload)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

async fn persist_timezone(state: &AppState) -> anyhow::Result<()> {
    let timezone = state.timezone.lock().await.clone();
    state.store.save_timezone(&timezone).await
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "on" | "true" => Some(true),
        "0" | "off" | "false" => Some(false),
        _ => None,
    }
}

fn now_in_timezone(timezone: &str) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    let tz: Tz = timezone.parse().ok()?;
    let local = Utc::now().with_timezone(&tz);
    Some(local.with_timezone(&local.offset().fix()))
}

fn calendar_in_timezone(timezone: &str) -> Option<CalendarDate> {
    let now = now_in_timezone(timezone)?;
    if now.year() < MIN_SYNCED_YEAR {
        return None;
    }
    Some(CalendarDate {
        day: now.day(),
        month: now.month(),
    })
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use relay_thermostat_common::{RangeBound, TemperatureSource, ThermostatConfig};

    use super::*;
    use crate::hardware::{LocalSensor, NoLocalSensor, Relay, SimulatedRelay};

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn invalid_timezone_means_unsynced() {
        assert_eq!(calendar_in_timezone("Not/AZone"), None);
        assert!(calendar_in_timezone("Europe/Madrid").is_some());
    }

    struct StuckRelay;

    impl Relay for StuckRelay {
        fn set(&mut self, _on: bool) -> anyhow::Result<()> {
            anyhow::bail!("line busy")
        }

        fn is_on(&self) -> bool {
            false
        }
    }

    fn scratch_store(name: &str) -> AppStore {
        let dir = std::env::temp_dir().join(format!(
            "relay-thermostat-host-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        AppStore::in_dir(&dir)
    }

    // The returned event loop is kept alive but never polled, like a broker
    // that cannot be reached.
    fn offline_state(name: &str, relay: Box<dyn Relay>) -> (AppState, rumqttc::EventLoop) {
        let (mqtt, eventloop) =
            AsyncClient::new(MqttOptions::new("relay-thermostat-test", "127.0.0.1", 1), 1);
        let sensor: Box<dyn LocalSensor> = Box::new(NoLocalSensor);
        let state = AppState {
            engine: Arc::new(Mutex::new(ThermostatEngine::new(
                ThermostatConfig::default(),
                PersistedSettings::default(),
            ))),
            hardware: Arc::new(Mutex::new(Hardware { relay, sensor })),
            timezone: Arc::new(Mutex::new("UTC".to_string())),
            time_synced: Arc::new(AtomicBool::new(false)),
            mqtt_connected: Arc::new(AtomicBool::new(false)),
            topic_root: Arc::new("thermostat".to_string()),
            mqtt,
            store: scratch_store(name),
        };
        (state, eventloop)
    }

    #[tokio::test]
    async fn relay_actions_run_while_broker_is_unreachable() {
        let (state, _eventloop) = offline_state("offline", Box::new(SimulatedRelay::default()));
        for _ in 0..8 {
            publish_state(&state).await;
        }

        let finished = tokio::time::timeout(
            Duration::from_secs(3),
            execute_engine_actions(
                &state,
                vec![
                    EngineAction::SetActuator(true),
                    EngineAction::SourceChanged(TemperatureSource::Local),
                    EngineAction::RangeChanged(RangeBound::Min, 17),
                    EngineAction::RequestRange,
                    EngineAction::SetActuator(false),
                ],
            ),
        )
        .await;

        assert!(finished.is_ok());
        assert!(!state.hardware.lock().await.relay.is_on());
    }

    #[test]
    fn failed_switch_reports_realized_state() {
        let mut hardware = Hardware {
            relay: Box::new(StuckRelay),
            sensor: Box::new(NoLocalSensor),
        };
        assert!(!switch_relay(&mut hardware, true));

        let mut hardware = Hardware::from_paths(None, None);
        assert!(switch_relay(&mut hardware, true));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_setting_writes_all_land() {
        let store = scratch_store("concurrent");
        let settings = vec![
            Setting::Enabled(false),
            Setting::CoolerMode(true),
            Setting::RangeMin(16),
            Setting::RangeMax(24),
            Setting::RemoteSensorName("attic".to_string()),
            Setting::RemoteTempMaxWait(90),
            Setting::AloneOnTime(4),
            Setting::AloneOffTime(40),
            Setting::MaxOnTime(20),
            Setting::MinOffTime(8),
            Setting::BurnTotal(300),
            Setting::BurnToday(12),
        ];

        let writers: Vec<_> = settings
            .iter()
            .cloned()
            .map(|setting| {
                let store = store.clone();
                tokio::spawn(async move { store.save_setting(&setting).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let map = {
            let _guard = store.lock.lock().await;
            store.read_settings_map_locked().await.unwrap()
        };
        assert_eq!(map.len(), settings.len());

        let loaded = store.load_settings().await.unwrap();
        assert!(loaded.cooler_mode);
        assert_eq!(loaded.remote_sensor_name, "attic");
        assert_eq!(loaded.burn.today, 12);
    }

    #[tokio::test]
    async fn timezone_update_keeps_other_runtime_fields() {
        let store = scratch_store("timezone");

        store.save_timezone("Europe/Madrid").await.unwrap();

        let runtime = store.load_runtime_config().await.unwrap();
        assert_eq!(runtime.timezone, "Europe/Madrid");
        assert_eq!(runtime.topic_root, RuntimeConfig::default().topic_root);
    }
}
