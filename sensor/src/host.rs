use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{debug, info, warn};

use relay_thermostat_common::{
    payload::remote_temperature_payload, remote_sensor_topic, rooted, TOPIC_SENSOR_STATUS,
};

const DEFAULT_PUBLISH_INTERVAL_SECS: u64 = 30;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let sensor_name = std::env::var("SENSOR_NAME").unwrap_or_else(|_| "sensor".to_string());
    let reading_path = std::env::var("SENSOR_PATH").ok();
    let publish_every = std::env::var("SENSOR_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_PUBLISH_INTERVAL_SECS);

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mut mqtt_options = MqttOptions::new(
        format!("relay-thermostat-sensor-{sensor_name}"),
        mqtt_host,
        mqtt_port,
    );

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    mqtt.publish(
        rooted(&sensor_name, TOPIC_SENSOR_STATUS),
        QoS::AtLeastOnce,
        true,
        "online",
    )
    .await
    .context("failed to publish sensor online status")?;

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    let data_topic = remote_sensor_topic(&sensor_name);
    info!("sensor publisher started on {data_topic}");

    let mut tick: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_secs(publish_every));

    loop {
        interval.tick().await;
        tick = tick.saturating_add(1);

        let celsius = match reading_path.as_deref() {
            Some(path) => match read_celsius(path) {
                Some(value) => value,
                None => {
                    debug!("no reading available from {path}");
                    continue;
                }
            },
            None => simulated_celsius(tick),
        };

        mqtt.publish(
            data_topic.clone(),
            QoS::AtLeastOnce,
            false,
            remote_temperature_payload(celsius),
        )
        .await
        .context("failed to publish sensor temperature")?;
    }
}

fn read_celsius(path: &str) -> Option<f32> {
    let raw = std::fs::read_to_string(path).ok()?;
    raw.trim().parse::<f32>().ok().filter(|value| value.is_finite())
}

/// Slow sawtooth around room temperature so a controller without hardware
/// still sees both crossings.
fn simulated_celsius(tick: u64) -> f32 {
    17.0 + (tick % 12) as f32 * 0.5
}
