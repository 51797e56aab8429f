use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{error, info, warn};

use aircon_common::{
    AcMode, AccessoryInfo, AccessoryStatus, AppliedState, ClimateController, ControllerError,
    Intent, ModeBounds, RuntimeConfig, TargetMode, TemperatureBounds, TOPIC_CMD_ACTIVE,
    TOPIC_CMD_COOLING_THRESHOLD, TOPIC_CMD_HEATING_THRESHOLD, TOPIC_CMD_MODE,
    TOPIC_CONTROLLER_STATE,
};

use crate::irsend::{IrDiagnostics, IrSendTransmitter};

type SharedController = Arc<Mutex<ClimateController<IrSendTransmitter>>>;

#[derive(Clone)]
struct AppState {
    controller: SharedController,
    accessory: Arc<AccessoryInfo>,
    mqtt: AsyncClient,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct RangeView {
    #[serde(rename = "minValue")]
    min_value: i32,
    #[serde(rename = "maxValue")]
    max_value: i32,
    #[serde(rename = "minStep")]
    min_step: i32,
}

#[derive(Debug, Serialize)]
struct AccessoryView {
    name: String,
    manufacturer: String,
    model: String,
    #[serde(rename = "targetHeaterCoolerState")]
    target_heater_cooler_state: RangeView,
    #[serde(rename = "heatingThresholdTemperature")]
    heating_threshold_temperature: RangeView,
    #[serde(rename = "coolingThresholdTemperature")]
    cooling_threshold_temperature: RangeView,
}

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = config_path();
    let mut runtime = load_runtime_config(&config_path).await.unwrap_or_else(|err| {
        warn!(
            "failed to load runtime config from {}: {err:#}",
            config_path.display()
        );
        RuntimeConfig::default()
    });
    runtime.sanitize();

    let transmitter = if env_flag("AIRCON_IR_DRY_RUN") {
        warn!("AIRCON_IR_DRY_RUN set, IR commands will be logged and dropped");
        IrSendTransmitter::disabled(runtime.ir.clone())
    } else {
        let (transmitter, _worker) = IrSendTransmitter::spawn(runtime.ir.clone());
        transmitter
    };
    let controller = ClimateController::new(runtime.climate.clone(), transmitter);

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("aircon-controller-rust", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        controller: Arc::new(Mutex::new(controller)),
        accessory: Arc::new(runtime.accessory.clone()),
        mqtt,
    };

    subscribe_topics(&app_state.mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_state_publish_loop(app_state.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/accessory", get(handle_get_accessory))
        .route("/api/active", post(handle_set_active))
        .route("/api/mode", post(handle_set_mode))
        .route("/api/threshold/heating", post(handle_set_heating_threshold))
        .route("/api/threshold/cooling", post(handle_set_cooling_threshold))
        .route("/api/ir/diagnostics", get(handle_get_ir_diagnostics))
        .route("/api/identify", post(handle_identify))
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!(
        "{} listening on http://{addr}",
        runtime.accessory.name
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    let topics = [
        TOPIC_CMD_ACTIVE,
        TOPIC_CMD_MODE,
        TOPIC_CMD_HEATING_THRESHOLD,
        TOPIC_CMD_COOLING_THRESHOLD,
    ];

    for topic in topics {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, &message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            publish_state(&app_state).await;
        }
    });
}

async fn publish_state(app_state: &AppState) {
    let payload = {
        let controller = app_state.controller.lock().await;
        serde_json::to_vec(&controller.state_payload())
    };

    match payload {
        Ok(body) => {
            if let Err(err) = app_state
                .mqtt
                .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                .await
            {
                warn!("controller state publish failed: {err}");
            }
        }
        Err(err) => warn!("controller state serialization failed: {err}"),
    }
}

/// Runs one intent under the controller lock so clamp, encode, transmit and
/// commit cannot interleave with another caller.
async fn apply_intent(
    app_state: &AppState,
    intent: Intent,
) -> Result<AppliedState, ControllerError> {
    let applied = {
        let mut controller = app_state.controller.lock().await;
        controller.apply(intent)
    };

    match &applied {
        Ok(applied) => {
            log_applied(intent, applied);
            publish_state(app_state).await;
        }
        Err(err) => error!("failed to apply {intent:?}: {err}"),
    }
    applied
}

fn log_applied(intent: Intent, applied: &AppliedState) {
    match (intent, applied) {
        (_, AppliedState::Active(active)) => {
            info!("Active SET: {}", if *active { "ON" } else { "OFF" });
        }
        (
            Intent::SetMode(requested),
            AppliedState::Mode {
                mode,
                target_temperature,
            },
        ) => {
            info!(
                "TargetHeaterCoolerState SET: {} -> {} at {target_temperature}",
                requested.as_str(),
                mode.as_str()
            );
        }
        (Intent::SetTargetTemperature(mode, requested), AppliedState::TargetTemperature(applied)) => {
            info!(
                "{} SET: {requested} -> {applied}",
                threshold_characteristic(mode)
            );
        }
        (intent, applied) => info!("{intent:?} applied as {applied:?}"),
    }
}

fn threshold_characteristic(mode: AcMode) -> &'static str {
    match mode {
        AcMode::Heat => "HeatingThresholdTemperature",
        AcMode::Cool => "CoolingThresholdTemperature",
    }
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: &str,
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

    let Some(intent) = intent_from_mqtt(topic, &message) else {
        warn!("ignoring payload {message:?} on topic {topic}");
        return Ok(());
    };

    apply_intent(app_state, intent)
        .await
        .with_context(|| format!("failed to apply command from {topic}"))?;
    Ok(())
}

fn intent_from_mqtt(topic: &str, message: &str) -> Option<Intent> {
    match topic {
        TOPIC_CMD_ACTIVE => parse_active(message).map(|active| {
            if active {
                Intent::PowerOn
            } else {
                Intent::PowerOff
            }
        }),
        TOPIC_CMD_MODE => parse_selectable_mode(message).map(Intent::SetMode),
        TOPIC_CMD_HEATING_THRESHOLD => parse_temperature(message)
            .map(|temperature| Intent::SetTargetTemperature(AcMode::Heat, temperature)),
        TOPIC_CMD_COOLING_THRESHOLD => parse_temperature(message)
            .map(|temperature| Intent::SetTargetTemperature(AcMode::Cool, temperature)),
        _ => None,
    }
}

fn parse_active(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Some(true),
        "off" | "0" | "false" => Some(false),
        _ => None,
    }
}

/// Only modes inside the advertised range are accepted; `AUTO` is refused here.
fn parse_selectable_mode(value: &str) -> Option<TargetMode> {
    TargetMode::parse(value).filter(|mode| {
        (TargetMode::MIN_SELECTABLE_CODE..=TargetMode::MAX_SELECTABLE_CODE).contains(&mode.code())
    })
}

/// Any number is accepted; values beyond `i32` saturate and are clamped later
/// by the controller. Only non-numeric payloads and NaN are refused.
fn parse_temperature(value: &str) -> Option<i32> {
    let value = value.trim();
    if let Ok(temperature) = value.parse::<i32>() {
        return Some(temperature);
    }
    let temperature = value.parse::<f64>().ok().filter(|t| !t.is_nan())?;
    // Float-to-int `as` saturates at the i32 limits.
    Some(temperature.round() as i32)
}

async fn current_status(state: &AppState) -> AccessoryStatus {
    let controller = state.controller.lock().await;
    controller.status(&state.accessory)
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = current_status(&state).await;
    info!(
        "Active GET: {}",
        if status.active { "ON" } else { "OFF" }
    );
    Json(status)
}

async fn handle_get_accessory(State(state): State<AppState>) -> impl IntoResponse {
    let bounds = *state.controller.lock().await.bounds();
    Json(build_accessory_view(&state.accessory, &bounds))
}

async fn handle_set_active(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(active) = parse_active(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid value. Use 'on' or 'off'");
    };

    let intent = if active {
        Intent::PowerOn
    } else {
        Intent::PowerOff
    };
    apply_and_respond(state, intent).await
}

async fn handle_set_mode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(mode) = parse_selectable_mode(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid mode. Use 'HEAT' or 'COOL'");
    };

    apply_and_respond(state, Intent::SetMode(mode)).await
}

async fn handle_set_heating_threshold(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    set_threshold(state, AcMode::Heat, &params).await
}

async fn handle_set_cooling_threshold(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    set_threshold(state, AcMode::Cool, &params).await
}

async fn set_threshold(
    state: AppState,
    mode: AcMode,
    params: &HashMap<String, String>,
) -> axum::response::Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(temperature) = parse_temperature(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature value");
    };

    apply_and_respond(state, Intent::SetTargetTemperature(mode, temperature)).await
}

async fn apply_and_respond(state: AppState, intent: Intent) -> axum::response::Response {
    if let Err(err) = apply_intent(&state, intent).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
    }
    Json(current_status(&state).await).into_response()
}

async fn handle_get_ir_diagnostics(State(state): State<AppState>) -> impl IntoResponse {
    let diagnostics: IrDiagnostics = state.controller.lock().await.transmitter().diagnostics();
    Json(diagnostics)
}

async fn handle_identify(State(state): State<AppState>) -> impl IntoResponse {
    info!("Identify! ({})", state.accessory.name);
    StatusCode::NO_CONTENT
}

fn config_path() -> PathBuf {
    std::env::var("AIRCON_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.aircon"))
        .join("runtime.json")
}

async fn load_runtime_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| parse_active(&value).unwrap_or(false))
        .unwrap_or(false)
}

fn build_accessory_view(info: &AccessoryInfo, bounds: &ModeBounds) -> AccessoryView {
    AccessoryView {
        name: info.name.clone(),
        manufacturer: info.manufacturer.clone(),
        model: info.model.clone(),
        target_heater_cooler_state: RangeView {
            min_value: i32::from(TargetMode::MIN_SELECTABLE_CODE),
            max_value: i32::from(TargetMode::MAX_SELECTABLE_CODE),
            min_step: 1,
        },
        heating_threshold_temperature: threshold_range(bounds.heat),
        cooling_threshold_temperature: threshold_range(bounds.cool),
    }
}

fn threshold_range(bounds: TemperatureBounds) -> RangeView {
    RangeView {
        min_value: bounds.min,
        max_value: bounds.max,
        min_step: 1,
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_is_refused_at_the_boundary() {
        assert_eq!(parse_selectable_mode("AUTO"), None);
        assert_eq!(parse_selectable_mode("0"), None);
        assert_eq!(parse_selectable_mode("heat"), Some(TargetMode::Heat));
        assert_eq!(parse_selectable_mode("2"), Some(TargetMode::Cool));
        assert_eq!(parse_selectable_mode("dry"), None);
    }

    #[test]
    fn temperatures_accept_integer_and_decimal_payloads() {
        assert_eq!(parse_temperature("21"), Some(21));
        assert_eq!(parse_temperature(" 22.6 "), Some(23));
        assert_eq!(parse_temperature("-3"), Some(-3));
        assert_eq!(parse_temperature("NaN"), None);
        assert_eq!(parse_temperature("warm"), None);
        assert_eq!(parse_temperature(""), None);
    }

    #[test]
    fn out_of_range_temperatures_saturate_instead_of_failing() {
        assert_eq!(parse_temperature("99999999999"), Some(i32::MAX));
        assert_eq!(parse_temperature("-99999999999"), Some(i32::MIN));
        assert_eq!(parse_temperature("1e12"), Some(i32::MAX));
        assert_eq!(parse_temperature("-1e12"), Some(i32::MIN));
        assert_eq!(parse_temperature("inf"), Some(i32::MAX));

        assert_eq!(
            intent_from_mqtt(TOPIC_CMD_COOLING_THRESHOLD, "99999999999"),
            Some(Intent::SetTargetTemperature(AcMode::Cool, i32::MAX))
        );
    }

    #[test]
    fn mqtt_topics_map_to_intents() {
        assert_eq!(
            intent_from_mqtt(TOPIC_CMD_ACTIVE, "ON"),
            Some(Intent::PowerOn)
        );
        assert_eq!(
            intent_from_mqtt(TOPIC_CMD_ACTIVE, "0"),
            Some(Intent::PowerOff)
        );
        assert_eq!(
            intent_from_mqtt(TOPIC_CMD_MODE, "cool"),
            Some(Intent::SetMode(TargetMode::Cool))
        );
        assert_eq!(intent_from_mqtt(TOPIC_CMD_MODE, "auto"), None);
        assert_eq!(
            intent_from_mqtt(TOPIC_CMD_HEATING_THRESHOLD, "25"),
            Some(Intent::SetTargetTemperature(AcMode::Heat, 25))
        );
        assert_eq!(
            intent_from_mqtt(TOPIC_CMD_COOLING_THRESHOLD, "18"),
            Some(Intent::SetTargetTemperature(AcMode::Cool, 18))
        );
        assert_eq!(intent_from_mqtt("aircon/cmnd/fan", "HIGH"), None);
    }

    #[test]
    fn accessory_view_advertises_configured_ranges() {
        let view = build_accessory_view(&AccessoryInfo::default(), &ModeBounds::default());

        assert_eq!(view.target_heater_cooler_state.min_value, 1);
        assert_eq!(view.target_heater_cooler_state.max_value, 2);
        assert_eq!(view.heating_threshold_temperature.min_value, 23);
        assert_eq!(view.heating_threshold_temperature.max_value, 23);
        assert_eq!(view.cooling_threshold_temperature.min_value, 19);
        assert_eq!(view.cooling_threshold_temperature.max_value, 23);
    }

    #[tokio::test]
    async fn missing_config_file_yields_defaults() {
        let path = std::env::temp_dir().join("aircon-controller-missing/runtime.json");
        let runtime = load_runtime_config(&path).await.unwrap();

        assert_eq!(runtime.climate, aircon_common::ClimateConfig::default());
        assert_eq!(runtime.ir.device, "ac");
    }
}
