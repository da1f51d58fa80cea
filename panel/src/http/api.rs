use alloc::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    app::{AppState, StartOutcome},
    container::{Ack, ContainerState},
    http::error::ApiError,
    session::{ConnectionConfig, SessionStatus},
    status::Overview,
};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/container", get(get_container))
        .route("/container/{action}", post(handle_container_action))
        .route("/session/connect", post(handle_connect))
        .route("/session/disconnect", post(handle_disconnect))
        .route("/query", post(handle_query))
        .route("/settings", get(get_settings).put(put_settings))
}

/// Lifecycle action for the container endpoint.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ContainerAction {
    Start,
    Stop,
    Restart,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ActionResponse {
    Started(StartOutcome),
    Done(Ack),
}

#[derive(Serialize)]
struct ContainerView {
    container: String,
    state: ContainerState,
}

#[derive(Serialize)]
struct SessionView {
    status: SessionStatus,
}

#[derive(Serialize)]
struct QueryView {
    elapsed_ms: f64,
    result: Value,
}

/// Connection settings as shown to clients. The password is never sent out.
#[derive(Serialize)]
struct SettingsView {
    host: String,
    port: u16,
    username: String,
    namespace: String,
    database: String,
    auto_connect: bool,
    strict_mode: bool,
}

impl From<ConnectionConfig> for SettingsView {
    fn from(config: ConnectionConfig) -> Self {
        Self {
            host: config.host,
            port: config.port,
            username: config.username,
            namespace: config.namespace,
            database: config.database,
            auto_connect: config.auto_connect,
            strict_mode: config.strict_mode,
        }
    }
}

/// Settings update. Omitted password and flags keep their stored values.
#[derive(Deserialize)]
struct SettingsBody {
    host: String,
    port: u16,
    username: String,
    #[serde(default)]
    password: Option<SecretString>,
    namespace: String,
    database: String,
    #[serde(default)]
    auto_connect: Option<bool>,
    #[serde(default)]
    strict_mode: Option<bool>,
}

async fn get_status(State(state): State<AppState>) -> Json<Overview> {
    Json(state.panel.status().await)
}

async fn get_container(State(state): State<AppState>) -> Json<ContainerView> {
    Json(ContainerView {
        container: state.panel.container_name().to_string(),
        state: state.panel.inspect().await,
    })
}

#[axum::debug_handler]
async fn handle_container_action(
    Path(action): Path<ContainerAction>,
    State(state): State<AppState>,
) -> Result<Json<ActionResponse>, ApiError> {
    info!(?action, "Container action requested");
    let response = match action {
        ContainerAction::Start => ActionResponse::Started(state.panel.start().await?),
        ContainerAction::Stop => ActionResponse::Done(state.panel.stop().await?),
        ContainerAction::Restart => ActionResponse::Done(state.panel.restart().await?),
    };
    Ok(Json(response))
}

async fn handle_connect(State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let session = state.panel.connect().await?;
    Ok(Json(SessionView {
        status: session.status(),
    }))
}

async fn handle_disconnect(State(state): State<AppState>) -> Json<SessionView> {
    state.panel.disconnect().await;
    Json(SessionView {
        status: SessionStatus::Disconnected,
    })
}

async fn handle_query(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<QueryView>, ApiError> {
    let result = state.panel.execute_query(&body).await?;
    Ok(Json(QueryView {
        elapsed_ms: result.elapsed.as_secs_f64() * 1000.0,
        result: result.payload,
    }))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsView>, ApiError> {
    Ok(Json(state.panel.settings().await?.into()))
}

async fn put_settings(
    State(state): State<AppState>,
    Json(body): Json<SettingsBody>,
) -> Result<Json<Value>, ApiError> {
    let complete =
        body.password.is_some() && body.auto_connect.is_some() && body.strict_mode.is_some();
    let stored = if complete {
        ConnectionConfig::default()
    } else {
        state.panel.settings().await?
    };
    let config = ConnectionConfig {
        host: body.host,
        port: body.port,
        username: body.username,
        password: body.password.map_or(stored.password, Arc::new),
        namespace: body.namespace,
        database: body.database,
        auto_connect: body.auto_connect.unwrap_or(stored.auto_connect),
        strict_mode: body.strict_mode.unwrap_or(stored.strict_mode),
    };
    let disconnected = state.panel.save_settings(&config).await?;
    Ok(Json(json!({ "saved": true, "disconnected": disconnected })))
}
