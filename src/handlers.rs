use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sign_types::{MatchMode, QueueItem};
use thiserror::Error;

use crate::playback::Snapshot;
use crate::session::Session;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
}

#[derive(Deserialize)]
pub struct TextBody {
    pub text: String,
}

#[derive(Deserialize)]
pub struct ModeBody {
    pub mode: String,
}

#[derive(Deserialize)]
pub struct SpeedBody {
    pub rate: f32,
}

#[derive(Deserialize)]
pub struct IdleLoopBody {
    pub enabled: bool,
}

#[derive(Deserialize)]
pub struct SegmentQuery {
    pub text: String,
    pub mode: Option<String>,
}

#[derive(Serialize)]
pub struct SegmentResponse {
    text: String,
    mode: MatchMode,
    total: usize,
    items: Vec<QueueItem>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/snapshot", get(snapshot))
        .route("/v1/segment", get(segment))
        .route("/v1/text", post(set_text))
        .route("/v1/mode", post(set_mode))
        .route("/v1/speed", post(set_speed))
        .route("/v1/idle-loop", post(set_idle_loop))
        .route("/v1/dictionary/load", post(load_dictionary))
        .route("/v1/play", post(play))
        .route("/v1/pause", post(pause))
        .route("/v1/stop", post(stop))
        .route("/v1/prev", post(step_prev))
        .route("/v1/next", post(step_next))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn snapshot(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.session.snapshot().await)
}

async fn segment(
    State(state): State<AppState>,
    Query(params): Query<SegmentQuery>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let mode = match params.mode.as_deref() {
        Some(raw) => parse_mode(raw)?,
        None => state.session.mode().await,
    };
    let items = state.session.preview(&params.text, Some(mode)).await;
    Ok(Json(SegmentResponse {
        text: params.text,
        mode,
        total: items.len(),
        items,
    }))
}

async fn set_text(State(state): State<AppState>, Json(body): Json<TextBody>) -> Json<Snapshot> {
    Json(state.session.set_text(body.text).await)
}

async fn set_mode(
    State(state): State<AppState>,
    Json(body): Json<ModeBody>,
) -> Result<Json<Snapshot>, ApiError> {
    let mode = parse_mode(&body.mode)?;
    Ok(Json(state.session.set_mode(mode).await))
}

async fn set_speed(
    State(state): State<AppState>,
    Json(body): Json<SpeedBody>,
) -> Result<Json<Snapshot>, ApiError> {
    let snapshot = state
        .session
        .set_speed(body.rate)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(snapshot))
}

async fn set_idle_loop(
    State(state): State<AppState>,
    Json(body): Json<IdleLoopBody>,
) -> Json<Snapshot> {
    Json(state.session.set_idle_loop(body.enabled).await)
}

async fn load_dictionary(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.session.load_dictionary().await)
}

async fn play(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.session.play().await)
}

async fn pause(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.session.pause().await)
}

async fn stop(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.session.stop().await)
}

async fn step_prev(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.session.step_prev().await)
}

async fn step_next(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.session.step_next().await)
}

fn parse_mode(raw: &str) -> Result<MatchMode, ApiError> {
    MatchMode::from_name(raw).ok_or_else(|| {
        ApiError::bad_request(format!(
            "invalid mode {raw:?}, expected dictionary or letters_only"
        ))
    })
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
        }
    }
}
