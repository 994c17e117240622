use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::pipeline::run_predict_cycle;
use super::types::{
    ClearResponse, HealthResponse, PredictRequest, PredictResponse, ResetResponse,
    SessionEndResponse, StatusResponse, WordResponse,
};
use super::{AppContext, ApiError};
use crate::session::{Session, SessionError, SessionId};

/// Header carrying the caller's session id
pub const SESSION_HEADER: &str = "x-session-id";

type Ctx = State<Arc<AppContext>>;

fn session_id(headers: &HeaderMap) -> Result<SessionId, ApiError> {
    let Some(value) = headers.get(SESSION_HEADER) else {
        return Ok(SessionId::default());
    };
    let raw = value
        .to_str()
        .map_err(|_| SessionError::InvalidId(String::from_utf8_lossy(value.as_bytes()).into()))?;
    Ok(SessionId::parse(raw)?)
}

async fn session(ctx: &AppContext, headers: &HeaderMap) -> Result<Arc<Session>, ApiError> {
    let id = session_id(headers)?;
    Ok(ctx.sessions().get_or_create(&id).await?)
}

pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// GET and HEAD; empty 503 until vision is installed and after shutdown begins
pub async fn health(State(ctx): Ctx) -> Response {
    if !ctx.state().is_ready() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(HealthResponse {
        status: "healthy".into(),
        models_loaded: true,
    })
    .into_response()
}

pub async fn predict(
    State(ctx): Ctx,
    headers: HeaderMap,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let vision = Arc::clone(ctx.vision()?);
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let session = session(&ctx, &headers).await?;
    let clock = Arc::clone(ctx.sessions().clock());

    let outcome = tokio::task::spawn_blocking(move || {
        run_predict_cycle(&vision, &session, clock.as_ref(), &request.image)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("predict worker failed: {}", e)))??;

    if let Some(letter) = outcome.letter_added {
        debug!(letter = %letter, word = %outcome.snapshot.composed_word, "letter added");
    }
    Ok(Json(PredictResponse::from(outcome)))
}

pub async fn add_space(State(ctx): Ctx, headers: HeaderMap) -> Result<Json<WordResponse>, ApiError> {
    let session = session(&ctx, &headers).await?;
    let mut composer = session.composer().lock().await;
    composer.add_space();
    Ok(Json(WordResponse {
        success: true,
        current_word: composer.word().to_string(),
    }))
}

pub async fn delete_last(
    State(ctx): Ctx,
    headers: HeaderMap,
) -> Result<Json<WordResponse>, ApiError> {
    let session = session(&ctx, &headers).await?;
    let mut composer = session.composer().lock().await;
    composer.delete_last_character();
    Ok(Json(WordResponse {
        success: true,
        current_word: composer.word().to_string(),
    }))
}

pub async fn clear_word(
    State(ctx): Ctx,
    headers: HeaderMap,
) -> Result<Json<ClearResponse>, ApiError> {
    let session = session(&ctx, &headers).await?;
    let previous_word = session.composer().lock().await.clear_word();
    Ok(Json(ClearResponse {
        success: true,
        previous_word,
        current_word: String::new(),
    }))
}

pub async fn reset(State(ctx): Ctx, headers: HeaderMap) -> Result<Json<ResetResponse>, ApiError> {
    let session = session(&ctx, &headers).await?;
    let mut composer = session.composer().lock().await;
    composer.reset(ctx.sessions().now());
    Ok(Json(ResetResponse { success: true }))
}

pub async fn get_word(State(ctx): Ctx, headers: HeaderMap) -> Result<Json<WordResponse>, ApiError> {
    let session = session(&ctx, &headers).await?;
    let composer = session.composer().lock().await;
    Ok(Json(WordResponse {
        success: true,
        current_word: composer.word().to_string(),
    }))
}

pub async fn end_session(
    State(ctx): Ctx,
    headers: HeaderMap,
) -> Result<Json<SessionEndResponse>, ApiError> {
    let id = session_id(&headers)?;
    let ended = ctx.sessions().end(&id).await;
    Ok(Json(SessionEndResponse {
        success: true,
        ended,
    }))
}
