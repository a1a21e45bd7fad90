//! HTTP control surface for the captioning agent.
//!
//! Exposes `/health`, `/start`, `/stop`, and `/sessions` on top of the
//! [`SessionManager`]. Start and stop are idempotent; bad input gets a
//! structured 400, a failed room join a 500.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::session::{SessionManager, StartOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub target_language: Option<String>,
    #[serde(default)]
    pub stt_language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRequest {
    #[serde(default)]
    pub room_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub fn router(manager: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/sessions", get(sessions))
        .with_state(manager)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

async fn start(
    State(manager): State<Arc<SessionManager>>,
    Json(req): Json<StartRequest>,
) -> Response {
    let Some(room_name) = req.room_name.filter(|r| !r.trim().is_empty()) else {
        return bad_request("roomName is required");
    };

    match manager
        .start(&room_name, req.target_language, req.stt_language)
        .await
    {
        Ok(StartOutcome::Started) => Json(serde_json::json!({
            "status": "started",
            "roomName": room_name,
        }))
        .into_response(),
        Ok(StartOutcome::AlreadyRunning) => Json(serde_json::json!({
            "status": "already_running",
            "roomName": room_name,
        }))
        .into_response(),
        Err(e) => {
            error!("failed to start captioning for {}: {:#}", room_name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: format!("{:#}", e),
                }),
            )
                .into_response()
        }
    }
}

async fn stop(
    State(manager): State<Arc<SessionManager>>,
    Json(req): Json<StopRequest>,
) -> Response {
    let Some(room_name) = req.room_name.filter(|r| !r.trim().is_empty()) else {
        return bad_request("roomName is required");
    };

    let status = if manager.stop(&room_name).await {
        "stopped"
    } else {
        "not_running"
    };
    Json(serde_json::json!({
        "status": status,
        "roomName": room_name,
    }))
    .into_response()
}

async fn sessions(State(manager): State<Arc<SessionManager>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "activeRooms": manager.active_rooms().await,
    }))
}

/// Serve the control surface until Ctrl-C, then stop every active session
/// (flushing open sentences) before returning.
pub async fn serve(addr: SocketAddr, manager: Arc<SessionManager>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("control surface listening on {}", addr);

    let shutdown_manager = manager.clone();
    axum::serve(listener, router(manager))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, stopping active sessions");
            shutdown_manager.shutdown().await;
        })
        .await
        .context("control surface server failed")?;

    Ok(())
}
