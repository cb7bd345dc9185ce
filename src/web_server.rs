// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/web_server.rs
// Version: 1.0.0
//
// This file implements the REST surface and WebSocket endpoint for the
// real-time mining dashboard, plus the 1 Hz statistics broadcast loop. All
// responses are JSON and CORS is permissive so a browser UI can be served
// from anywhere.
//
// Tree Location:
// - src/web_server.rs (dashboard API and stats loop)
// - Depends on: axum, tower-http, serde_json, coordinator, miner, stats

use crate::config::ConfigHandle;
use crate::coordinator::Coordinator;
use crate::error::Error;
use crate::miner::{Worker, WorkerManager};
use crate::stats::Collector;
use crate::stratum::StratumClient;
use crate::ws_hub::{WsHub, MAX_CLIENT_FRAME};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

const LOG_TARGET: &str = "soloforge::web";

/// Save the stats snapshot every this many 1 Hz ticks
const SAVE_EVERY_TICKS: u64 = 60;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigHandle,
    pub stratum: Arc<StratumClient>,
    pub pool: Arc<WorkerManager>,
    pub stats: Arc<Collector>,
    pub hub: Arc<WsHub>,
    pub coordinator: Arc<Coordinator>,
}

/// Build the dashboard router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/stats", get(handle_stats))
        .route("/history", get(handle_history))
        .route("/sessions", get(handle_sessions))
        .route("/workers", get(handle_workers).post(handle_worker_create))
        .route(
            "/workers/{id}",
            get(handle_worker_get).delete(handle_worker_delete),
        )
        .route("/config", get(handle_config_get).put(handle_config_put))
        .route("/mining/start", post(handle_mining_start))
        .route("/mining/stop", post(handle_mining_stop))
        .route("/ws", get(handle_ws))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the 1 Hz loop that snapshots the worker pool into the collector,
/// pushes stats to WebSocket clients and periodically persists.
pub fn start_stats_loop(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        let mut ticks = 0u64;
        loop {
            interval.tick().await;
            ticks += 1;

            state.stats.update_hashes(state.pool.total_hash_count());
            state
                .hub
                .broadcast_event("stats", build_stats_payload(&state));

            if ticks % SAVE_EVERY_TICKS == 0 {
                if let Err(e) = state.stats.save() {
                    warn!(target: LOG_TARGET, "Failed to save statistics: {}", e);
                }
            }
        }
    });
}

fn worker_json(worker: &Worker) -> Value {
    json!({
        "id": worker.id,
        "name": worker.name,
        "running": worker.is_running(),
        "hashrate": worker.hashrate(),
        "hashCount": worker.hash_count(),
    })
}

fn build_stats_payload(state: &AppState) -> Value {
    let snapshot = state.stats.snapshot();
    let workers: Vec<Value> = state
        .pool
        .workers()
        .iter()
        .map(|w| worker_json(w))
        .collect();

    json!({
        "hashrate": state.pool.total_hashrate(),
        "total_hashes": snapshot.total_hashes,
        "total_shares": snapshot.total_shares,
        "accepted_shares": snapshot.accepted_shares,
        "best_difficulty": snapshot.best_difficulty,
        "uptime_seconds": snapshot.uptime_seconds,
        "workers": workers,
        "connected": state.stratum.is_connected(),
        "authorized": state.stratum.is_authorized(),
    })
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("{} not found", what) })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn handle_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "running": state.pool.worker_count() > 0,
        "connected": state.stratum.is_connected(),
        "authorized": state.stratum.is_authorized(),
        "worker_count": state.pool.worker_count(),
        "pool_url": state.config.pool_url(),
        "pool_port": state.config.pool_port(),
    }))
}

async fn handle_stats(State(state): State<AppState>) -> Json<Value> {
    Json(build_stats_payload(&state))
}

async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Value> {
    let limit = query.limit.unwrap_or(100);
    Json(json!({
        "shares": state.stats.share_history(limit),
        "blocks": state.stats.block_history(limit),
    }))
}

async fn handle_sessions(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Value> {
    let limit = query.limit.unwrap_or(50);
    Json(json!(state.stats.session_history(limit)))
}

async fn handle_workers(State(state): State<AppState>) -> Json<Value> {
    let workers: Vec<Value> = state
        .pool
        .workers()
        .iter()
        .map(|w| worker_json(w))
        .collect();
    Json(json!(workers))
}

async fn handle_worker_create(State(state): State<AppState>, body: String) -> Json<Value> {
    #[derive(Deserialize, Default)]
    struct CreateRequest {
        #[serde(default)]
        name: String,
    }
    // A missing or malformed body just gets a default-named worker
    let name = serde_json::from_str::<CreateRequest>(&body)
        .unwrap_or_default()
        .name;

    let id = state.pool.add_worker(&name);
    let worker = state.pool.get_worker(id);

    // Hand the new worker the current job right away
    if let (Some(worker), Some(job)) = (&worker, state.stratum.current_job()) {
        worker.update_job(job);
    }

    Json(json!({
        "id": id,
        "name": worker.map(|w| w.name.clone()).unwrap_or_default(),
    }))
}

async fn handle_worker_get(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
    match state.pool.get_worker(id) {
        Some(worker) => Json(worker_json(&worker)).into_response(),
        None => not_found("worker"),
    }
}

async fn handle_worker_delete(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
    if state.pool.remove_worker(id) {
        Json(json!({ "status": "deleted" })).into_response()
    } else {
        not_found("worker")
    }
}

async fn handle_config_get(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.config.snapshot()))
}

async fn handle_config_put(State(state): State<AppState>, body: String) -> Response {
    let updates: Value = match serde_json::from_str(&body) {
        Ok(updates) => updates,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid JSON" })),
            )
                .into_response();
        }
    };

    if let Err(e) = state.config.update(&updates) {
        error!(target: LOG_TARGET, "Config update failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    // CPU throttle applies to running workers immediately
    if updates.get("max_cpu_percent").is_some() {
        state.pool.set_cpu_percent(state.config.max_cpu_percent());
    }

    Json(json!({ "status": "updated" })).into_response()
}

async fn handle_mining_start(State(state): State<AppState>) -> Json<Value> {
    match state.coordinator.start_mining().await {
        Ok(()) => Json(json!({ "status": "started" })),
        Err(e) => {
            let message = match &e {
                Error::Config(msg) => msg.clone(),
                other => other.to_string(),
            };
            error!(target: LOG_TARGET, "Mining start failed: {}", message);
            Json(json!({ "status": "error", "error": message }))
        }
    }
}

async fn handle_mining_stop(State(state): State<AppState>) -> Json<Value> {
    state.coordinator.stop_mining().await;
    Json(json!({ "status": "stopped" }))
}

async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    debug!(target: LOG_TARGET, "🔌 WebSocket connection request received");
    let hub = state.hub.clone();
    ws.max_frame_size(MAX_CLIENT_FRAME)
        .max_message_size(MAX_CLIENT_FRAME)
        .on_upgrade(move |socket| hub.handle_socket(socket))
}
