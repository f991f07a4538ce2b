// crates/makerboard/src/api/live.rs
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tokio::sync::broadcast;

use crate::api::models::{LiveFrame, LiveListing};
use crate::api::{ApiError, ApiState};
use crate::jobs::{Job, JobFilter};
use crate::offers::Offer;
use crate::sync::{LiveMarket, Notice};

fn live(state: &ApiState) -> Result<Arc<LiveMarket>, ApiError> {
    state.live.clone().ok_or(ApiError::LiveDisabled)
}

pub async fn live_jobs(State(state): State<ApiState>) -> Result<Json<LiveListing<Job>>, ApiError> {
    let snap = live(&state)?.snapshot().await;
    Ok(Json(LiveListing {
        items: snap.jobs,
        filter: snap.filter,
        source: snap.source,
        degraded: snap.degraded,
    }))
}

pub async fn live_offers(
    State(state): State<ApiState>,
) -> Result<Json<LiveListing<Offer>>, ApiError> {
    let snap = live(&state)?.snapshot().await;
    Ok(Json(LiveListing {
        items: snap.offers,
        filter: snap.filter,
        source: snap.source,
        degraded: snap.degraded,
    }))
}

/// Swaps the live view's filter; the view reloads in the background.
pub async fn set_live_filter(
    State(state): State<ApiState>,
    Json(filter): Json<JobFilter>,
) -> Result<Json<JobFilter>, ApiError> {
    live(&state)?
        .set_filter(filter.clone())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(filter))
}

pub async fn reload_live(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    live(&state)?
        .reload()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(axum::http::StatusCode::ACCEPTED)
}

pub async fn handler_ws(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let market = live(&state)?;
    let notices = market.subscribe();
    Ok(ws.on_upgrade(move |socket| ws_loop(socket, market, notices)))
}

/// Sends the current view, then every notice followed by the view it
/// produced.
async fn ws_loop(mut socket: WebSocket, market: Arc<LiveMarket>, mut notices: broadcast::Receiver<Notice>) {
    if !send_frame(&mut socket, &LiveFrame::Snapshot(market.snapshot().await)).await {
        return;
    }

    loop {
        tokio::select! {
            result = notices.recv() => {
                match result {
                    Ok(notice) => {
                        if !send_frame(&mut socket, &LiveFrame::Notice(notice)).await {
                            break;
                        }
                        if !send_frame(&mut socket, &LiveFrame::Snapshot(market.snapshot().await)).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "websocket client lagging behind notices");
                    }
                    Err(_) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &LiveFrame) -> bool {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "could not encode live frame");
            return true;
        }
    };
    socket.send(Message::Text(text)).await.is_ok()
}
