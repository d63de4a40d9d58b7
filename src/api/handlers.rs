use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::{error, info};

use crate::api::{state::AppState, types::*};
use crate::error::HerdError;
use crate::store::{ExchangeRecord, StatusSnapshot};
use crate::supervisor::WorkerSummary;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

/// GET /health -- lightweight liveness probe
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let workers = state.supervisor.summaries().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_seconds(),
        workers_total: workers.len(),
        workers_running: workers.iter().filter(|w| w.running).count(),
        relay_subscribers: state.supervisor.subscriber_count(),
    })
}

/// GET /state
pub async fn get_state(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.store().get_status().await)
}

/// POST /state -- start or stop workers, then report the new snapshot
pub async fn set_state(
    State(state): State<AppState>,
    Json(req): Json<StateChangeRequest>,
) -> Json<StatusSnapshot> {
    for (id, running) in req.data {
        if running {
            if let Err(e) = state.supervisor.start_bot(&id).await {
                error!("Start of {} requested over API failed: {}", id, e);
            }
        } else {
            state.supervisor.stop_bot(&id).await;
        }
    }
    Json(state.store().get_status().await)
}

/// GET /exchanges/:id
pub async fn get_exchange(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExchangeRecord>, ApiError> {
    state
        .store()
        .find_exchange_by_id(&id)
        .await
        .map(Json)
        .map_err(|_| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("exchange with id {} not found", id),
            )
        })
}

/// POST /exchanges/:id/restart
pub async fn restart_exchange(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<RestartResponse>), ApiError> {
    if !state.supervisor.restart_bot(&id).await {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("worker with id {} not found", id),
        ));
    }

    info!("Restart of {} requested over API", id);
    Ok((
        StatusCode::ACCEPTED,
        Json(RestartResponse {
            restarting: id,
            delay_ms: state.supervisor.config().restart_delay_ms,
        }),
    ))
}

/// POST /exchanges/:id/send -- forward a raw payload to the worker
pub async fn send_to_exchange(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, ApiError> {
    match state.supervisor.send_to_bot(&id, payload).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e @ HerdError::UnknownWorker(_)) => Err(api_error(StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ HerdError::WorkerNotRunning(_)) | Err(e @ HerdError::ChannelClosed(_)) => {
            Err(api_error(StatusCode::CONFLICT, e.to_string()))
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// GET /workers
pub async fn list_workers(State(state): State<AppState>) -> Json<Vec<WorkerSummary>> {
    Json(state.supervisor.summaries().await)
}
