use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};

use log_api::{ConsumeResponse, ProduceRequest, ProduceResponse};

use crate::AppState;
use crate::error::ServiceError;

// ═══════════════════════════════════════════════════════════════
//  REST: POST /api/v1/produce
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_produce(
    State(state): State<AppState>,
    payload: Result<Json<ProduceRequest>, JsonRejection>,
) -> Result<Json<ProduceResponse>, ServiceError> {
    let Json(request) = payload.map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
    let position = state.endpoints.produce(request.value)?;
    Ok(Json(ProduceResponse { position }))
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/v1/consume/{position}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_consume(
    State(state): State<AppState>,
    position: Result<Path<u64>, PathRejection>,
) -> Result<Json<ConsumeResponse>, ServiceError> {
    let Path(position) = position.map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
    let record = state.endpoints.consume(position)?;
    Ok(Json(ConsumeResponse { record }))
}
