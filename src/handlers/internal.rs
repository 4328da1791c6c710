//! Unauthenticated routes used by the gateway's own simulator UI.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};

use crate::domain::PaymentType;
use crate::error::AppError;
use crate::schemas::{MarkAsPaidRequest, TransactionDetailQuery, TransactionDetailResponse};
use crate::AppState;

pub async fn mark_as_paid(
    State(state): State<AppState>,
    payload: Result<Json<MarkAsPaidRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(format!("Malformed JSON: {}", e.body_text())))?;
    if request.order_id.is_empty() {
        return Err(AppError::BadRequest("order_id is required".to_string()));
    }

    let payment_method = match request.payment_method.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<PaymentType>()
                .map_err(|e| AppError::BadRequest(e.to_string()))?,
        ),
    };

    state
        .service
        .mark_as_paid(&request.order_id, payment_method)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn transaction_detail(
    State(state): State<AppState>,
    Query(query): Query<TransactionDetailQuery>,
) -> Result<Json<TransactionDetailResponse>, AppError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Empty transaction id".to_string()))?;

    let detail = state.service.payment_detail(&id).await?;
    Ok(Json(TransactionDetailResponse::from(detail)))
}
