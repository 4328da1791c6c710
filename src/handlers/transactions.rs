use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::error::AppError;
use crate::schemas::{ChargeTransactionRequest, ChargeTransactionResponse, TransactionStatusResponse};
use crate::AppState;

pub async fn charge(
    State(state): State<AppState>,
    payload: Result<Json<ChargeTransactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(format!("Malformed JSON: {}", e.body_text())))?;
    let result = state.service.charge(request.into_domain()).await?;
    Ok((StatusCode::CREATED, Json(ChargeTransactionResponse::from(result))))
}

pub async fn status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<TransactionStatusResponse>, AppError> {
    let summary = state.service.get_status(&order_id).await?;
    Ok(Json(TransactionStatusResponse::new(
        &summary,
        "Success, transaction is found",
        Some(state.service.server_key()),
    )))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<TransactionStatusResponse>, AppError> {
    let summary = state.service.cancel(&order_id).await?;
    Ok(Json(TransactionStatusResponse::new(
        &summary,
        "Success, transaction is canceled",
        None,
    )))
}

pub async fn expire(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<TransactionStatusResponse>, AppError> {
    let summary = state.service.expire(&order_id).await?;
    Ok(Json(TransactionStatusResponse::new(
        &summary,
        "Success, transaction is expired",
        None,
    )))
}
