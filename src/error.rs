use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::RepositoryError;
use crate::validation::ValidationIssue;

/// Typed outcomes of the lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("request validation failed with {} issue(s)", .0.len())]
    ValidationFailed(Vec<ValidationIssue>),

    #[error("order id already exists")]
    DuplicateOrderId,

    #[error("sum of item prices does not match the transaction amount")]
    AmountMismatch,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("transaction status can not be modified")]
    CannotModifyStatus,

    #[error("unsupported payment type")]
    UnsupportedPaymentType,

    #[error("{context}: {source}")]
    InstrumentProvisioningFailed {
        context: &'static str,
        #[source]
        source: RepositoryError,
    },

    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl LifecycleError {
    pub fn storage(context: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |source| LifecycleError::Storage { context, source }
    }

    pub fn provisioning(context: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |source| LifecycleError::InstrumentProvisioningFailed { context, source }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Lifecycle(err) => match err {
                LifecycleError::ValidationFailed(_)
                | LifecycleError::AmountMismatch
                | LifecycleError::UnsupportedPaymentType => StatusCode::BAD_REQUEST,
                LifecycleError::DuplicateOrderId => StatusCode::NOT_ACCEPTABLE,
                LifecycleError::TransactionNotFound => StatusCode::NOT_FOUND,
                LifecycleError::CannotModifyStatus => StatusCode::PRECONDITION_FAILED,
                LifecycleError::InstrumentProvisioningFailed { .. }
                | LifecycleError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn status_message(&self) -> String {
        match self {
            AppError::Lifecycle(LifecycleError::ValidationFailed(_)) => {
                "request validation failed".to_string()
            }
            AppError::Lifecycle(
                LifecycleError::InstrumentProvisioningFailed { .. } | LifecycleError::Storage { .. },
            )
            | AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = json!({
            "status_code": status.as_u16().to_string(),
            "status_message": self.status_message(),
        });
        if let AppError::Lifecycle(LifecycleError::ValidationFailed(issues)) = &self {
            body["issues"] = json!(issues);
        }

        (status, Json(body)).into_response()
    }
}
