use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::billing::BillingError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("billing error: {0}")]
    Billing(#[from] BillingError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Billing(err) => match err {
                BillingError::EmptyDate
                | BillingError::InvalidDateFormat(_)
                | BillingError::InvalidAmount(_)
                | BillingError::MissingContract => StatusCode::BAD_REQUEST,
                BillingError::InvoiceNotFound(_) => StatusCode::NOT_FOUND,
                BillingError::RemoteCallFailed { .. }
                | BillingError::ReplacementNotFound { .. }
                | BillingError::NoReplacementInvoice => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(?self);
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
