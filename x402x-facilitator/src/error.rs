//! HTTP adapter for the closed error taxonomy.
//!
//! [`x402x_types::FacilitatorError`] and [`axum::response::IntoResponse`]
//! are both foreign to this crate, so a thin wrapper carries the mapping
//! from a domain error to a status code and a `{"error"}` JSON body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use x402x_types::{ExternalReason, FacilitatorError, UnknownNetwork};

/// Wraps a [`FacilitatorError`] (or a handler-local failure outside that
/// taxonomy) for conversion into an HTTP response.
#[derive(Debug)]
pub struct AppError(FacilitatorError);

impl From<FacilitatorError> for AppError {
    fn from(value: FacilitatorError) -> Self {
        Self(value)
    }
}

impl From<UnknownNetwork> for AppError {
    fn from(value: UnknownNetwork) -> Self {
        Self(FacilitatorError::PaymentInvalid(x402x_types::PaymentInvalidReason::UnsupportedNetwork))
            .with_detail(value.to_string())
    }
}

impl AppError {
    /// Attaches free-text detail, logged but not reflected in `self.0`'s
    /// variant (the closed taxonomy never carries a network's raw name).
    fn with_detail(self, detail: String) -> Self {
        #[cfg(feature = "telemetry")]
        tracing::debug!(%detail, "request rejected");
        #[cfg(not(feature = "telemetry"))]
        let _ = detail;
        self
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            FacilitatorError::PaymentInvalid(reason) => {
                if (*reason).is_client_input() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::PAYMENT_REQUIRED
                }
            }
            FacilitatorError::Capacity(_) => StatusCode::TOO_MANY_REQUESTS,
            FacilitatorError::External { reason: ExternalReason::ReceiptTimeout, .. } => StatusCode::GATEWAY_TIMEOUT,
            FacilitatorError::External { .. } => StatusCode::BAD_GATEWAY,
            FacilitatorError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}
