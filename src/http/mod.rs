//! HTTP surface: axum router, request state, and error mapping.

mod bookings;
mod contracts;
mod customers;
mod facilities;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::blob::BlobStore;
use crate::service::{Service, ServiceError};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
    pub blobs: Arc<BlobStore>,
}

/// Build the complete router. Paths mirror the administration client:
///
/// - `/api/customer` — customer management
/// - `/api/facility` — facility management and availability
/// - `/api/booking` — booking lifecycle
/// - `/api/bookingcontract` — contract lifecycle and documents
/// - `/health` — liveness probe
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/customer", customers::router())
        .nest("/api/facility", facilities::router())
        .nest("/api/booking", bookings::router())
        .nest("/api/bookingcontract", contracts::router())
        .route("/health", get(|| async { "ok" }))
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        crate::observability::REQUESTS_TOTAL,
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        crate::observability::REQUEST_DURATION_SECONDS,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

pub enum ApiError {
    Service(ServiceError),
    Status(StatusCode, String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        if matches!(err, ServiceError::Conflict(_)) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
        }
        ApiError::Service(err)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::InvalidInput {
            ApiError::Status(StatusCode::BAD_REQUEST, err.to_string())
        } else {
            tracing::error!("storage error: {err}");
            ApiError::Status(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage error".to_string(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Service(err) => {
                let status = match &err {
                    ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                    ServiceError::AlreadyExists(_)
                    | ServiceError::EmailTaken(_)
                    | ServiceError::Conflict(_)
                    | ServiceError::HasBookings(_)
                    | ServiceError::HasActiveBookings(_) => StatusCode::CONFLICT,
                    ServiceError::WalError(_) => {
                        tracing::error!("request failed: {err}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, err.to_string())
            }
            ApiError::Status(status, message) => (status, message),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

/// 404 with the standard error body.
pub(crate) fn not_found(what: &str) -> ApiError {
    ApiError::Status(StatusCode::NOT_FOUND, format!("{what} not found"))
}
