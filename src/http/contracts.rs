use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::MAX_DOCUMENT_BYTES;
use crate::model::{BookingContract, Ms};
use crate::service::ContractPatch;

use super::{not_found, ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(get_one).patch(patch_one))
        .route("/booking/{booking_id}", get(get_by_booking).post(create_for_booking))
        .route("/{id}/send", post(send))
        .route("/{id}/sign", post(sign))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/document", put(upload_document).get(download_document))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContractResponse {
    id: Ulid,
    booking_id: Ulid,
    contract_number: String,
    version: u32,
    status: &'static str,
    terms: String,
    total_amount: i64,
    currency: String,
    payment_due_date: Option<Ms>,
    customer_name: String,
    customer_email: String,
    facility_name: String,
    document_name: Option<String>,
    created_date: Ms,
    last_updated: Ms,
    signed_at: Option<Ms>,
    cancelled_at: Option<Ms>,
    cancel_reason: Option<String>,
}

impl From<BookingContract> for ContractResponse {
    fn from(c: BookingContract) -> Self {
        ContractResponse {
            id: c.id,
            booking_id: c.booking_id,
            contract_number: c.contract_number,
            version: c.version,
            status: c.status.as_str(),
            terms: c.terms,
            total_amount: c.total_amount,
            currency: c.currency,
            payment_due_date: c.payment_due,
            customer_name: c.customer_name,
            customer_email: c.customer_email,
            facility_name: c.facility_name,
            document_name: c.document_name,
            created_date: c.created_at,
            last_updated: c.updated_at,
            signed_at: c.signed_at,
            cancelled_at: c.cancelled_at,
            cancel_reason: c.cancel_reason,
        }
    }
}

async fn list(State(state): State<AppState>) -> Json<Vec<ContractResponse>> {
    let contracts = state.service.list_contracts().await;
    Json(contracts.into_iter().map(Into::into).collect())
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<Json<ContractResponse>, ApiError> {
    let contract = state
        .service
        .get_contract(id)
        .await
        .ok_or_else(|| not_found("contract"))?;
    Ok(Json(contract.into()))
}

async fn get_by_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Ulid>,
) -> Result<Json<ContractResponse>, ApiError> {
    let contract = state
        .service
        .get_contract_for_booking(booking_id)
        .await
        .ok_or_else(|| not_found("contract for booking"))?;
    Ok(Json(contract.into()))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ContractCreateBody {
    terms: Option<String>,
    payment_due_date: Option<Ms>,
}

async fn create_for_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Ulid>,
    body: Bytes,
) -> Result<(StatusCode, Json<ContractResponse>), ApiError> {
    let body: ContractCreateBody = if body.is_empty() {
        ContractCreateBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| {
            ApiError::Status(StatusCode::BAD_REQUEST, "invalid JSON body".to_string())
        })?
    };
    let contract = state
        .service
        .create_contract_for_booking(booking_id, body.terms, body.payment_due_date)
        .await?;
    Ok((StatusCode::CREATED, Json(contract.into())))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractPatchBody {
    terms: Option<String>,
    total_amount: Option<i64>,
    currency: Option<String>,
    payment_due_date: Option<Ms>,
}

async fn patch_one(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(body): Json<ContractPatchBody>,
) -> Result<Json<ContractResponse>, ApiError> {
    let contract = state
        .service
        .patch_contract(
            id,
            ContractPatch {
                terms: body.terms,
                total_amount: body.total_amount,
                currency: body.currency,
                payment_due: body.payment_due_date,
            },
        )
        .await?;
    Ok(Json(contract.into()))
}

async fn send(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<Json<ContractResponse>, ApiError> {
    let contract = state.service.send_contract(id).await?;
    Ok(Json(contract.into()))
}

async fn sign(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<Json<ContractResponse>, ApiError> {
    let contract = state.service.sign_contract(id).await?;
    Ok(Json(contract.into()))
}

/// The body, when present, is a bare JSON string with the reason.
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    body: Bytes,
) -> Result<Json<ContractResponse>, ApiError> {
    let reason = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<Option<String>>(&body).map_err(|_| {
            ApiError::Status(StatusCode::BAD_REQUEST, "invalid JSON body".to_string())
        })?
    };
    let contract = state.service.cancel_contract(id, reason).await?;
    Ok(Json(contract.into()))
}

#[derive(Deserialize)]
struct DocumentQuery {
    filename: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentResponse {
    name: String,
    uri: String,
}

async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Query(query): Query<DocumentQuery>,
    body: Bytes,
) -> Result<Json<DocumentResponse>, ApiError> {
    if state.service.get_contract(id).await.is_none() {
        return Err(not_found("contract"));
    }
    if body.len() > MAX_DOCUMENT_BYTES {
        return Err(ApiError::Status(
            StatusCode::PAYLOAD_TOO_LARGE,
            "document too large".to_string(),
        ));
    }
    if body.is_empty() {
        return Err(ApiError::Status(
            StatusCode::BAD_REQUEST,
            "document body is empty".to_string(),
        ));
    }

    let stored = state.blobs.save(id, &query.filename, &body).await?;
    state
        .service
        .set_contract_document(id, stored.name.clone())
        .await?;
    Ok(Json(DocumentResponse {
        name: stored.name,
        uri: stored.uri,
    }))
}

async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = state
        .service
        .get_contract(id)
        .await
        .ok_or_else(|| not_found("contract"))?;
    let name = contract
        .document_name
        .ok_or_else(|| not_found("contract document"))?;
    let bytes = state
        .blobs
        .load(id, &name)
        .await?
        .ok_or_else(|| not_found("contract document"))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        bytes,
    ))
}
