use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::{DateRange, Facility, Ms};
use crate::service::FacilityFields;

use super::{not_found, ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/active", get(list_active))
        .route("/{id}", get(get_one).put(update).delete(delete))
        .route("/{id}/active", patch(set_active))
        .route("/{id}/availability", get(availability))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FacilityBody {
    name: String,
    description: Option<String>,
    address: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
    max_capacity: u32,
    price_per_day: i64,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

impl From<FacilityBody> for FacilityFields {
    fn from(body: FacilityBody) -> Self {
        FacilityFields {
            name: body.name,
            description: body.description,
            address: body.address,
            postal_code: body.postal_code,
            city: body.city,
            max_capacity: body.max_capacity,
            price_per_day: body.price_per_day,
            is_active: body.is_active,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilityResponse {
    id: Ulid,
    name: String,
    description: Option<String>,
    address: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
    max_capacity: u32,
    price_per_day: i64,
    is_active: bool,
    created_date: Ms,
}

impl From<Facility> for FacilityResponse {
    fn from(f: Facility) -> Self {
        FacilityResponse {
            id: f.id,
            name: f.name,
            description: f.description,
            address: f.address,
            postal_code: f.postal_code,
            city: f.city,
            max_capacity: f.max_capacity,
            price_per_day: f.price_per_day,
            is_active: f.is_active,
            created_date: f.created_at,
        }
    }
}

async fn list(State(state): State<AppState>) -> Json<Vec<FacilityResponse>> {
    let facilities = state.service.list_facilities().await;
    Json(facilities.into_iter().map(Into::into).collect())
}

async fn list_active(State(state): State<AppState>) -> Json<Vec<FacilityResponse>> {
    let facilities = state.service.list_active_facilities().await;
    Json(facilities.into_iter().map(Into::into).collect())
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<Json<FacilityResponse>, ApiError> {
    let facility = state
        .service
        .get_facility(id)
        .await
        .ok_or_else(|| not_found("facility"))?;
    Ok(Json(facility.into()))
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<FacilityBody>,
) -> Result<(StatusCode, Json<FacilityResponse>), ApiError> {
    let facility = state.service.create_facility(body.into()).await?;
    Ok((StatusCode::CREATED, Json(facility.into())))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(body): Json<FacilityBody>,
) -> Result<Json<FacilityResponse>, ApiError> {
    let facility = state.service.update_facility(id, body.into()).await?;
    Ok(Json(facility.into()))
}

async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_facility(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetActiveBody {
    is_active: bool,
}

async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(body): Json<SetActiveBody>,
) -> Result<Json<FacilityResponse>, ApiError> {
    let facility = state
        .service
        .set_facility_active(id, body.is_active)
        .await?;
    Ok(Json(facility.into()))
}

#[derive(Deserialize)]
struct AvailabilityQuery {
    from: Ms,
    to: Ms,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityResponse {
    facility_id: Ulid,
    free: Vec<DateRange>,
}

async fn availability(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let free = state
        .service
        .facility_availability(id, query.from, query.to)
        .await?;
    Ok(Json(AvailabilityResponse {
        facility_id: id,
        free,
    }))
}
