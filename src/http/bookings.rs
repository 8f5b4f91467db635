use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::{Booking, Ms};
use crate::service::NewBooking;

use super::{not_found, ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/filter", get(filter))
        .route("/{id}", get(get_one).delete(cancel))
        .route("/{id}/confirm", post(confirm))
        .route("/{id}/reschedule", post(reschedule))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingCreateBody {
    customer_id: Ulid,
    facility_id: Ulid,
    start_date: Ms,
    end_date: Ms,
    number_of_participants: u32,
    notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RescheduleBody {
    start_date: Ms,
    end_date: Ms,
}

#[derive(Deserialize)]
struct CancelBody {
    reason: Option<String>,
}

/// Flattened booking view: related customer/facility/contract data is
/// denormalized for the client, matching the admin UI's expectations.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingResponse {
    id: Ulid,
    customer_id: Ulid,
    facility_id: Ulid,
    start_date: Ms,
    end_date: Ms,
    number_of_participants: u32,
    notes: String,
    status: &'static str,
    total_price: i64,
    created_date: Ms,
    confirmed_date: Option<Ms>,
    cancelled_date: Option<Ms>,
    cancel_reason: Option<String>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    facility_name: Option<String>,
    contract_id: Option<Ulid>,
}

async fn to_response(state: &AppState, booking: Booking) -> BookingResponse {
    let customer = state.service.get_customer(booking.customer_id).await;
    let facility = state.service.get_facility(booking.facility_id).await;
    BookingResponse {
        id: booking.id,
        customer_id: booking.customer_id,
        facility_id: booking.facility_id,
        start_date: booking.range.start,
        end_date: booking.range.end,
        number_of_participants: booking.participants,
        notes: booking.notes.unwrap_or_default(),
        status: booking.status.as_str(),
        total_price: booking.total_price,
        created_date: booking.created_at,
        confirmed_date: booking.confirmed_at,
        cancelled_date: booking.cancelled_at,
        cancel_reason: booking.cancel_reason,
        customer_name: customer.as_ref().map(|c| c.full_name()),
        customer_email: customer.map(|c| c.email),
        facility_name: facility.map(|f| f.name),
        contract_id: booking.contract_id,
    }
}

async fn collect_responses(state: &AppState, bookings: Vec<Booking>) -> Vec<BookingResponse> {
    let mut out = Vec::with_capacity(bookings.len());
    for b in bookings {
        out.push(to_response(state, b).await);
    }
    out
}

async fn list(State(state): State<AppState>) -> Json<Vec<BookingResponse>> {
    let bookings = state.service.list_bookings().await;
    Json(collect_responses(&state, bookings).await)
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state
        .service
        .get_booking(id)
        .await
        .ok_or_else(|| not_found("booking"))?;
    Ok(Json(to_response(&state, booking).await))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterQuery {
    customer_id: Option<Ulid>,
    facility_id: Option<Ulid>,
    from: Option<Ms>,
    to: Option<Ms>,
}

/// One filter at a time, first match wins: customer, facility, date range.
async fn filter(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = if let Some(customer_id) = query.customer_id {
        state.service.bookings_for_customer(customer_id).await
    } else if let Some(facility_id) = query.facility_id {
        state.service.bookings_for_facility(facility_id).await
    } else if let (Some(from), Some(to)) = (query.from, query.to) {
        state.service.bookings_in_range(from, to).await?
    } else {
        state.service.list_bookings().await
    };
    Ok(Json(collect_responses(&state, bookings).await))
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<BookingCreateBody>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let booking = state
        .service
        .create_booking(NewBooking {
            customer_id: body.customer_id,
            facility_id: body.facility_id,
            start: body.start_date,
            end: body.end_date,
            participants: body.number_of_participants,
            notes: body.notes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(to_response(&state, booking).await)))
}

async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state.service.confirm_booking(id).await?;
    Ok(Json(to_response(&state, booking).await))
}

async fn reschedule(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(body): Json<RescheduleBody>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state
        .service
        .reschedule_booking(id, body.start_date, body.end_date)
        .await?;
    Ok(Json(to_response(&state, booking).await))
}

/// DELETE with an optional JSON body — absent bodies mean "no reason given".
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let reason = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<CancelBody>(&body)
            .map_err(|_| {
                ApiError::Status(StatusCode::BAD_REQUEST, "invalid JSON body".to_string())
            })?
            .reason
    };
    state.service.cancel_booking(id, reason).await?;
    Ok(StatusCode::NO_CONTENT)
}
