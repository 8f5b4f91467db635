use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::{Customer, Ms};
use crate::service::CustomerFields;

use super::{not_found, ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/by-email", get(by_email))
        .route("/{id}", get(get_one).put(update).delete(delete))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerBody {
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    company_name: Option<String>,
    address: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
}

impl From<CustomerBody> for CustomerFields {
    fn from(body: CustomerBody) -> Self {
        CustomerFields {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            phone: body.phone,
            company_name: body.company_name,
            address: body.address,
            postal_code: body.postal_code,
            city: body.city,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerResponse {
    id: Ulid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    company_name: Option<String>,
    address: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
    created_date: Ms,
    total_bookings: usize,
    active_bookings: usize,
}

async fn to_response(state: &AppState, customer: Customer) -> CustomerResponse {
    let (total, active) = state.service.customer_booking_counts(customer.id).await;
    CustomerResponse {
        id: customer.id,
        first_name: customer.first_name,
        last_name: customer.last_name,
        email: customer.email,
        phone: customer.phone,
        company_name: customer.company_name,
        address: customer.address,
        postal_code: customer.postal_code,
        city: customer.city,
        created_date: customer.created_at,
        total_bookings: total,
        active_bookings: active,
    }
}

async fn list(State(state): State<AppState>) -> Json<Vec<CustomerResponse>> {
    let customers = state.service.list_customers().await;
    let mut out = Vec::with_capacity(customers.len());
    for c in customers {
        out.push(to_response(&state, c).await);
    }
    Json(out)
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer = state
        .service
        .get_customer(id)
        .await
        .ok_or_else(|| not_found("customer"))?;
    Ok(Json(to_response(&state, customer).await))
}

#[derive(Deserialize)]
struct EmailQuery {
    email: String,
}

async fn by_email(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<CustomerResponse>, ApiError> {
    if query.email.trim().is_empty() {
        return Err(ApiError::Status(
            StatusCode::BAD_REQUEST,
            "email is required".to_string(),
        ));
    }
    let customer = state
        .service
        .find_customer_by_email(&query.email)
        .await
        .ok_or_else(|| not_found("customer"))?;
    Ok(Json(to_response(&state, customer).await))
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<CustomerBody>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let customer = state.service.create_customer(body.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(to_response(&state, customer).await),
    ))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(body): Json<CustomerBody>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer = state.service.update_customer(id, body.into()).await?;
    Ok(Json(to_response(&state, customer).await))
}

async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
