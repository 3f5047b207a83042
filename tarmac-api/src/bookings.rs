use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tarmac_core::{baggage::BaggageItem, BookingRequest, Ticket};

use crate::error::AppError;
use crate::middleware::{require_account, Account};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BaggageParams {
    pub ticket_id: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(book))
        .route("/v1/bookings/my", get(my_bookings))
        .route("/v1/bookings/{id}/cancel", post(cancel))
        .route("/v1/bookings/baggage", get(my_baggage))
        .route_layer(middleware::from_fn_with_state(state, require_account))
}

async fn book(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let Json(req) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let ticket = state.bookings.book(account.id, req).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    Ok(Json(state.bookings.my_bookings(account.id).await?))
}

async fn cancel(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let ticket_id = id
        .parse::<i64>()
        .map_err(|_| AppError::ValidationError("invalid ticket id".to_string()))?;

    state.bookings.cancel(account.id, ticket_id).await?;
    Ok(Json(json!({ "message": "Ticket cancelled successfully" })))
}

async fn my_baggage(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Query(params): Query<BaggageParams>,
) -> Result<Json<Vec<BaggageItem>>, AppError> {
    let ticket_id = match params.ticket_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| AppError::ValidationError("invalid ticket_id".to_string()))?,
        ),
        None => None,
    };

    Ok(Json(state.bookings.my_baggage(account.id, ticket_id).await?))
}
