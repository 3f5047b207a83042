use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tarmac_core::{FlightAvailability, FlightQuery};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights/search", get(search_flights))
        .route("/v1/flights/{id}", get(get_flight))
}

async fn search_flights(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<FlightAvailability>>, AppError> {
    let query = FlightQuery::parse(
        params.origin.as_deref(),
        params.destination.as_deref(),
        params.date.as_deref(),
    )?;
    Ok(Json(state.flights.search(query).await?))
}

async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlightAvailability>, AppError> {
    let flight_id = id
        .parse::<i64>()
        .map_err(|_| AppError::ValidationError("invalid flight id".to_string()))?;
    Ok(Json(state.flights.availability(flight_id).await?))
}
