use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{BookingError, StoreResultExt};
use crate::repository::{FlightReader, Scope, TicketStore};
use crate::transaction::TransactionBackend;

/// Flight as owned by the flight-management subsystem. The booking core only
/// consumes `total_seats` and `base_price`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: i64,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub gate_id: Option<i64>,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub status: String,
    pub total_seats: i32,
    /// Minor currency units.
    pub base_price: i64,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subset of a flight attached to tickets in booking responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightSummary {
    pub id: i64,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub status: String,
}

impl From<&Flight> for FlightSummary {
    fn from(flight: &Flight) -> Self {
        Self {
            id: flight.id,
            flight_number: flight.flight_number.clone(),
            origin: flight.origin.clone(),
            destination: flight.destination.clone(),
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            status: flight.status.clone(),
        }
    }
}

/// Search criteria; `None` fields are not filtered on. `date` matches the
/// whole UTC day of departure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
}

impl FlightQuery {
    /// Build a query from raw request parameters; empty strings mean "any".
    pub fn parse(
        origin: Option<&str>,
        destination: Option<&str>,
        date: Option<&str>,
    ) -> Result<Self, BookingError> {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        let date = match non_empty(date) {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                BookingError::InvalidRequest("invalid date format (expected YYYY-MM-DD)".to_string())
            })?),
            None => None,
        };

        Ok(Self {
            origin: non_empty(origin).map(str::to_uppercase),
            destination: non_empty(destination).map(str::to_uppercase),
            date,
        })
    }

    pub fn matches(&self, flight: &Flight) -> bool {
        self.origin.as_ref().map_or(true, |o| *o == flight.origin)
            && self.destination.as_ref().map_or(true, |d| *d == flight.destination)
            && self.date.map_or(true, |d| flight.departure_time.date_naive() == d)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightAvailability {
    #[serde(flatten)]
    pub flight: Flight,
    pub seats_remaining: i64,
}

impl FlightAvailability {
    pub fn new(flight: Flight, active_tickets: i64) -> Self {
        let seats_remaining = (i64::from(flight.total_seats) - active_tickets).max(0);
        Self { flight, seats_remaining }
    }
}

/// Non-transactional flight reads exposed to the HTTP layer.
#[async_trait]
pub trait FlightCatalog: Send + Sync {
    async fn search(&self, query: FlightQuery) -> Result<Vec<FlightAvailability>, BookingError>;
    async fn availability(&self, flight_id: i64) -> Result<FlightAvailability, BookingError>;
}

/// Search path over the same readers the booking orchestrator uses. Counts
/// are read detached, so they are advisory; only booking enforces capacity.
pub struct FlightService<B: TransactionBackend> {
    flights: Arc<dyn FlightReader<B::Tx>>,
    tickets: Arc<dyn TicketStore<B::Tx>>,
}

impl<B: TransactionBackend> FlightService<B> {
    pub fn new(flights: Arc<dyn FlightReader<B::Tx>>, tickets: Arc<dyn TicketStore<B::Tx>>) -> Self {
        Self { flights, tickets }
    }

    async fn with_availability(&self, flight: Flight) -> Result<FlightAvailability, BookingError> {
        let active = self
            .tickets
            .count_active(Scope::Detached, flight.id)
            .await
            .context("failed to count active tickets")?;
        Ok(FlightAvailability::new(flight, active))
    }
}

#[async_trait]
impl<B: TransactionBackend> FlightCatalog for FlightService<B> {
    async fn search(&self, query: FlightQuery) -> Result<Vec<FlightAvailability>, BookingError> {
        let flights = self
            .flights
            .search_flights(Scope::Detached, &query)
            .await
            .context("failed to search flights")?;

        let mut results = Vec::with_capacity(flights.len());
        for flight in flights {
            results.push(self.with_availability(flight).await?);
        }
        Ok(results)
    }

    async fn availability(&self, flight_id: i64) -> Result<FlightAvailability, BookingError> {
        let flight = self
            .flights
            .get_flight(Scope::Detached, flight_id)
            .await
            .context("failed to get flight")?
            .ok_or(BookingError::FlightNotFound(flight_id))?;
        self.with_availability(flight).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn flight(total_seats: i32) -> Flight {
        let departure = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        Flight {
            id: 1,
            flight_number: "TM101".to_string(),
            origin: "ALA".to_string(),
            destination: "NQZ".to_string(),
            gate_id: None,
            departure_time: departure,
            arrival_time: departure + chrono::Duration::hours(2),
            status: "SCHEDULED".to_string(),
            total_seats,
            base_price: 45_000,
            version: 1,
            created_at: departure,
            updated_at: departure,
        }
    }

    #[test]
    fn test_query_parsing() {
        let query = FlightQuery::parse(Some("ala"), Some(""), Some("2025-03-14")).unwrap();
        assert_eq!(query.origin.as_deref(), Some("ALA"));
        assert!(query.destination.is_none());
        assert!(query.matches(&flight(10)));

        let other_day = FlightQuery::parse(None, None, Some("2025-03-15")).unwrap();
        assert!(!other_day.matches(&flight(10)));

        let err = FlightQuery::parse(None, None, Some("14/03/2025")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn test_blank_parameters_mean_any() {
        let query = FlightQuery::parse(Some("  "), Some(" nqz "), Some("")).unwrap();
        assert!(query.origin.is_none());
        assert_eq!(query.destination.as_deref(), Some("NQZ"));
        assert!(query.date.is_none());
    }

    #[test]
    fn test_seats_remaining_never_negative() {
        assert_eq!(FlightAvailability::new(flight(3), 1).seats_remaining, 2);
        assert_eq!(FlightAvailability::new(flight(3), 5).seats_remaining, 0);
    }
}
