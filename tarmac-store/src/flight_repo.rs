use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tarmac_core::{Flight, FlightQuery, FlightReader, Scope, StoreError};

use crate::errors::map_sqlx_error;
use crate::transaction::PgTx;

const FLIGHT_COLUMNS: &str = "id, flight_no, origin, destination, gate_id, departure_time, arrival_time, \
     status, total_seats, base_price, version, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i64,
    flight_no: String,
    origin: String,
    destination: String,
    gate_id: Option<i64>,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    status: String,
    total_seats: i32,
    base_price: i64,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            id: row.id,
            flight_number: row.flight_no,
            origin: row.origin,
            destination: row.destination,
            gate_id: row.gate_id,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            status: row.status,
            total_seats: row.total_seats,
            base_price: row.base_price,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct PgFlightRepository {
    pool: PgPool,
}

impl PgFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn search_query(query: &FlightQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {} FROM flights WHERE 1=1", FLIGHT_COLUMNS));

    if let Some(origin) = &query.origin {
        builder.push(" AND origin = ").push_bind(origin.clone());
    }
    if let Some(destination) = &query.destination {
        builder.push(" AND destination = ").push_bind(destination.clone());
    }
    if let Some(date) = query.date {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        builder
            .push(" AND departure_time >= ")
            .push_bind(start)
            .push(" AND departure_time < ")
            .push_bind(start + Duration::days(1));
    }

    builder.push(" ORDER BY departure_time ASC");
    builder
}

#[async_trait]
impl FlightReader<PgTx> for PgFlightRepository {
    async fn get_flight(&self, scope: Scope<'_, PgTx>, id: i64) -> Result<Option<Flight>, StoreError> {
        let row = match scope {
            Scope::Detached => {
                sqlx::query_as::<_, FlightRow>(&format!("SELECT {} FROM flights WHERE id = $1", FLIGHT_COLUMNS))
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
            }
            // Row lock held until the surrounding transaction ends.
            Scope::Transaction(tx) => {
                sqlx::query_as::<_, FlightRow>(&format!(
                    "SELECT {} FROM flights WHERE id = $1 FOR UPDATE",
                    FLIGHT_COLUMNS
                ))
                .bind(id)
                .fetch_optional(&mut **tx)
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        Ok(row.map(Flight::from))
    }

    async fn search_flights(
        &self,
        scope: Scope<'_, PgTx>,
        query: &FlightQuery,
    ) -> Result<Vec<Flight>, StoreError> {
        let mut builder = search_query(query);
        let rows = match scope {
            Scope::Detached => builder.build_query_as::<FlightRow>().fetch_all(&self.pool).await,
            Scope::Transaction(tx) => builder.build_query_as::<FlightRow>().fetch_all(&mut **tx).await,
        }
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Flight::from).collect())
    }
}
