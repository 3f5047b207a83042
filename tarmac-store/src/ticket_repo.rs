use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tarmac_core::{FlightSummary, NewTicket, Scope, StoreError, Ticket, TicketStatus, TicketStore};

use crate::errors::map_sqlx_error;
use crate::transaction::PgTx;

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i64,
    flight_id: i64,
    passenger_id: i64,
    seat_no: Option<String>,
    price: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            id: row.id,
            flight_id: row.flight_id,
            passenger_id: row.passenger_id,
            seat_number: row.seat_no,
            price: row.price,
            status: row.status.parse::<TicketStatus>().map_err(StoreError::Decode)?,
            created_at: row.created_at,
            flight: None,
        })
    }
}

/// Ticket joined with the summary of its flight.
#[derive(sqlx::FromRow)]
struct BookedTicketRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    flight_no: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    flight_status: String,
}

impl TryFrom<BookedTicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: BookedTicketRow) -> Result<Self, Self::Error> {
        let summary = FlightSummary {
            id: row.ticket.flight_id,
            flight_number: row.flight_no,
            origin: row.origin,
            destination: row.destination,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            status: row.flight_status,
        };
        let mut ticket = Ticket::try_from(row.ticket)?;
        ticket.flight = Some(summary);
        Ok(ticket)
    }
}

pub struct PgTicketRepository {
    pool: PgPool,
}

impl PgTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketStore<PgTx> for PgTicketRepository {
    async fn get_ticket(&self, scope: Scope<'_, PgTx>, id: i64) -> Result<Option<Ticket>, StoreError> {
        let query = sqlx::query_as::<_, TicketRow>(
            "SELECT id, flight_id, passenger_id, seat_no, price, status, created_at FROM tickets WHERE id = $1",
        )
        .bind(id);

        let row = match scope {
            Scope::Detached => query.fetch_optional(&self.pool).await,
            Scope::Transaction(tx) => query.fetch_optional(&mut **tx).await,
        }
        .map_err(map_sqlx_error)?;

        row.map(Ticket::try_from).transpose()
    }

    async fn count_active(&self, scope: Scope<'_, PgTx>, flight_id: i64) -> Result<i64, StoreError> {
        let query = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tickets WHERE flight_id = $1 AND status = 'ACTIVE'",
        )
        .bind(flight_id);

        match scope {
            Scope::Detached => query.fetch_one(&self.pool).await,
            Scope::Transaction(tx) => query.fetch_one(&mut **tx).await,
        }
        .map_err(map_sqlx_error)
    }

    async fn create_ticket(&self, scope: Scope<'_, PgTx>, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let query = sqlx::query_as::<_, TicketRow>(
            r#"
            INSERT INTO tickets (flight_id, passenger_id, seat_no, price, status, created_at)
            VALUES ($1, $2, $3, $4, 'ACTIVE', NOW())
            RETURNING id, flight_id, passenger_id, seat_no, price, status, created_at
            "#,
        )
        .bind(ticket.flight_id)
        .bind(ticket.passenger_id)
        .bind(ticket.seat_number)
        .bind(ticket.price);

        let row = match scope {
            Scope::Detached => query.fetch_one(&self.pool).await,
            Scope::Transaction(tx) => query.fetch_one(&mut **tx).await,
        }
        .map_err(map_sqlx_error)?;

        Ticket::try_from(row)
    }

    async fn cancel_ticket(&self, scope: Scope<'_, PgTx>, id: i64) -> Result<(), StoreError> {
        let query = sqlx::query("UPDATE tickets SET status = 'CANCELLED' WHERE id = $1").bind(id);

        match scope {
            Scope::Detached => query.execute(&self.pool).await,
            Scope::Transaction(tx) => query.execute(&mut **tx).await,
        }
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn tickets_for_passenger(
        &self,
        scope: Scope<'_, PgTx>,
        passenger_id: i64,
    ) -> Result<Vec<Ticket>, StoreError> {
        let query = sqlx::query_as::<_, BookedTicketRow>(
            r#"
            SELECT t.id, t.flight_id, t.passenger_id, t.seat_no, t.price, t.status, t.created_at,
                   f.flight_no, f.origin, f.destination, f.departure_time, f.arrival_time,
                   f.status AS flight_status
            FROM tickets t
            JOIN flights f ON f.id = t.flight_id
            WHERE t.passenger_id = $1
            ORDER BY t.id
            "#,
        )
        .bind(passenger_id);

        let rows = match scope {
            Scope::Detached => query.fetch_all(&self.pool).await,
            Scope::Transaction(tx) => query.fetch_all(&mut **tx).await,
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Ticket::try_from).collect()
    }
}
