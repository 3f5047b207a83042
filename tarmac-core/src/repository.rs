use async_trait::async_trait;

use crate::baggage::BaggageItem;
use crate::error::StoreError;
use crate::flight::{Flight, FlightQuery};
use crate::passenger::{NewPassenger, PassengerProfile};
use crate::ticket::{NewTicket, Ticket};

/// Which connection a store call runs on.
///
/// `Transaction` routes the call through an open unit of work handed out by
/// [`TransactionManager::run`](crate::transaction::TransactionManager::run);
/// `Detached` uses the store's non-transactional connection pool.
pub enum Scope<'a, Tx> {
    Detached,
    Transaction(&'a mut Tx),
}

impl<'a, Tx> Scope<'a, Tx> {
    pub fn is_transactional(&self) -> bool {
        matches!(self, Scope::Transaction(_))
    }
}

/// Read access to flights. Flights are written by the flight-management subsystem only.
#[async_trait]
pub trait FlightReader<Tx: Send + 'static>: Send + Sync {
    /// Inside a transaction scope the flight row stays locked until the
    /// scope commits or rolls back, which serializes competing bookings.
    async fn get_flight(&self, scope: Scope<'_, Tx>, id: i64) -> Result<Option<Flight>, StoreError>;

    async fn search_flights(
        &self,
        scope: Scope<'_, Tx>,
        query: &FlightQuery,
    ) -> Result<Vec<Flight>, StoreError>;
}

#[async_trait]
pub trait TicketStore<Tx: Send + 'static>: Send + Sync {
    async fn get_ticket(&self, scope: Scope<'_, Tx>, id: i64) -> Result<Option<Ticket>, StoreError>;

    /// Counts `ACTIVE` tickets only.
    async fn count_active(&self, scope: Scope<'_, Tx>, flight_id: i64) -> Result<i64, StoreError>;

    async fn create_ticket(&self, scope: Scope<'_, Tx>, ticket: NewTicket) -> Result<Ticket, StoreError>;

    /// Sets `status = CANCELLED` unconditionally.
    async fn cancel_ticket(&self, scope: Scope<'_, Tx>, id: i64) -> Result<(), StoreError>;

    /// All tickets of a passenger with their flight summary attached.
    async fn tickets_for_passenger(
        &self,
        scope: Scope<'_, Tx>,
        passenger_id: i64,
    ) -> Result<Vec<Ticket>, StoreError>;
}

/// Passenger profiles are resolved outside any transaction scope.
#[async_trait]
pub trait PassengerRepository: Send + Sync {
    async fn find_by_account(&self, account_id: i64) -> Result<Option<PassengerProfile>, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] if the account already has a profile.
    async fn create(&self, passenger: NewPassenger) -> Result<PassengerProfile, StoreError>;
}

#[async_trait]
pub trait BaggageLookup: Send + Sync {
    async fn baggage_for_ticket(&self, ticket_id: i64) -> Result<Vec<BaggageItem>, StoreError>;
}
