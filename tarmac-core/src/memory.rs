//! In-process store implementing every repository trait.
//!
//! Transactions buffer their writes and apply them on commit; dropping or
//! rolling back a [`MemoryTx`] discards them. Reading a flight inside a
//! transaction takes that flight's lock until the transaction ends, mirroring
//! `SELECT ... FOR UPDATE` in the Postgres store. Fault hooks let tests
//! simulate storage failures.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::baggage::BaggageItem;
use crate::error::StoreError;
use crate::flight::{Flight, FlightQuery, FlightSummary};
use crate::passenger::{NewPassenger, PassengerProfile};
use crate::repository::{BaggageLookup, FlightReader, PassengerRepository, Scope, TicketStore};
use crate::ticket::{NewTicket, Ticket, TicketStatus};
use crate::transaction::TransactionBackend;

#[derive(Default)]
struct MemoryState {
    flights: BTreeMap<i64, Flight>,
    tickets: BTreeMap<i64, Ticket>,
    passengers: BTreeMap<i64, PassengerProfile>,
    baggage: Vec<BaggageItem>,
}

#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    fail_next_ticket_insert: AtomicBool,
    fail_next_commit: AtomicBool,
    ticket_insert_delay: Mutex<Option<Duration>>,
    failing_baggage: Mutex<HashSet<i64>>,
}

/// Open unit of work against an [`InMemoryStore`].
#[derive(Default)]
pub struct MemoryTx {
    locks: HashMap<i64, OwnedMutexGuard<()>>,
    pending_tickets: Vec<Ticket>,
    pending_cancels: Vec<i64>,
}

impl MemoryTx {
    fn overlay(&self, mut ticket: Ticket) -> Ticket {
        if self.pending_cancels.contains(&ticket.id) {
            ticket.status = TicketStatus::Cancelled;
        }
        ticket
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    flight_locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
    next_flight_id: AtomicI64,
    next_ticket_id: AtomicI64,
    next_passenger_id: AtomicI64,
    next_baggage_id: AtomicI64,
    faults: Faults,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flight departing tomorrow on the ALA -> NQZ route.
    pub fn seed_flight(&self, flight_number: &str, total_seats: i32, base_price: i64) -> Flight {
        let departure = Utc::now() + ChronoDuration::days(1);
        self.insert_flight(Flight {
            id: 0,
            flight_number: flight_number.to_string(),
            origin: "ALA".to_string(),
            destination: "NQZ".to_string(),
            gate_id: None,
            departure_time: departure,
            arrival_time: departure + ChronoDuration::hours(2),
            status: "SCHEDULED".to_string(),
            total_seats,
            base_price,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    /// Store `flight`, assigning an id when it has none.
    pub fn insert_flight(&self, mut flight: Flight) -> Flight {
        if flight.id == 0 {
            flight.id = next_id(&self.next_flight_id);
        }
        lock(&self.state).flights.insert(flight.id, flight.clone());
        flight
    }

    pub fn add_baggage(&self, ticket_id: i64, tag_code: &str) -> BaggageItem {
        let item = BaggageItem {
            id: next_id(&self.next_baggage_id),
            ticket_id,
            tag_code: tag_code.to_string(),
            status: "RECEIVED".to_string(),
            updated_at: Utc::now(),
        };
        lock(&self.state).baggage.push(item.clone());
        item
    }

    /// Committed `ACTIVE` tickets for a flight.
    pub fn active_ticket_count(&self, flight_id: i64) -> i64 {
        lock(&self.state)
            .tickets
            .values()
            .filter(|t| t.flight_id == flight_id && t.is_active())
            .count() as i64
    }

    pub fn ticket(&self, id: i64) -> Option<Ticket> {
        lock(&self.state).tickets.get(&id).cloned()
    }

    pub fn ticket_count(&self) -> usize {
        lock(&self.state).tickets.len()
    }

    pub fn passenger_count(&self) -> usize {
        lock(&self.state).passengers.len()
    }

    /// Every `begin` fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn fail_next_ticket_insert(&self) {
        self.faults.fail_next_ticket_insert.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_commit(&self) {
        self.faults.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn delay_ticket_insert(&self, delay: Duration) {
        *lock(&self.faults.ticket_insert_delay) = Some(delay);
    }

    pub fn fail_baggage_lookup(&self, ticket_id: i64) {
        lock(&self.faults.failing_baggage).insert(ticket_id);
    }

    fn flight_lock(&self, flight_id: i64) -> Arc<AsyncMutex<()>> {
        Arc::clone(lock(&self.flight_locks).entry(flight_id).or_default())
    }

    fn with_summary(state: &MemoryState, mut ticket: Ticket) -> Option<Ticket> {
        let flight = state.flights.get(&ticket.flight_id)?;
        ticket.flight = Some(FlightSummary::from(flight));
        Some(ticket)
    }
}

#[async_trait]
impl TransactionBackend for InMemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()));
        }
        Ok(MemoryTx::default())
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), StoreError> {
        if self.faults.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated commit failure".to_string()));
        }

        let mut state = lock(&self.state);
        for ticket in &tx.pending_tickets {
            state.tickets.insert(ticket.id, ticket.clone());
        }
        for id in &tx.pending_cancels {
            if let Some(ticket) = state.tickets.get_mut(id) {
                ticket.status = TicketStatus::Cancelled;
            }
        }
        drop(state);
        // Row locks are released only after the writes are visible.
        drop(tx);
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), StoreError> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl FlightReader<MemoryTx> for InMemoryStore {
    async fn get_flight(&self, scope: Scope<'_, MemoryTx>, id: i64) -> Result<Option<Flight>, StoreError> {
        if let Scope::Transaction(tx) = scope {
            if !tx.locks.contains_key(&id) {
                let guard = self.flight_lock(id).lock_owned().await;
                tx.locks.insert(id, guard);
            }
        }
        Ok(lock(&self.state).flights.get(&id).cloned())
    }

    async fn search_flights(
        &self,
        _scope: Scope<'_, MemoryTx>,
        query: &FlightQuery,
    ) -> Result<Vec<Flight>, StoreError> {
        let mut flights: Vec<Flight> = lock(&self.state)
            .flights
            .values()
            .filter(|f| query.matches(f))
            .cloned()
            .collect();
        flights.sort_by_key(|f| f.departure_time);
        Ok(flights)
    }
}

#[async_trait]
impl TicketStore<MemoryTx> for InMemoryStore {
    async fn get_ticket(&self, scope: Scope<'_, MemoryTx>, id: i64) -> Result<Option<Ticket>, StoreError> {
        let committed = lock(&self.state).tickets.get(&id).cloned();
        match scope {
            Scope::Detached => Ok(committed),
            Scope::Transaction(tx) => {
                let pending = tx.pending_tickets.iter().find(|t| t.id == id).cloned();
                Ok(pending.or(committed).map(|t| tx.overlay(t)))
            }
        }
    }

    async fn count_active(&self, scope: Scope<'_, MemoryTx>, flight_id: i64) -> Result<i64, StoreError> {
        let committed: Vec<Ticket> = lock(&self.state)
            .tickets
            .values()
            .filter(|t| t.flight_id == flight_id)
            .cloned()
            .collect();

        let count = match scope {
            Scope::Detached => committed.iter().filter(|t| t.is_active()).count(),
            Scope::Transaction(tx) => committed
                .into_iter()
                .chain(tx.pending_tickets.iter().filter(|t| t.flight_id == flight_id).cloned())
                .map(|t| tx.overlay(t))
                .filter(Ticket::is_active)
                .count(),
        };
        Ok(count as i64)
    }

    async fn create_ticket(&self, scope: Scope<'_, MemoryTx>, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let delay = *lock(&self.faults.ticket_insert_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.faults.fail_next_ticket_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Query("simulated ticket insert failure".to_string()));
        }

        let created = Ticket {
            id: next_id(&self.next_ticket_id),
            flight_id: ticket.flight_id,
            passenger_id: ticket.passenger_id,
            seat_number: ticket.seat_number,
            price: ticket.price,
            status: TicketStatus::Active,
            created_at: Utc::now(),
            flight: None,
        };

        match scope {
            Scope::Detached => {
                lock(&self.state).tickets.insert(created.id, created.clone());
            }
            Scope::Transaction(tx) => tx.pending_tickets.push(created.clone()),
        }
        Ok(created)
    }

    async fn cancel_ticket(&self, scope: Scope<'_, MemoryTx>, id: i64) -> Result<(), StoreError> {
        match scope {
            Scope::Detached => {
                if let Some(ticket) = lock(&self.state).tickets.get_mut(&id) {
                    ticket.status = TicketStatus::Cancelled;
                }
            }
            Scope::Transaction(tx) => tx.pending_cancels.push(id),
        }
        Ok(())
    }

    async fn tickets_for_passenger(
        &self,
        scope: Scope<'_, MemoryTx>,
        passenger_id: i64,
    ) -> Result<Vec<Ticket>, StoreError> {
        let state = lock(&self.state);
        let committed = state.tickets.values().filter(|t| t.passenger_id == passenger_id).cloned();

        let tickets: Vec<Ticket> = match scope {
            Scope::Detached => committed.collect(),
            Scope::Transaction(tx) => committed
                .chain(tx.pending_tickets.iter().filter(|t| t.passenger_id == passenger_id).cloned())
                .map(|t| tx.overlay(t))
                .collect(),
        };

        Ok(tickets
            .into_iter()
            .filter_map(|t| Self::with_summary(&state, t))
            .collect())
    }
}

#[async_trait]
impl PassengerRepository for InMemoryStore {
    async fn find_by_account(&self, account_id: i64) -> Result<Option<PassengerProfile>, StoreError> {
        Ok(lock(&self.state)
            .passengers
            .values()
            .find(|p| p.account_id == account_id)
            .cloned())
    }

    async fn create(&self, passenger: NewPassenger) -> Result<PassengerProfile, StoreError> {
        let mut state = lock(&self.state);
        if state.passengers.values().any(|p| p.account_id == passenger.account_id) {
            return Err(StoreError::UniqueViolation("passengers_account_id_key".to_string()));
        }

        let now = Utc::now();
        let profile = PassengerProfile {
            id: next_id(&self.next_passenger_id),
            account_id: passenger.account_id,
            passport_number: passenger.passport_number,
            phone: passenger.phone,
            created_at: now,
            updated_at: now,
        };
        state.passengers.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl BaggageLookup for InMemoryStore {
    async fn baggage_for_ticket(&self, ticket_id: i64) -> Result<Vec<BaggageItem>, StoreError> {
        if lock(&self.faults.failing_baggage).contains(&ticket_id) {
            return Err(StoreError::Unavailable(format!("baggage service unavailable for ticket {}", ticket_id)));
        }
        Ok(lock(&self.state)
            .baggage
            .iter()
            .filter(|b| b.ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}
