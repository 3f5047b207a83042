use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tarmac_core::memory::InMemoryStore;
use tarmac_core::{
    BookingError, BookingRequest, BookingService, Bookings, ErrorKind, FlightCatalog, FlightQuery,
    FlightService, NewPassenger, PassengerProfile, PassengerRepository, PassengerService, StoreError,
    TicketStatus, TransactionManager, TxPhase,
};

fn booking_service(store: &Arc<InMemoryStore>) -> BookingService<InMemoryStore> {
    booking_service_with(store, TransactionManager::new(Arc::clone(store)))
}

fn booking_service_with(
    store: &Arc<InMemoryStore>,
    transactions: TransactionManager<InMemoryStore>,
) -> BookingService<InMemoryStore> {
    BookingService::new(
        transactions,
        store.clone(),
        store.clone(),
        PassengerService::new(store.clone()),
        store.clone(),
    )
}

fn with_passport(flight_id: i64, passport: &str) -> BookingRequest {
    BookingRequest::new(flight_id).with_passport(passport, "+77010000000")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_never_exceed_capacity() {
    let store = Arc::new(InMemoryStore::new());
    let service = Arc::new(booking_service(&store));
    let flight = store.seed_flight("TM100", 5, 12_500);
    let flight_id = flight.id;

    let mut handles = Vec::new();
    for account_id in 1..=8_i64 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .book(account_id, with_passport(flight_id, &format!("P{}", account_id)))
                .await
        }));
    }

    let mut booked = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(ticket) => {
                assert_eq!(ticket.status, TicketStatus::Active);
                booked += 1;
            }
            Err(BookingError::FlightFull { flight_id, total_seats }) => {
                assert_eq!(flight_id, flight.id);
                assert_eq!(total_seats, 5);
                full += 1;
            }
            Err(other) => panic!("unexpected booking failure: {}", other),
        }
    }

    assert_eq!(booked, 5);
    assert_eq!(full, 3);
    assert_eq!(store.active_ticket_count(flight.id), 5);
}

#[tokio::test]
async fn test_last_seat_is_freed_by_cancellation() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let flight = store.seed_flight("F1", 1, 30_000);
    let (account_a, account_b) = (10, 20);

    let t1 = service.book(account_a, with_passport(flight.id, "X1")).await.unwrap();
    assert_eq!(t1.status, TicketStatus::Active);
    assert_eq!(store.active_ticket_count(flight.id), 1);

    let err = service.book(account_b, with_passport(flight.id, "Y1")).await.unwrap_err();
    assert!(matches!(err, BookingError::FlightFull { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    service.cancel(account_a, t1.id).await.unwrap();
    assert_eq!(store.ticket(t1.id).unwrap().status, TicketStatus::Cancelled);

    let t2 = service.book(account_b, BookingRequest::new(flight.id)).await.unwrap();
    assert_eq!(t2.status, TicketStatus::Active);
    assert_eq!(store.active_ticket_count(flight.id), 1);
}

#[tokio::test]
async fn test_ticket_snapshots_flight_price() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let mut flight = store.seed_flight("TM7", 10, 45_000);

    let ticket = service.book(1, with_passport(flight.id, "P1")).await.unwrap();
    assert_eq!(ticket.price, 45_000);
    assert_eq!(ticket.flight.as_ref().map(|f| f.flight_number.as_str()), Some("TM7"));

    flight.base_price = 99_000;
    store.insert_flight(flight);

    assert_eq!(store.ticket(ticket.id).unwrap().price, 45_000);
}

#[tokio::test]
async fn test_cancelling_twice_is_rejected_without_changes() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let flight = store.seed_flight("TM8", 3, 10_000);

    let ticket = service.book(1, with_passport(flight.id, "P1")).await.unwrap();
    service.cancel(1, ticket.id).await.unwrap();
    let before = store.ticket(ticket.id).unwrap();

    for _ in 0..2 {
        let err = service.cancel(1, ticket.id).await.unwrap_err();
        assert!(matches!(err, BookingError::AlreadyCancelled(id) if id == ticket.id));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    assert_eq!(store.ticket(ticket.id).unwrap(), before);
}

#[tokio::test]
async fn test_failed_insert_leaves_no_ticket() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let flight = store.seed_flight("TM9", 2, 10_000);

    store.fail_next_ticket_insert();
    let err = service.book(1, with_passport(flight.id, "P1")).await.unwrap_err();

    assert!(matches!(err, BookingError::Store { .. }));
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert_eq!(store.active_ticket_count(flight.id), 0);
    assert_eq!(store.ticket_count(), 0);

    // The profile is resolved outside the unit of work and survives; a retry succeeds.
    assert_eq!(store.passenger_count(), 1);
    service.book(1, BookingRequest::new(flight.id)).await.unwrap();
    assert_eq!(store.active_ticket_count(flight.id), 1);
}

#[tokio::test]
async fn test_failed_commit_leaves_no_ticket() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let flight = store.seed_flight("TM10", 2, 10_000);

    store.fail_next_commit();
    let err = service.book(1, with_passport(flight.id, "P1")).await.unwrap_err();

    assert!(matches!(err, BookingError::Transaction { phase: TxPhase::Commit, .. }));
    assert_eq!(store.ticket_count(), 0);
}

#[tokio::test]
async fn test_deadline_expiry_rolls_back() {
    let store = Arc::new(InMemoryStore::new());
    let transactions =
        TransactionManager::new(Arc::clone(&store)).with_timeout(Duration::from_millis(50));
    let service = booking_service_with(&store, transactions);
    let flight = store.seed_flight("TM11", 2, 10_000);

    store.delay_ticket_insert(Duration::from_millis(500));
    let err = service.book(1, with_passport(flight.id, "P1")).await.unwrap_err();

    assert!(matches!(err, BookingError::TimedOut(_)));
    assert_eq!(store.ticket_count(), 0);
}

#[tokio::test]
async fn test_unavailable_store_is_infrastructure_failure() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let flight = store.seed_flight("TM12", 2, 10_000);

    store.set_unavailable(true);
    let err = service.book(1, with_passport(flight.id, "P1")).await.unwrap_err();

    assert!(matches!(err, BookingError::Transaction { phase: TxPhase::Begin, .. }));
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
}

#[tokio::test]
async fn test_profile_is_created_once_and_reused() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let flight = store.seed_flight("TM13", 5, 10_000);

    let first = service.book(7, with_passport(flight.id, "P1")).await.unwrap();
    assert_eq!(store.passenger_count(), 1);

    let second = service.book(7, BookingRequest::new(flight.id)).await.unwrap();
    assert_eq!(store.passenger_count(), 1);
    assert_eq!(first.passenger_id, second.passenger_id);
}

#[tokio::test]
async fn test_first_booking_requires_passport() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let flight = store.seed_flight("TM14", 5, 10_000);

    let blank = BookingRequest::new(flight.id).with_passport("   ", "");
    for request in [BookingRequest::new(flight.id), blank] {
        let err = service.book(7, request).await.unwrap_err();
        assert!(matches!(err, BookingError::ProfileRequired));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    assert_eq!(store.passenger_count(), 0);
    assert_eq!(store.ticket_count(), 0);
}

#[tokio::test]
async fn test_unknown_flight() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);

    let err = service.book(7, with_passport(404, "P1")).await.unwrap_err();
    assert!(matches!(err, BookingError::FlightNotFound(404)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_only_the_owner_may_cancel_or_see_baggage() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let flight = store.seed_flight("TM15", 5, 10_000);

    let ticket = service.book(1, with_passport(flight.id, "OWNER")).await.unwrap();
    store.add_baggage(ticket.id, "BAG-0001");

    // Caller without any profile.
    let err = service.cancel(2, ticket.id).await.unwrap_err();
    assert!(matches!(err, BookingError::Unauthorized(_)));

    // Caller with a profile of their own.
    service.book(3, with_passport(flight.id, "OTHER")).await.unwrap();
    let err = service.cancel(3, ticket.id).await.unwrap_err();
    assert!(matches!(err, BookingError::Unauthorized(_)));
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = service.my_baggage(3, Some(ticket.id)).await.unwrap_err();
    assert!(matches!(err, BookingError::Unauthorized(_)));

    assert_eq!(store.ticket(ticket.id).unwrap().status, TicketStatus::Active);
}

#[tokio::test]
async fn test_cancel_unknown_ticket() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);

    let err = service.cancel(1, 999).await.unwrap_err();
    assert!(matches!(err, BookingError::TicketNotFound(999)));
}

#[tokio::test]
async fn test_my_bookings() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let outbound = store.seed_flight("TM16", 5, 10_000);
    let inbound = store.seed_flight("TM17", 5, 11_000);

    assert!(service.my_bookings(1).await.unwrap().is_empty());

    let first = service.book(1, with_passport(outbound.id, "P1")).await.unwrap();
    let second = service.book(1, BookingRequest::new(inbound.id)).await.unwrap();
    service.cancel(1, first.id).await.unwrap();
    service.book(2, with_passport(outbound.id, "P2")).await.unwrap();

    let bookings = service.my_bookings(1).await.unwrap();
    assert_eq!(bookings.len(), 2);
    assert_eq!(bookings[0].id, first.id);
    assert_eq!(bookings[0].status, TicketStatus::Cancelled);
    assert_eq!(bookings[1].id, second.id);
    assert_eq!(bookings[1].flight.as_ref().unwrap().flight_number, "TM17");
}

#[tokio::test]
async fn test_my_baggage_aggregates_all_tickets() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let outbound = store.seed_flight("TM18", 5, 10_000);
    let inbound = store.seed_flight("TM19", 5, 10_000);

    assert!(service.my_baggage(1, None).await.unwrap().is_empty());

    let first = service.book(1, with_passport(outbound.id, "P1")).await.unwrap();
    let second = service.book(1, BookingRequest::new(inbound.id)).await.unwrap();
    store.add_baggage(first.id, "BAG-A");
    store.add_baggage(second.id, "BAG-B");
    store.add_baggage(second.id, "BAG-C");

    let all = service.my_baggage(1, None).await.unwrap();
    let tags: Vec<&str> = all.iter().map(|b| b.tag_code.as_str()).collect();
    assert_eq!(tags, vec!["BAG-A", "BAG-B", "BAG-C"]);

    let only_second = service.my_baggage(1, Some(second.id)).await.unwrap();
    assert_eq!(only_second.len(), 2);

    let err = service.my_baggage(1, Some(999)).await.unwrap_err();
    assert!(matches!(err, BookingError::TicketNotFound(999)));
}

#[tokio::test]
async fn test_my_baggage_does_not_return_partial_results() {
    let store = Arc::new(InMemoryStore::new());
    let service = booking_service(&store);
    let outbound = store.seed_flight("TM20", 5, 10_000);
    let inbound = store.seed_flight("TM21", 5, 10_000);

    let first = service.book(1, with_passport(outbound.id, "P1")).await.unwrap();
    let second = service.book(1, BookingRequest::new(inbound.id)).await.unwrap();
    store.add_baggage(first.id, "BAG-A");
    store.fail_baggage_lookup(second.id);

    let err = service.my_baggage(1, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
}

#[tokio::test]
async fn test_flight_availability_tracks_active_tickets() {
    let store = Arc::new(InMemoryStore::new());
    let bookings = booking_service(&store);
    let catalog: FlightService<InMemoryStore> = FlightService::new(store.clone(), store.clone());
    let flight = store.seed_flight("TM22", 2, 10_000);

    let ticket = bookings.book(1, with_passport(flight.id, "P1")).await.unwrap();
    assert_eq!(catalog.availability(flight.id).await.unwrap().seats_remaining, 1);

    bookings.cancel(1, ticket.id).await.unwrap();
    assert_eq!(catalog.availability(flight.id).await.unwrap().seats_remaining, 2);

    let results = catalog
        .search(FlightQuery::parse(Some("ala"), Some("nqz"), None).unwrap())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].flight.id, flight.id);

    let err = catalog.availability(404).await.unwrap_err();
    assert!(matches!(err, BookingError::FlightNotFound(404)));
}

/// Another request created the profile between our lookup and our insert.
struct LosingProfileRace;

#[async_trait]
impl PassengerRepository for LosingProfileRace {
    async fn find_by_account(&self, _account_id: i64) -> Result<Option<PassengerProfile>, StoreError> {
        Ok(None)
    }

    async fn create(&self, _passenger: NewPassenger) -> Result<PassengerProfile, StoreError> {
        Err(StoreError::UniqueViolation("passengers_account_id_key".to_string()))
    }
}

#[tokio::test]
async fn test_concurrent_first_booking_surfaces_duplicate_profile() {
    let store = Arc::new(InMemoryStore::new());
    let service = BookingService::new(
        TransactionManager::new(Arc::clone(&store)),
        store.clone(),
        store.clone(),
        PassengerService::new(Arc::new(LosingProfileRace)),
        store.clone(),
    );
    let flight = store.seed_flight("TM23", 5, 10_000);

    let err = service.book(9, with_passport(flight.id, "P9")).await.unwrap_err();

    assert!(matches!(err, BookingError::DuplicateProfile(9)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.ticket_count(), 0);
    assert_eq!(store.active_ticket_count(flight.id), 0);
}
