use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::baggage::BaggageItem;
use crate::error::{BookingError, StoreResultExt};
use crate::flight::FlightSummary;
use crate::passenger::{PassengerProfile, PassengerService};
use crate::repository::{BaggageLookup, FlightReader, Scope, TicketStore};
use crate::ticket::{NewTicket, Ticket, TicketStatus};
use crate::transaction::{TransactionBackend, TransactionManager};

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub flight_id: i64,
    /// Required only when the account has no passenger profile yet.
    #[serde(default)]
    pub passport_no: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl BookingRequest {
    pub fn new(flight_id: i64) -> Self {
        Self { flight_id, passport_no: None, phone: None }
    }

    pub fn with_passport(mut self, passport_no: &str, phone: &str) -> Self {
        self.passport_no = Some(passport_no.to_string());
        self.phone = Some(phone.to_string());
        self
    }

    fn passport(&self) -> Option<&str> {
        self.passport_no.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Booking use cases as seen by the outer layers.
#[async_trait]
pub trait Bookings: Send + Sync {
    async fn book(&self, account_id: i64, request: BookingRequest) -> Result<Ticket, BookingError>;
    async fn cancel(&self, account_id: i64, ticket_id: i64) -> Result<(), BookingError>;
    async fn my_bookings(&self, account_id: i64) -> Result<Vec<Ticket>, BookingError>;
    async fn my_baggage(
        &self,
        account_id: i64,
        ticket_id: Option<i64>,
    ) -> Result<Vec<BaggageItem>, BookingError>;
}

/// Orchestrates passenger resolution, capacity-checked ticket creation,
/// cancellation and baggage aggregation.
pub struct BookingService<B: TransactionBackend> {
    transactions: TransactionManager<B>,
    flights: Arc<dyn FlightReader<B::Tx>>,
    tickets: Arc<dyn TicketStore<B::Tx>>,
    passengers: PassengerService,
    baggage: Arc<dyn BaggageLookup>,
}

impl<B: TransactionBackend> BookingService<B> {
    pub fn new(
        transactions: TransactionManager<B>,
        flights: Arc<dyn FlightReader<B::Tx>>,
        tickets: Arc<dyn TicketStore<B::Tx>>,
        passengers: PassengerService,
        baggage: Arc<dyn BaggageLookup>,
    ) -> Self {
        Self {
            transactions,
            flights,
            tickets,
            passengers,
            baggage,
        }
    }

    /// Existing profile, or a new one when the request carries passport data.
    async fn resolve_passenger(
        &self,
        account_id: i64,
        request: &BookingRequest,
    ) -> Result<PassengerProfile, BookingError> {
        if let Some(profile) = self.passengers.get_profile(account_id).await? {
            return Ok(profile);
        }

        let passport = request.passport().ok_or(BookingError::ProfileRequired)?;
        let phone = request.phone.as_deref().unwrap_or_default();
        self.passengers.create_profile(account_id, passport, phone).await
    }

    async fn owned_ticket(&self, profile: &PassengerProfile, ticket_id: i64) -> Result<Ticket, BookingError> {
        let ticket = self
            .tickets
            .get_ticket(Scope::Detached, ticket_id)
            .await
            .context("failed to get ticket")?
            .ok_or(BookingError::TicketNotFound(ticket_id))?;

        if ticket.passenger_id != profile.id {
            return Err(BookingError::Unauthorized(ticket_id));
        }
        Ok(ticket)
    }
}

#[async_trait]
impl<B: TransactionBackend> Bookings for BookingService<B> {
    #[instrument(skip(self, request), fields(flight_id = request.flight_id))]
    async fn book(&self, account_id: i64, request: BookingRequest) -> Result<Ticket, BookingError> {
        let passenger = self.resolve_passenger(account_id, &request).await?;

        let flights = Arc::clone(&self.flights);
        let tickets = Arc::clone(&self.tickets);
        let flight_id = request.flight_id;
        let passenger_id = passenger.id;

        let result = self
            .transactions
            .run(move |tx| {
                Box::pin(async move {
                    let flight = flights
                        .get_flight(Scope::Transaction(&mut *tx), flight_id)
                        .await
                        .context("failed to get flight")?
                        .ok_or(BookingError::FlightNotFound(flight_id))?;

                    let active = tickets
                        .count_active(Scope::Transaction(&mut *tx), flight_id)
                        .await
                        .context("failed to count tickets")?;

                    if active >= i64::from(flight.total_seats) {
                        return Err(BookingError::FlightFull {
                            flight_id,
                            total_seats: flight.total_seats,
                        });
                    }

                    let mut ticket = tickets
                        .create_ticket(
                            Scope::Transaction(&mut *tx),
                            NewTicket {
                                flight_id,
                                passenger_id,
                                seat_number: None,
                                price: flight.base_price,
                            },
                        )
                        .await
                        .context("failed to create ticket")?;

                    ticket.flight = Some(FlightSummary::from(&flight));
                    Ok(ticket)
                })
            })
            .await;

        match result {
            Ok(ticket) => {
                info!(ticket_id = ticket.id, passenger_id, price = ticket.price, "Ticket booked");
                Ok(ticket)
            }
            Err(err) => {
                warn!(passenger_id, error = %err, "Booking rejected");
                Err(err)
            }
        }
    }

    #[instrument(skip(self))]
    async fn cancel(&self, account_id: i64, ticket_id: i64) -> Result<(), BookingError> {
        let ticket = self
            .tickets
            .get_ticket(Scope::Detached, ticket_id)
            .await
            .context("failed to get ticket")?
            .ok_or(BookingError::TicketNotFound(ticket_id))?;

        let owner = self.passengers.get_profile(account_id).await?;
        if owner.map_or(true, |profile| profile.id != ticket.passenger_id) {
            return Err(BookingError::Unauthorized(ticket_id));
        }

        if ticket.status == TicketStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled(ticket_id));
        }

        self.tickets
            .cancel_ticket(Scope::Detached, ticket_id)
            .await
            .context("failed to cancel ticket")?;

        info!(flight_id = ticket.flight_id, "Ticket cancelled");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn my_bookings(&self, account_id: i64) -> Result<Vec<Ticket>, BookingError> {
        let Some(profile) = self.passengers.get_profile(account_id).await? else {
            return Ok(Vec::new());
        };

        self.tickets
            .tickets_for_passenger(Scope::Detached, profile.id)
            .await
            .context("failed to get bookings")
    }

    #[instrument(skip(self))]
    async fn my_baggage(
        &self,
        account_id: i64,
        ticket_id: Option<i64>,
    ) -> Result<Vec<BaggageItem>, BookingError> {
        let Some(profile) = self.passengers.get_profile(account_id).await? else {
            return Ok(Vec::new());
        };

        let ticket_ids: Vec<i64> = match ticket_id {
            Some(id) => vec![self.owned_ticket(&profile, id).await?.id],
            None => self
                .tickets
                .tickets_for_passenger(Scope::Detached, profile.id)
                .await
                .context("failed to get bookings")?
                .into_iter()
                .map(|ticket| ticket.id)
                .collect(),
        };

        let mut baggage = Vec::new();
        for id in ticket_ids {
            let items = self
                .baggage
                .baggage_for_ticket(id)
                .await
                .context("failed to get baggage for ticket")?;
            baggage.extend(items);
        }
        Ok(baggage)
    }
}
