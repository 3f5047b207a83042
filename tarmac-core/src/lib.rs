pub mod baggage;
pub mod booking;
pub mod error;
pub mod flight;
pub mod memory;
pub mod passenger;
pub mod repository;
pub mod ticket;
pub mod transaction;

pub use baggage::BaggageItem;
pub use booking::{BookingRequest, BookingService, Bookings};
pub use error::{BookingError, ErrorKind, StoreError, StoreResultExt, TxPhase};
pub use flight::{Flight, FlightAvailability, FlightCatalog, FlightQuery, FlightService, FlightSummary};
pub use passenger::{NewPassenger, PassengerProfile, PassengerService};
pub use repository::{BaggageLookup, FlightReader, PassengerRepository, Scope, TicketStore};
pub use ticket::{NewTicket, Ticket, TicketStatus};
pub use transaction::{TransactionBackend, TransactionManager};

pub type BookingResult<T> = Result<T, BookingError>;
