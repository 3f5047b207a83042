pub mod app_config;
pub mod baggage_repo;
pub mod database;
pub mod errors;
pub mod flight_repo;
pub mod passenger_repo;
pub mod ticket_repo;
pub mod transaction;

pub use baggage_repo::PgBaggageRepository;
pub use database::DbClient;
pub use flight_repo::PgFlightRepository;
pub use passenger_repo::PgPassengerRepository;
pub use ticket_repo::PgTicketRepository;
pub use transaction::{PgTransactions, PgTx};
