use std::fmt;
use std::time::Duration;

/// Failure reported by a store adapter (Postgres, in-memory).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Malformed row: {0}")]
    Decode(String),
}

/// Coarse classification used by callers to tell expected business outcomes
/// apart from infrastructure faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    Validation,
    Infrastructure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxPhase::Begin => write!(f, "begin"),
            TxPhase::Commit => write!(f, "commit"),
            TxPhase::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Passenger profile required: please provide passport_no and phone")]
    ProfileRequired,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Flight not found: {0}")]
    FlightNotFound(i64),

    #[error("Flight {flight_id} is full ({total_seats} seats)")]
    FlightFull { flight_id: i64, total_seats: i32 },

    #[error("Ticket not found: {0}")]
    TicketNotFound(i64),

    #[error("Unauthorized to access ticket {0}")]
    Unauthorized(i64),

    #[error("Ticket {0} is already cancelled")]
    AlreadyCancelled(i64),

    #[error("Passenger profile already exists for account {0}")]
    DuplicateProfile(i64),

    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Transaction {phase} failed: {source}")]
    Transaction {
        phase: TxPhase,
        #[source]
        source: StoreError,
    },

    #[error("Unit of work exceeded its deadline of {0:?}")]
    TimedOut(Duration),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::FlightNotFound(_) | BookingError::TicketNotFound(_) => ErrorKind::NotFound,
            BookingError::FlightFull { .. }
            | BookingError::AlreadyCancelled(_)
            | BookingError::DuplicateProfile(_) => ErrorKind::Conflict,
            BookingError::Unauthorized(_) => ErrorKind::Forbidden,
            BookingError::ProfileRequired | BookingError::InvalidRequest(_) => ErrorKind::Validation,
            BookingError::Store { .. }
            | BookingError::Transaction { .. }
            | BookingError::TimedOut(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Attach operation context to a store result.
pub trait StoreResultExt<T> {
    fn context(self, context: &'static str) -> Result<T, BookingError>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn context(self, context: &'static str) -> Result<T, BookingError> {
        self.map_err(|source| BookingError::Store { context, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_not_infrastructure() {
        assert_eq!(BookingError::ProfileRequired.kind(), ErrorKind::Validation);
        assert_eq!(BookingError::FlightNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(
            BookingError::FlightFull { flight_id: 1, total_seats: 2 }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(BookingError::AlreadyCancelled(3).kind(), ErrorKind::Conflict);
        assert_eq!(BookingError::DuplicateProfile(4).kind(), ErrorKind::Conflict);
        assert_eq!(BookingError::Unauthorized(5).kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_store_context_is_kept() {
        let result: Result<(), StoreError> = Err(StoreError::Unavailable("pool closed".into()));
        let err = result.context("failed to count tickets").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.to_string(), "failed to count tickets: Store unavailable: pool closed");
    }
}
