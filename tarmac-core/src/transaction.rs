use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{BookingError, StoreError, TxPhase};

/// Lifecycle primitives of a store transaction.
///
/// Only [`TransactionManager`] calls these. Dropping a `Tx` without
/// committing must roll it back.
#[async_trait]
pub trait TransactionBackend: Send + Sync + 'static {
    type Tx: Send + 'static;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;
}

/// Runs units of work atomically against a [`TransactionBackend`].
pub struct TransactionManager<B: TransactionBackend> {
    backend: Arc<B>,
    timeout: Option<Duration>,
}

impl<B: TransactionBackend> Clone for TransactionManager<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            timeout: self.timeout,
        }
    }
}

impl<B: TransactionBackend> TransactionManager<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend, timeout: None }
    }

    /// Deadline applied to every unit of work; expiry rolls back.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Execute `work` inside a fresh transaction.
    ///
    /// Commits when `work` returns `Ok`. Rolls back when it returns `Err`,
    /// exceeds the deadline or panics; a panic is resumed after the rollback.
    /// Dropping the returned future drops the transaction, which rolls back.
    pub async fn run<T, F>(&self, work: F) -> Result<T, BookingError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut B::Tx) -> BoxFuture<'t, Result<T, BookingError>> + Send,
    {
        let mut tx = self
            .backend
            .begin()
            .await
            .map_err(|source| BookingError::Transaction { phase: TxPhase::Begin, source })?;

        let outcome = {
            let unit = AssertUnwindSafe(work(&mut tx)).catch_unwind();
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, unit).await {
                    Ok(outcome) => outcome,
                    Err(_) => Ok(Err(BookingError::TimedOut(limit))),
                },
                None => unit.await,
            }
        };

        match outcome {
            Ok(Ok(value)) => {
                self.backend
                    .commit(tx)
                    .await
                    .map_err(|source| BookingError::Transaction { phase: TxPhase::Commit, source })?;
                debug!("Transaction committed");
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(source) = self.backend.rollback(tx).await {
                    error!(error = %err, rollback_error = %source, "Rollback failed after unit of work error");
                    return Err(BookingError::Transaction { phase: TxPhase::Rollback, source });
                }
                debug!(error = %err, "Transaction rolled back");
                Err(err)
            }
            Err(panic) => {
                if let Err(source) = self.backend.rollback(tx).await {
                    error!(rollback_error = %source, "Rollback failed after unit of work panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
