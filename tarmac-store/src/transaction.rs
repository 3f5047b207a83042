use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tarmac_core::{StoreError, TransactionBackend};

use crate::errors::map_sqlx_error;

/// Open Postgres transaction. Dropping it without commit rolls back.
pub type PgTx = sqlx::Transaction<'static, Postgres>;

/// Postgres transactions at the server default isolation (READ COMMITTED).
/// Capacity checks rely on the flight row lock taken by
/// [`PgFlightRepository`](crate::PgFlightRepository) inside the transaction.
pub struct PgTransactions {
    pool: PgPool,
}

impl PgTransactions {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionBackend for PgTransactions {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        self.pool.begin().await.map_err(map_sqlx_error)
    }

    async fn commit(&self, tx: PgTx) -> Result<(), StoreError> {
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(&self, tx: PgTx) -> Result<(), StoreError> {
        tx.rollback().await.map_err(map_sqlx_error)
    }
}
