use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tarmac_core::{BaggageItem, BaggageLookup, StoreError};

use crate::errors::map_sqlx_error;

#[derive(sqlx::FromRow)]
struct BaggageRow {
    id: i64,
    ticket_id: i64,
    tag_code: String,
    status: String,
    updated_at: DateTime<Utc>,
}

pub struct PgBaggageRepository {
    pool: PgPool,
}

impl PgBaggageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaggageLookup for PgBaggageRepository {
    async fn baggage_for_ticket(&self, ticket_id: i64) -> Result<Vec<BaggageItem>, StoreError> {
        let rows = sqlx::query_as::<_, BaggageRow>(
            "SELECT id, ticket_id, tag_code, status, updated_at FROM baggage WHERE ticket_id = $1 ORDER BY id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| BaggageItem {
                id: row.id,
                ticket_id: row.ticket_id,
                tag_code: row.tag_code,
                status: row.status,
                updated_at: row.updated_at,
            })
            .collect())
    }
}
