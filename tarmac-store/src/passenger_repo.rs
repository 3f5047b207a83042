use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tarmac_core::{NewPassenger, PassengerProfile, PassengerRepository, StoreError};
use tarmac_shared::Masked;

use crate::errors::map_sqlx_error;

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: i64,
    account_id: i64,
    passport_no: String,
    phone: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PassengerRow> for PassengerProfile {
    fn from(row: PassengerRow) -> Self {
        PassengerProfile {
            id: row.id,
            account_id: row.account_id,
            passport_number: Masked::new(row.passport_no),
            phone: Masked::new(row.phone),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct PgPassengerRepository {
    pool: PgPool,
}

impl PgPassengerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PassengerRepository for PgPassengerRepository {
    async fn find_by_account(&self, account_id: i64) -> Result<Option<PassengerProfile>, StoreError> {
        let row = sqlx::query_as::<_, PassengerRow>(
            "SELECT id, account_id, passport_no, phone, created_at, updated_at FROM passengers WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PassengerProfile::from))
    }

    async fn create(&self, passenger: NewPassenger) -> Result<PassengerProfile, StoreError> {
        let row = sqlx::query_as::<_, PassengerRow>(
            r#"
            INSERT INTO passengers (account_id, passport_no, phone, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, account_id, passport_no, phone, created_at, updated_at
            "#,
        )
        .bind(passenger.account_id)
        .bind(passenger.passport_number.into_inner())
        .bind(passenger.phone.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(PassengerProfile::from(row))
    }
}
