use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tarmac_shared::Masked;
use tracing::info;

use crate::error::{BookingError, StoreError, StoreResultExt};
use crate::repository::PassengerRepository;

/// Booking identity of an account. One per account; immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassengerProfile {
    pub id: i64,
    pub account_id: i64,
    pub passport_number: Masked<String>,
    pub phone: Masked<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPassenger {
    pub account_id: i64,
    pub passport_number: Masked<String>,
    pub phone: Masked<String>,
}

/// Maps authenticated accounts to passenger profiles.
#[derive(Clone)]
pub struct PassengerService {
    repo: Arc<dyn PassengerRepository>,
}

impl PassengerService {
    pub fn new(repo: Arc<dyn PassengerRepository>) -> Self {
        Self { repo }
    }

    /// Absent profile is `Ok(None)`, not an error.
    pub async fn get_profile(&self, account_id: i64) -> Result<Option<PassengerProfile>, BookingError> {
        self.repo
            .find_by_account(account_id)
            .await
            .context("failed to check passenger profile")
    }

    /// Create the profile for `account_id`. A concurrent creation for the same
    /// account surfaces as [`BookingError::DuplicateProfile`].
    pub async fn create_profile(
        &self,
        account_id: i64,
        passport_number: &str,
        phone: &str,
    ) -> Result<PassengerProfile, BookingError> {
        let passenger = NewPassenger {
            account_id,
            passport_number: Masked::from(passport_number),
            phone: Masked::from(phone),
        };

        let profile = self.repo.create(passenger).await.map_err(|err| match err {
            StoreError::UniqueViolation(_) => BookingError::DuplicateProfile(account_id),
            source => BookingError::Store {
                context: "failed to create passenger profile",
                source,
            },
        })?;

        info!(account_id, passenger_id = profile.id, "Passenger profile created");
        Ok(profile)
    }
}
