use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Baggage row owned by the airport-operations subsystem; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaggageItem {
    pub id: i64,
    pub ticket_id: i64,
    pub tag_code: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}
