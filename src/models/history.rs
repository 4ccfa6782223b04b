use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BookingStatus;

/// Append-only audit row. The table rejects updates and deletes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
    pub id: String,
    pub booking_id: String,
    pub from_status: BookingStatus,
    pub to_status: BookingStatus,
    pub changed_by: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry<'a> {
    pub booking_id: &'a str,
    pub from_status: BookingStatus,
    pub to_status: BookingStatus,
    pub changed_by: &'a str,
    pub reason: Option<&'a str>,
    pub notes: Option<&'a str>,
}
