use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleRequest {
    pub id: String,
    pub booking_id: String,
    pub requested_date: NaiveDate,
    pub requested_time: NaiveTime,
    pub reason: Option<String>,
    pub status: RescheduleStatus,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RescheduleStatus {
    Pending,
    Approved,
    Rejected,
}

impl RescheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RescheduleStatus::Pending => "pending",
            RescheduleStatus::Approved => "approved",
            RescheduleStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RescheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RescheduleStatus::Pending),
            "approved" => Ok(RescheduleStatus::Approved),
            "rejected" => Ok(RescheduleStatus::Rejected),
            other => Err(format!("unknown reschedule status: {other}")),
        }
    }
}

/// What an approved reschedule moved, returned to the approving admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleOutcome {
    pub booking_id: String,
    pub request_id: String,
    pub old_date: NaiveDate,
    pub old_time: NaiveTime,
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub old_slot_id: Option<String>,
    pub new_slot_id: String,
}
