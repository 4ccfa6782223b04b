use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub reference: String,
    pub customer_id: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_start_time: NaiveTime,
    pub scheduled_end_time: NaiveTime,
    pub status: BookingStatus,
    pub time_slot_id: Option<String>,
    /// Quoted by the pricing service; stored as-is.
    pub total_price_cents: i64,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new booking. The slot is looked up by date and start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub customer_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub total_price_cents: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Processing,
    PaymentFailed,
    Confirmed,
    Rescheduled,
    InProgress,
    Completed,
    Declined,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 10] = [
        BookingStatus::Pending,
        BookingStatus::Processing,
        BookingStatus::PaymentFailed,
        BookingStatus::Confirmed,
        BookingStatus::Rescheduled,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Declined,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Processing => "processing",
            BookingStatus::PaymentFailed => "payment_failed",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rescheduled => "rescheduled",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Declined => "declined",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Work is committed or underway; stopping it deserves a second look.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            BookingStatus::Processing
                | BookingStatus::Confirmed
                | BookingStatus::Rescheduled
                | BookingStatus::InProgress
        )
    }

    /// States in which the booking no longer holds a calendar slot.
    pub fn releases_slot(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Declined | BookingStatus::NoShow
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown booking status: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}
