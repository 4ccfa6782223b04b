use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    pub id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub booking_reference: Option<String>,
    pub booking_status: Option<SlotBookingStatus>,
}

/// Coarse copy of the occupying booking's state, kept on the slot for calendar views.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotBookingStatus {
    Confirmed,
    Completed,
}

impl SlotBookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotBookingStatus::Confirmed => "confirmed",
            SlotBookingStatus::Completed => "completed",
        }
    }
}

impl FromStr for SlotBookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(SlotBookingStatus::Confirmed),
            "completed" => Ok(SlotBookingStatus::Completed),
            other => Err(format!("unknown slot booking status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }
}

/// One row of the public availability listing for a day.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotAvailability {
    pub slot_id: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

impl From<TimeSlot> for SlotAvailability {
    fn from(slot: TimeSlot) -> Self {
        Self {
            slot_id: slot.id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            is_available: slot.is_available,
        }
    }
}
