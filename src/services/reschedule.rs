use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{
    Booking, BookingStatus, NewHistoryEntry, RescheduleOutcome, RescheduleStatus,
    SlotBookingStatus,
};
use crate::services::{slots, status_machine};

#[derive(Debug, Clone)]
pub struct ApproveReschedule {
    pub request_id: String,
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub admin_response: Option<String>,
    pub changed_by: String,
}

#[derive(Debug, Clone)]
pub struct Approval {
    pub outcome: RescheduleOutcome,
    pub booking: Booking,
    pub previous_status: BookingStatus,
}

pub fn approve(conn: &mut Connection, cmd: &ApproveReschedule) -> Result<Approval, AppError> {
    let tx = db::begin_write(conn)?;

    let request = queries::get_reschedule_request(&tx, &cmd.request_id)?
        .filter(|r| r.status == RescheduleStatus::Pending)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "reschedule request {} not found or already processed",
                cmd.request_id
            ))
        })?;

    let booking = queries::get_booking_by_id(&tx, &request.booking_id)?.ok_or_else(|| {
        AppError::NotFound(format!("booking {} not found", request.booking_id))
    })?;
    if !status_machine::can_reschedule(booking.status) {
        return Err(AppError::InvalidState(format!(
            "a {} booking cannot be rescheduled",
            booking.status
        )));
    }

    let target = slots::find_available(&tx, cmd.new_date, cmd.new_time)?
        .ok_or_else(AppError::slot_unavailable)?;

    let previous_slot_id = booking.time_slot_id.clone();
    let now = Utc::now();

    if queries::resolve_reschedule_request(
        &tx,
        &request.id,
        RescheduleStatus::Approved,
        cmd.admin_response.as_deref(),
        now,
    )? == 0
    {
        return Err(AppError::NotFound(format!(
            "reschedule request {} already processed",
            request.id
        )));
    }

    queries::apply_reschedule(&tx, &booking.id, &target, now)?;

    // The new slot is claimed before the old one is let go, so the booking's
    // slot pointer is never left without a backing reservation.
    slots::occupy(&tx, &target.id, &booking.reference, SlotBookingStatus::Confirmed)?;
    if let Some(previous) = previous_slot_id.as_deref() {
        slots::release(&tx, previous, &booking.reference)?;
    }

    let notes = describe_move(&booking, &target.date, &target.start_time, request.reason.as_deref());
    queries::insert_history(
        &tx,
        &NewHistoryEntry {
            booking_id: &booking.id,
            from_status: booking.status,
            to_status: BookingStatus::Rescheduled,
            changed_by: &cmd.changed_by,
            reason: Some("reschedule request approved"),
            notes: Some(&notes),
        },
        now,
    )?;

    let updated = queries::get_booking_by_id(&tx, &booking.id)?
        .ok_or_else(|| AppError::Internal(format!("booking {} vanished mid-transaction", booking.id)))?;
    tx.commit()?;

    Ok(Approval {
        outcome: RescheduleOutcome {
            booking_id: booking.id.clone(),
            request_id: request.id,
            old_date: booking.scheduled_date,
            old_time: booking.scheduled_start_time,
            new_date: target.date,
            new_time: target.start_time,
            old_slot_id: previous_slot_id,
            new_slot_id: target.id,
        },
        booking: updated,
        previous_status: booking.status,
    })
}

fn describe_move(
    booking: &Booking,
    new_date: &NaiveDate,
    new_time: &NaiveTime,
    customer_reason: Option<&str>,
) -> String {
    let mut notes = format!(
        "Rescheduled from {} {} to {} {}",
        booking.scheduled_date,
        booking.scheduled_start_time.format("%H:%M"),
        new_date,
        new_time.format("%H:%M"),
    );
    if let Some(reason) = customer_reason.filter(|r| !r.trim().is_empty()) {
        notes.push_str(&format!(". Customer reason: {reason}"));
    }
    notes
}
