use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{
    Booking, BookingStatus, NewBooking, NewHistoryEntry, PaymentStatus, SlotBookingStatus,
    StatusHistoryEntry,
};
use crate::services::notify::{self, NoticeKind, StatusNotice};
use crate::services::slots;
use crate::services::status_machine::{self, TransitionContext};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct TransitionCommand {
    pub status: BookingStatus,
    pub changed_by: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    /// Caller has seen and accepted the state machine's warning, if any.
    pub confirm: bool,
}

pub fn create(conn: &mut Connection, new: &NewBooking) -> Result<Booking, AppError> {
    if new.customer_id.trim().is_empty() {
        return Err(AppError::Validation("customer_id is required".to_string()));
    }
    if new.total_price_cents < 0 {
        return Err(AppError::Validation(
            "total_price_cents must not be negative".to_string(),
        ));
    }

    let tx = db::begin_write(conn)?;
    let slot = slots::find_available(&tx, new.date, new.start_time)?
        .ok_or_else(AppError::slot_unavailable)?;

    let now = Utc::now();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        reference: generate_reference(),
        customer_id: new.customer_id.trim().to_string(),
        scheduled_date: slot.date,
        scheduled_start_time: slot.start_time,
        scheduled_end_time: slot.end_time,
        status: BookingStatus::Pending,
        time_slot_id: Some(slot.id.clone()),
        total_price_cents: new.total_price_cents,
        payment_status: PaymentStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    queries::insert_booking(&tx, &booking)?;
    slots::occupy(&tx, &slot.id, &booking.reference, SlotBookingStatus::Confirmed)?;
    tx.commit()?;

    Ok(booking)
}

pub fn find(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))
}

pub fn transition(
    conn: &mut Connection,
    booking_id: &str,
    cmd: &TransitionCommand,
) -> Result<(Booking, BookingStatus), AppError> {
    let tx = db::begin_write(conn)?;
    let booking = find(&tx, booking_id)?;

    let context = TransitionContext {
        payment_completed: booking.payment_status == PaymentStatus::Paid,
        service_started: queries::has_entered_status(&tx, booking_id, BookingStatus::InProgress)?,
    };
    let verdict = status_machine::validate(booking.status, cmd.status, &context);
    if !verdict.valid {
        return Err(AppError::InvalidState(format!(
            "cannot move booking from {} to {}: {}",
            booking.status,
            cmd.status,
            verdict.reason.as_deref().unwrap_or("illegal transition")
        )));
    }
    if verdict.requires_confirmation && !cmd.confirm {
        return Err(AppError::ConfirmationRequired(
            verdict.warning.unwrap_or_default(),
        ));
    }

    let now = Utc::now();
    let mut slot_id = booking.time_slot_id.clone();

    if cmd.status.releases_slot() {
        if let Some(id) = slot_id.take() {
            slots::release(&tx, &id, &booking.reference)?;
        }
    } else if slot_id.is_none() {
        // Reopened bookings take their old calendar position back, if it is still free.
        let slot = slots::find_available(&tx, booking.scheduled_date, booking.scheduled_start_time)?
            .ok_or_else(AppError::slot_unavailable)?;
        slots::occupy(&tx, &slot.id, &booking.reference, SlotBookingStatus::Confirmed)?;
        slot_id = Some(slot.id);
    } else if cmd.status == BookingStatus::Completed {
        if let Some(id) = &slot_id {
            queries::update_slot_booking_status(&tx, id, SlotBookingStatus::Completed, now)?;
        }
    }

    queries::update_booking_status(&tx, booking_id, cmd.status, slot_id.as_deref(), now)?;
    queries::insert_history(
        &tx,
        &NewHistoryEntry {
            booking_id,
            from_status: booking.status,
            to_status: cmd.status,
            changed_by: &cmd.changed_by,
            reason: cmd.reason.as_deref(),
            notes: cmd.notes.as_deref().or(verdict.warning.as_deref()),
        },
        now,
    )?;
    let updated = find(&tx, booking_id)?;
    tx.commit()?;

    Ok((updated, booking.status))
}

pub fn record_payment_status(
    conn: &mut Connection,
    booking_id: &str,
    payment_status: PaymentStatus,
) -> Result<Booking, AppError> {
    let tx = db::begin_write(conn)?;
    if queries::update_payment_status(&tx, booking_id, payment_status, Utc::now())? == 0 {
        return Err(AppError::NotFound(format!("booking {booking_id} not found")));
    }
    let booking = find(&tx, booking_id)?;
    tx.commit()?;
    Ok(booking)
}

fn generate_reference() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("BK-{}", id[..8].to_uppercase())
}

// ── Operations ──

pub async fn create_booking(state: &Arc<AppState>, new: NewBooking) -> Result<Booking, AppError> {
    let booking = state.db.run(move |conn| create(conn, &new)).await?;
    tracing::info!(
        booking_id = %booking.id,
        reference = %booking.reference,
        slot_id = ?booking.time_slot_id,
        "booking created"
    );
    Ok(booking)
}

/// A caller identity that does not own the booking sees `NotFound`.
pub async fn get_booking(
    state: &Arc<AppState>,
    id: String,
    customer_id: Option<String>,
) -> Result<Booking, AppError> {
    state
        .db
        .run(move |conn| {
            let booking = find(conn, &id)?;
            match customer_id {
                Some(caller) if caller != booking.customer_id => {
                    Err(AppError::NotFound(format!("booking {id} not found")))
                }
                _ => Ok(booking),
            }
        })
        .await
}

pub async fn list_bookings(
    state: &Arc<AppState>,
    status: Option<BookingStatus>,
    limit: i64,
) -> Result<Vec<Booking>, AppError> {
    state
        .db
        .run(move |conn| Ok(queries::list_bookings(conn, status, limit)?))
        .await
}

pub async fn transition_status(
    state: &Arc<AppState>,
    booking_id: String,
    cmd: TransitionCommand,
) -> Result<Booking, AppError> {
    let note = cmd.reason.clone();
    let (booking, old_status) = state
        .db
        .run(move |conn| transition(conn, &booking_id, &cmd))
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        from = %old_status,
        to = %booking.status,
        "booking status changed"
    );
    notify::dispatch(
        state.notifier.clone(),
        StatusNotice::new(NoticeKind::StatusChanged, booking.clone(), old_status, note),
    );
    Ok(booking)
}

/// Soft delete: cancels the booking and frees its slot.
pub async fn delete_booking(
    state: &Arc<AppState>,
    booking_id: String,
    changed_by: String,
) -> Result<Booking, AppError> {
    let cmd = TransitionCommand {
        status: BookingStatus::Cancelled,
        changed_by,
        reason: Some("booking deleted".to_string()),
        notes: None,
        confirm: true,
    };
    transition_status(state, booking_id, cmd).await
}

pub async fn record_payment(
    state: &Arc<AppState>,
    booking_id: String,
    payment_status: PaymentStatus,
) -> Result<Booking, AppError> {
    let booking = state
        .db
        .run(move |conn| record_payment_status(conn, &booking_id, payment_status))
        .await?;
    tracing::info!(booking_id = %booking.id, payment_status = payment_status.as_str(), "payment recorded");
    Ok(booking)
}

pub async fn booking_history(
    state: &Arc<AppState>,
    booking_id: String,
) -> Result<Vec<StatusHistoryEntry>, AppError> {
    state
        .db
        .run(move |conn| {
            find(conn, &booking_id)?;
            Ok(queries::history_for_booking(conn, &booking_id)?)
        })
        .await
}
