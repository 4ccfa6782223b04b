use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{SlotAvailability, SlotBookingStatus, TimeRange, TimeSlot};
use crate::state::AppState;

const MAX_BULK_DAYS: i64 = 366;

pub fn find_available(
    conn: &Connection,
    date: NaiveDate,
    start_time: NaiveTime,
) -> Result<Option<TimeSlot>, AppError> {
    Ok(queries::find_available_slot(conn, date, start_time)?)
}

/// Fails with `SlotUnavailable` if someone already holds the slot.
pub fn occupy(
    conn: &Connection,
    slot_id: &str,
    booking_reference: &str,
    status: SlotBookingStatus,
) -> Result<(), AppError> {
    let claimed = queries::occupy_slot(conn, slot_id, booking_reference, status, Utc::now())?;
    if claimed == 0 {
        return Err(AppError::slot_unavailable());
    }
    tracing::debug!(slot_id, booking_reference, "slot occupied");
    Ok(())
}

pub fn release(conn: &Connection, slot_id: &str, booking_reference: &str) -> Result<(), AppError> {
    let released = queries::release_slot(conn, slot_id, booking_reference, Utc::now())?;
    if released == 0 {
        tracing::warn!(slot_id, booking_reference, "slot was not held by booking");
    } else {
        tracing::debug!(slot_id, booking_reference, "slot released");
    }
    Ok(())
}

pub fn bulk_create(
    conn: &mut Connection,
    dates: &[NaiveDate],
    ranges: &[TimeRange],
) -> Result<usize, AppError> {
    if let Some(bad) = ranges.iter().find(|r| !r.is_valid()) {
        return Err(AppError::Validation(format!(
            "time range {}-{} ends before it starts",
            bad.start.format("%H:%M"),
            bad.end.format("%H:%M")
        )));
    }

    let tx = db::begin_write(conn)?;
    let now = Utc::now();
    let mut created = 0;
    for date in dates {
        for range in ranges {
            if queries::insert_slot(&tx, *date, range, now)? {
                created += 1;
            }
        }
    }
    tx.commit()?;

    Ok(created)
}

/// Expands an inclusive date range, optionally keeping only some weekdays.
pub fn expand_dates(
    start: NaiveDate,
    end: NaiveDate,
    weekdays: Option<&[Weekday]>,
) -> Result<Vec<NaiveDate>, AppError> {
    if end < start {
        return Err(AppError::Validation(
            "end_date must not be before start_date".to_string(),
        ));
    }
    if (end - start).num_days() >= MAX_BULK_DAYS {
        return Err(AppError::Validation(format!(
            "date range is limited to {MAX_BULK_DAYS} days"
        )));
    }

    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| weekdays.map_or(true, |days| days.contains(&d.weekday())))
        .collect())
}

pub fn delete(conn: &mut Connection, slot_id: &str) -> Result<(), AppError> {
    let tx = db::begin_write(conn)?;
    if queries::get_slot(&tx, slot_id)?.is_none() {
        return Err(AppError::NotFound(format!("time slot {slot_id} not found")));
    }
    if queries::delete_available_slot(&tx, slot_id)? == 0 {
        return Err(AppError::SlotUnavailable(
            "Time slot is booked and cannot be removed".to_string(),
        ));
    }
    tx.commit()?;
    Ok(())
}

pub fn availability_for(conn: &Connection, date: NaiveDate) -> Result<Vec<SlotAvailability>, AppError> {
    Ok(queries::slots_for_date(conn, date)?
        .into_iter()
        .map(SlotAvailability::from)
        .collect())
}

// ── Operations ──

pub async fn query_availability(
    state: &Arc<AppState>,
    date: NaiveDate,
) -> Result<Vec<SlotAvailability>, AppError> {
    state.db.run(move |conn| availability_for(conn, date)).await
}

pub async fn bulk_create_slots(
    state: &Arc<AppState>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    weekdays: Option<Vec<Weekday>>,
    ranges: Vec<TimeRange>,
) -> Result<usize, AppError> {
    let dates = expand_dates(start_date, end_date, weekdays.as_deref())?;
    let created = state
        .db
        .run(move |conn| bulk_create(conn, &dates, &ranges))
        .await?;
    tracing::info!(%start_date, %end_date, created, "bulk created time slots");
    Ok(created)
}

pub async fn delete_slot(state: &Arc<AppState>, slot_id: String) -> Result<(), AppError> {
    let id = slot_id.clone();
    state.db.run(move |conn| delete(conn, &id)).await?;
    tracing::info!(slot_id = %slot_id, "time slot removed");
    Ok(())
}
