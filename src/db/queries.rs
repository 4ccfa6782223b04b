use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{
    Booking, BookingStatus, NewHistoryEntry, PaymentStatus, RescheduleRequest, RescheduleStatus,
    SlotBookingStatus, StatusHistoryEntry, TimeRange, TimeSlot,
};

// ── Time Slots ──

const SLOT_COLUMNS: &str =
    "id, date, start_time, end_time, is_available, booking_reference, booking_status";

pub fn insert_slot(
    conn: &Connection,
    date: NaiveDate,
    range: &TimeRange,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO time_slots (id, date, start_time, end_time, is_available, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        params![uuid::Uuid::new_v4().to_string(), date, range.start, range.end, now],
    )?;
    Ok(count > 0)
}

pub fn get_slot(conn: &Connection, id: &str) -> rusqlite::Result<Option<TimeSlot>> {
    conn.query_row(
        &format!("SELECT {SLOT_COLUMNS} FROM time_slots WHERE id = ?1"),
        params![id],
        parse_slot_row,
    )
    .optional()
}

pub fn find_available_slot(
    conn: &Connection,
    date: NaiveDate,
    start_time: NaiveTime,
) -> rusqlite::Result<Option<TimeSlot>> {
    conn.query_row(
        &format!(
            "SELECT {SLOT_COLUMNS} FROM time_slots
             WHERE date = ?1 AND start_time = ?2 AND is_available = 1"
        ),
        params![date, start_time],
        parse_slot_row,
    )
    .optional()
}

pub fn slots_for_date(conn: &Connection, date: NaiveDate) -> rusqlite::Result<Vec<TimeSlot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLOT_COLUMNS} FROM time_slots WHERE date = ?1 ORDER BY start_time ASC"
    ))?;
    let rows = stmt.query_map(params![date], parse_slot_row)?;
    rows.collect()
}

/// Claims a slot only if it is still free. Returns the number of rows claimed (0 or 1).
pub fn occupy_slot(
    conn: &Connection,
    id: &str,
    booking_reference: &str,
    status: SlotBookingStatus,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE time_slots
         SET is_available = 0, booking_reference = ?1, booking_status = ?2, updated_at = ?3
         WHERE id = ?4 AND is_available = 1",
        params![booking_reference, status.as_str(), now, id],
    )
}

pub fn release_slot(
    conn: &Connection,
    id: &str,
    booking_reference: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE time_slots
         SET is_available = 1, booking_reference = NULL, booking_status = NULL, updated_at = ?1
         WHERE id = ?2 AND booking_reference = ?3",
        params![now, id, booking_reference],
    )
}

pub fn update_slot_booking_status(
    conn: &Connection,
    id: &str,
    status: SlotBookingStatus,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE time_slots SET booking_status = ?1, updated_at = ?2
         WHERE id = ?3 AND is_available = 0",
        params![status.as_str(), now, id],
    )
}

pub fn delete_available_slot(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM time_slots WHERE id = ?1 AND is_available = 1",
        params![id],
    )
}

fn parse_slot_row(row: &Row) -> rusqlite::Result<TimeSlot> {
    let booking_status: Option<String> = row.get(6)?;
    Ok(TimeSlot {
        id: row.get(0)?,
        date: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        is_available: row.get(4)?,
        booking_reference: row.get(5)?,
        booking_status: booking_status
            .map(|s| parse_text(6, &s))
            .transpose()?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, reference, customer_id, scheduled_date, scheduled_start_time, \
     scheduled_end_time, status, time_slot_id, total_price_cents, payment_status, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, reference, customer_id, scheduled_date, scheduled_start_time,
             scheduled_end_time, status, time_slot_id, total_price_cents, payment_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            booking.id,
            booking.reference,
            booking.customer_id,
            booking.scheduled_date,
            booking.scheduled_start_time,
            booking.scheduled_end_time,
            booking.status.as_str(),
            booking.time_slot_id,
            booking.total_price_cents,
            booking.payment_status.as_str(),
            booking.created_at,
            booking.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        parse_booking_row,
    )
    .optional()
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    limit: i64,
) -> rusqlite::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE ?1 IS NULL OR status = ?1
         ORDER BY scheduled_date DESC, scheduled_start_time DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(
        params![status.map(|s| s.as_str()), limit],
        parse_booking_row,
    )?;
    rows.collect()
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    time_slot_id: Option<&str>,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE bookings SET status = ?1, time_slot_id = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), time_slot_id, now, id],
    )
}

pub fn apply_reschedule(
    conn: &Connection,
    id: &str,
    slot: &TimeSlot,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE bookings
         SET scheduled_date = ?1, scheduled_start_time = ?2, scheduled_end_time = ?3,
             status = ?4, time_slot_id = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            slot.date,
            slot.start_time,
            slot.end_time,
            BookingStatus::Rescheduled.as_str(),
            slot.id,
            now,
            id,
        ],
    )
}

pub fn update_payment_status(
    conn: &Connection,
    id: &str,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE bookings SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![payment_status.as_str(), now, id],
    )
}

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    let status: String = row.get(6)?;
    let payment_status: String = row.get(9)?;
    Ok(Booking {
        id: row.get(0)?,
        reference: row.get(1)?,
        customer_id: row.get(2)?,
        scheduled_date: row.get(3)?,
        scheduled_start_time: row.get(4)?,
        scheduled_end_time: row.get(5)?,
        status: parse_text(6, &status)?,
        time_slot_id: row.get(7)?,
        total_price_cents: row.get(8)?,
        payment_status: parse_text(9, &payment_status)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

// ── Reschedule Requests ──

const REQUEST_COLUMNS: &str = "id, booking_id, requested_date, requested_time, reason, status, \
     admin_response, created_at, updated_at";

pub fn insert_reschedule_request(
    conn: &Connection,
    request: &RescheduleRequest,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO booking_reschedule_requests (id, booking_id, requested_date, requested_time,
             reason, status, admin_response, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            request.id,
            request.booking_id,
            request.requested_date,
            request.requested_time,
            request.reason,
            request.status.as_str(),
            request.admin_response,
            request.created_at,
            request.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_reschedule_request(
    conn: &Connection,
    id: &str,
) -> rusqlite::Result<Option<RescheduleRequest>> {
    conn.query_row(
        &format!("SELECT {REQUEST_COLUMNS} FROM booking_reschedule_requests WHERE id = ?1"),
        params![id],
        parse_request_row,
    )
    .optional()
}

pub fn has_pending_request(conn: &Connection, booking_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM booking_reschedule_requests
         WHERE booking_id = ?1 AND status = 'pending'",
        params![booking_id],
        |row| row.get(0),
    )
}

/// Moves a pending request to its final status. Already-resolved requests are left alone.
pub fn resolve_reschedule_request(
    conn: &Connection,
    id: &str,
    status: RescheduleStatus,
    admin_response: Option<&str>,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE booking_reschedule_requests
         SET status = ?1, admin_response = ?2, updated_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![status.as_str(), admin_response, now, id],
    )
}

pub fn list_reschedule_requests(
    conn: &Connection,
    status: Option<RescheduleStatus>,
) -> rusqlite::Result<Vec<RescheduleRequest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS} FROM booking_reschedule_requests
         WHERE ?1 IS NULL OR status = ?1
         ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![status.map(|s| s.as_str())], parse_request_row)?;
    rows.collect()
}

fn parse_request_row(row: &Row) -> rusqlite::Result<RescheduleRequest> {
    let status: String = row.get(5)?;
    Ok(RescheduleRequest {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        requested_date: row.get(2)?,
        requested_time: row.get(3)?,
        reason: row.get(4)?,
        status: parse_text(5, &status)?,
        admin_response: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// ── Status History ──

pub fn insert_history(
    conn: &Connection,
    entry: &NewHistoryEntry<'_>,
    now: DateTime<Utc>,
) -> rusqlite::Result<StatusHistoryEntry> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO booking_status_history (id, booking_id, from_status, to_status, changed_by,
             reason, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            entry.booking_id,
            entry.from_status.as_str(),
            entry.to_status.as_str(),
            entry.changed_by,
            entry.reason,
            entry.notes,
            now,
        ],
    )?;

    Ok(StatusHistoryEntry {
        id,
        booking_id: entry.booking_id.to_string(),
        from_status: entry.from_status,
        to_status: entry.to_status,
        changed_by: entry.changed_by.to_string(),
        reason: entry.reason.map(str::to_string),
        notes: entry.notes.map(str::to_string),
        created_at: now,
    })
}

pub fn history_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> rusqlite::Result<Vec<StatusHistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, from_status, to_status, changed_by, reason, notes, created_at
         FROM booking_status_history WHERE booking_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        let from_status: String = row.get(2)?;
        let to_status: String = row.get(3)?;
        Ok(StatusHistoryEntry {
            id: row.get(0)?,
            booking_id: row.get(1)?,
            from_status: parse_text(2, &from_status)?,
            to_status: parse_text(3, &to_status)?,
            changed_by: row.get(4)?,
            reason: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;
    rows.collect()
}

pub fn has_entered_status(
    conn: &Connection,
    booking_id: &str,
    status: BookingStatus,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM booking_status_history WHERE booking_id = ?1 AND to_status = ?2",
        params![booking_id, status.as_str()],
        |row| row.get(0),
    )
}

// ── Rate Limits ──

pub fn increment_counter(conn: &Connection, key: &str, window: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO rate_limits (key, window_start, count) VALUES (?1, ?2, 1)
         ON CONFLICT(key, window_start) DO UPDATE SET count = count + 1",
        params![key, window],
    )?;

    conn.query_row(
        "SELECT count FROM rate_limits WHERE key = ?1 AND window_start = ?2",
        params![key, window],
        |row| row.get(0),
    )
}

pub fn cleanup_counters_before(conn: &Connection, cutoff: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM rate_limits WHERE window_start < ?1", params![cutoff])
}

fn parse_text<T: FromStr<Err = String>>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
