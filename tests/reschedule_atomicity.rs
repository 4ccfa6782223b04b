//! Slot-consistency checks for reschedule approval: concurrent approvals
//! racing for one slot, and a crash partway through a move.

use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;

use slotbook::db::{self, queries, Database};
use slotbook::errors::AppError;
use slotbook::models::{
    Booking, BookingStatus, NewBooking, NewHistoryEntry, RescheduleStatus, SlotBookingStatus,
    TimeRange,
};
use slotbook::services::bookings::{self, TransitionCommand};
use slotbook::services::reschedule::{self, ApproveReschedule};
use slotbook::services::workflow::{self, SubmitReschedule};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

fn seed_slots(conn: &mut Connection, days: &[&str]) {
    let dates: Vec<_> = days.iter().map(|d| date(d)).collect();
    let ranges = [
        TimeRange {
            start: time("10:00"),
            end: time("12:00"),
        },
        TimeRange {
            start: time("14:00"),
            end: time("16:00"),
        },
    ];
    let created = slotbook::services::slots::bulk_create(conn, &dates, &ranges).unwrap();
    assert_eq!(created, dates.len() * ranges.len());
}

fn confirmed_booking(conn: &mut Connection, customer: &str, day: &str, at: &str) -> Booking {
    let booking = bookings::create(
        conn,
        &NewBooking {
            customer_id: customer.to_string(),
            date: date(day),
            start_time: time(at),
            total_price_cents: 15000,
        },
    )
    .unwrap();
    let (booking, _) = bookings::transition(
        conn,
        &booking.id,
        &TransitionCommand {
            status: BookingStatus::Confirmed,
            changed_by: "admin".to_string(),
            reason: None,
            notes: None,
            confirm: false,
        },
    )
    .unwrap();
    booking
}

fn request_move(conn: &mut Connection, booking: &Booking, day: &str, at: &str) -> String {
    workflow::submit(
        conn,
        &SubmitReschedule {
            booking_id: booking.id.clone(),
            requested_date: date(day),
            requested_time: time(at),
            reason: None,
            customer_id: Some(booking.customer_id.clone()),
        },
        100,
    )
    .unwrap()
    .id
}

fn approve_cmd(request_id: &str, day: &str, at: &str) -> ApproveReschedule {
    ApproveReschedule {
        request_id: request_id.to_string(),
        new_date: date(day),
        new_time: time(at),
        admin_response: None,
        changed_by: "admin".to_string(),
    }
}

/// Every booking pointer must be backed by a slot held under the booking's
/// reference, and every held slot must be pointed at by exactly that booking.
fn slot_violations(conn: &Connection) -> Vec<String> {
    let mut violations = vec![];

    for booking in queries::list_bookings(conn, None, 1000).unwrap() {
        let Some(slot_id) = booking.time_slot_id.as_deref() else {
            continue;
        };
        match queries::get_slot(conn, slot_id).unwrap() {
            None => violations.push(format!("{} points at missing slot", booking.reference)),
            Some(slot) if slot.is_available => {
                violations.push(format!("{} points at free slot {}", booking.reference, slot.id))
            }
            Some(slot) if slot.booking_reference.as_deref() != Some(booking.reference.as_str()) => {
                violations.push(format!("{} points at slot held by another", booking.reference))
            }
            Some(_) => {}
        }
    }

    let mut stmt = conn
        .prepare(
            "SELECT s.id, COUNT(b.id) FROM time_slots s
             LEFT JOIN bookings b ON b.time_slot_id = s.id AND b.reference = s.booking_reference
             WHERE s.is_available = 0 GROUP BY s.id",
        )
        .unwrap();
    let held: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    for (slot_id, owners) in held {
        if owners != 1 {
            violations.push(format!("slot {slot_id} held with {owners} owning bookings"));
        }
    }

    violations
}

// ── Concurrent approvals ──

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_for_one_slot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    let db = Database::open(&path.to_string_lossy(), Duration::from_secs(5)).unwrap();

    for round in 0..5 {
        let day = format!("2024-07-{:02}", round * 2 + 1);
        let next = format!("2024-07-{:02}", round * 2 + 2);

        let (first, second) = {
            let mut conn = db.connect().unwrap();
            seed_slots(&mut conn, &[&day, &next]);
            let x = confirmed_booking(&mut conn, "cust-x", &day, "10:00");
            let y = confirmed_booking(&mut conn, "cust-y", &day, "14:00");
            (
                request_move(&mut conn, &x, &next, "10:00"),
                request_move(&mut conn, &y, &next, "10:00"),
            )
        };

        let cmd_a = approve_cmd(&first, &next, "10:00");
        let cmd_b = approve_cmd(&second, &next, "10:00");
        let (a, b) = tokio::join!(
            db.run(move |conn| reschedule::approve(conn, &cmd_a)),
            db.run(move |conn| reschedule::approve(conn, &cmd_b)),
        );

        let results = [a, b];
        let won = results.iter().filter(|r| r.is_ok()).count();
        let lost = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::SlotUnavailable(_))))
            .count();
        assert_eq!((won, lost), (1, 1), "round {round}");

        let conn = db.connect().unwrap();
        let target = queries::find_available_slot(&conn, date(&next), time("10:00")).unwrap();
        assert!(target.is_none());
        assert!(slot_violations(&conn).is_empty(), "{:?}", slot_violations(&conn));

        let mut statuses: Vec<_> = [&first, &second]
            .into_iter()
            .map(|id| {
                queries::get_reschedule_request(&conn, id)
                    .unwrap()
                    .unwrap()
                    .status
            })
            .collect();
        statuses.sort_by_key(|s| s.as_str());
        assert_eq!(
            statuses,
            vec![RescheduleStatus::Approved, RescheduleStatus::Pending],
            "round {round}"
        );
    }
}

// ── Lock waits ──

#[test]
fn test_lock_wait_timeout_is_a_concurrency_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let db = Database::open(&path.to_string_lossy(), Duration::from_millis(100)).unwrap();

    let (request_id, booking) = {
        let mut conn = db.connect().unwrap();
        seed_slots(&mut conn, &["2024-06-01", "2024-06-02"]);
        let booking = confirmed_booking(&mut conn, "cust-1", "2024-06-01", "10:00");
        let booking = bookings::find(&conn, &booking.id).unwrap();
        (request_move(&mut conn, &booking, "2024-06-02", "14:00"), booking)
    };

    let mut conn = db.connect().unwrap();
    let mut holder = db.connect().unwrap();
    let lock = db::begin_write(&mut holder).unwrap();

    let result = reschedule::approve(&mut conn, &approve_cmd(&request_id, "2024-06-02", "14:00"));
    assert!(matches!(result, Err(AppError::ConcurrencyConflict(_))));
    let result = slotbook::services::slots::bulk_create(
        &mut conn,
        &[date("2024-06-03")],
        &[TimeRange {
            start: time("10:00"),
            end: time("12:00"),
        }],
    );
    assert!(matches!(result, Err(AppError::ConcurrencyConflict(_))));

    drop(lock);
    assert_eq!(bookings::find(&conn, &booking.id).unwrap(), booking);
    reschedule::approve(&mut conn, &approve_cmd(&request_id, "2024-06-02", "14:00")).unwrap();
}

// ── Crash partway through a move ──

/// Approval as a series of independently committed writes, with a crash
/// injected after `crash_after` of them.
fn sequential_approve(
    conn: &Connection,
    request_id: &str,
    day: &str,
    at: &str,
    crash_after: usize,
) -> Result<(), AppError> {
    let request = queries::get_reschedule_request(conn, request_id)?.unwrap();
    let booking = queries::get_booking_by_id(conn, &request.booking_id)?.unwrap();
    let target = queries::find_available_slot(conn, date(day), time(at))?
        .ok_or_else(AppError::slot_unavailable)?;
    let now = Utc::now();

    let steps: Vec<Box<dyn Fn() -> rusqlite::Result<()> + '_>> = vec![
        Box::new(|| {
            queries::resolve_reschedule_request(conn, request_id, RescheduleStatus::Approved, None, now)
                .map(drop)
        }),
        Box::new(|| queries::apply_reschedule(conn, &booking.id, &target, now).map(drop)),
        Box::new(|| {
            queries::occupy_slot(conn, &target.id, &booking.reference, SlotBookingStatus::Confirmed, now)
                .map(drop)
        }),
        Box::new(|| {
            let previous = booking.time_slot_id.as_deref().unwrap_or_default();
            queries::release_slot(conn, previous, &booking.reference, now).map(drop)
        }),
        Box::new(|| {
            queries::insert_history(
                conn,
                &NewHistoryEntry {
                    booking_id: &booking.id,
                    from_status: booking.status,
                    to_status: BookingStatus::Rescheduled,
                    changed_by: "admin",
                    reason: Some("reschedule request approved"),
                    notes: None,
                },
                now,
            )
            .map(drop)
        }),
    ];

    for (done, step) in steps.iter().enumerate() {
        if done == crash_after {
            return Err(AppError::Internal("process crashed".to_string()));
        }
        step()?;
    }
    Ok(())
}

#[test]
fn test_crash_between_writes_breaks_slot_consistency() {
    let mut conn = db::init_db(":memory:").unwrap();
    seed_slots(&mut conn, &["2024-06-01", "2024-06-02"]);
    let booking = confirmed_booking(&mut conn, "cust-1", "2024-06-01", "10:00");
    let request_id = request_move(&mut conn, &booking, "2024-06-02", "14:00");

    // Booking moved, new slot not yet claimed.
    let result = sequential_approve(&conn, &request_id, "2024-06-02", "14:00", 2);
    assert!(matches!(result, Err(AppError::Internal(_))));

    let violations = slot_violations(&conn);
    assert!(!violations.is_empty());
    let stored = bookings::find(&conn, &booking.id).unwrap();
    let slot = queries::get_slot(&conn, stored.time_slot_id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert!(slot.is_available);
}

#[test]
fn test_failure_inside_approval_changes_nothing() {
    let mut conn = db::init_db(":memory:").unwrap();
    seed_slots(&mut conn, &["2024-06-01", "2024-06-02"]);
    let booking = confirmed_booking(&mut conn, "cust-1", "2024-06-01", "10:00");
    let booking = bookings::find(&conn, &booking.id).unwrap();
    let request_id = request_move(&mut conn, &booking, "2024-06-02", "14:00");

    // Fails the last write of the move, after every slot update has run.
    conn.execute_batch(
        "CREATE TRIGGER fail_history BEFORE INSERT ON booking_status_history
         BEGIN SELECT RAISE(ABORT, 'injected fault'); END;",
    )
    .unwrap();

    let result = reschedule::approve(&mut conn, &approve_cmd(&request_id, "2024-06-02", "14:00"));
    assert!(matches!(result, Err(AppError::Internal(_))));
    assert!(slot_violations(&conn).is_empty());
    assert_eq!(bookings::find(&conn, &booking.id).unwrap(), booking);

    conn.execute_batch("DROP TRIGGER fail_history").unwrap();
    let approval =
        reschedule::approve(&mut conn, &approve_cmd(&request_id, "2024-06-02", "14:00")).unwrap();
    assert_eq!(approval.booking.status, BookingStatus::Rescheduled);
    assert!(slot_violations(&conn).is_empty());
}
