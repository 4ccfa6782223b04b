//! Customer-facing reschedule requests and their admin resolution.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{
    Booking, NewHistoryEntry, RescheduleOutcome, RescheduleRequest, RescheduleStatus,
};
use crate::services::bookings;
use crate::services::notify::{self, NoticeKind, StatusNotice};
use crate::services::rate_limit;
use crate::services::reschedule::{self, ApproveReschedule};
use crate::services::status_machine;
use crate::state::AppState;

const MAX_TEXT_LEN: usize = 1000;

#[derive(Debug, Clone)]
pub struct SubmitReschedule {
    pub booking_id: String,
    pub requested_date: NaiveDate,
    pub requested_time: NaiveTime,
    pub reason: Option<String>,
    /// Identity of the caller, already authenticated upstream.
    pub customer_id: Option<String>,
}

pub fn submit(
    conn: &mut Connection,
    cmd: &SubmitReschedule,
    max_per_hour: i64,
) -> Result<RescheduleRequest, AppError> {
    let reason = normalize_text(cmd.reason.as_deref(), "reason")?;

    let tx = db::begin_write(conn)?;
    let booking = bookings::find(&tx, &cmd.booking_id)?;
    if cmd
        .customer_id
        .as_deref()
        .is_some_and(|caller| caller != booking.customer_id)
    {
        return Err(AppError::NotFound(format!("booking {} not found", cmd.booking_id)));
    }
    if !status_machine::can_reschedule(booking.status) {
        return Err(AppError::InvalidState(format!(
            "a {} booking cannot be rescheduled",
            booking.status
        )));
    }
    if queries::has_pending_request(&tx, &booking.id)? {
        return Err(AppError::InvalidState(
            "a reschedule request is already pending for this booking".to_string(),
        ));
    }
    if booking.scheduled_date == cmd.requested_date
        && booking.scheduled_start_time == cmd.requested_time
    {
        return Err(AppError::Validation(
            "requested time is the booking's current time".to_string(),
        ));
    }

    let now = Utc::now();
    rate_limit::cleanup_old_windows(&tx, now)?;
    rate_limit::check_and_increment(
        &tx,
        &format!("reschedule:{}", booking.customer_id),
        max_per_hour,
        now,
    )?;

    let request = RescheduleRequest {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking.id,
        requested_date: cmd.requested_date,
        requested_time: cmd.requested_time,
        reason,
        status: RescheduleStatus::Pending,
        admin_response: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_reschedule_request(&tx, &request)?;
    tx.commit()?;

    Ok(request)
}

/// Rejects a pending request. The booking and its slot are untouched.
pub fn decline(
    conn: &mut Connection,
    request_id: &str,
    reason: Option<&str>,
    changed_by: &str,
) -> Result<(RescheduleRequest, Booking), AppError> {
    let reason = normalize_text(reason, "reason")?;

    let tx = db::begin_write(conn)?;
    let request = queries::get_reschedule_request(&tx, request_id)?
        .filter(|r| r.status == RescheduleStatus::Pending)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "reschedule request {request_id} not found or already processed"
            ))
        })?;
    let booking = bookings::find(&tx, &request.booking_id)?;

    let now = Utc::now();
    queries::resolve_reschedule_request(
        &tx,
        request_id,
        RescheduleStatus::Rejected,
        reason.as_deref(),
        now,
    )?;
    let notes = match reason.as_deref() {
        Some(r) => format!(
            "Declined move to {} {}: {r}",
            request.requested_date,
            request.requested_time.format("%H:%M")
        ),
        None => format!(
            "Declined move to {} {}",
            request.requested_date,
            request.requested_time.format("%H:%M")
        ),
    };
    queries::insert_history(
        &tx,
        &NewHistoryEntry {
            booking_id: &booking.id,
            from_status: booking.status,
            to_status: booking.status,
            changed_by,
            reason: Some("reschedule request declined"),
            notes: Some(&notes),
        },
        now,
    )?;
    let resolved = queries::get_reschedule_request(&tx, request_id)?
        .ok_or_else(|| AppError::Internal(format!("request {request_id} vanished mid-transaction")))?;
    tx.commit()?;

    Ok((resolved, booking))
}

fn normalize_text(text: Option<&str>, field: &str) -> Result<Option<String>, AppError> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) if t.chars().count() > MAX_TEXT_LEN => Err(AppError::Validation(format!(
            "{field} must be at most {MAX_TEXT_LEN} characters"
        ))),
        other => Ok(other.map(str::to_string)),
    }
}

// ── Operations ──

pub async fn submit_reschedule(
    state: &Arc<AppState>,
    cmd: SubmitReschedule,
) -> Result<RescheduleRequest, AppError> {
    let limit = state.config.reschedule_requests_per_hour;
    let request = state.db.run(move |conn| submit(conn, &cmd, limit)).await?;
    tracing::info!(
        request_id = %request.id,
        booking_id = %request.booking_id,
        requested_date = %request.requested_date,
        "reschedule requested"
    );
    Ok(request)
}

pub async fn approve_reschedule(
    state: &Arc<AppState>,
    cmd: ApproveReschedule,
) -> Result<RescheduleOutcome, AppError> {
    let approval = state
        .db
        .run(move |conn| reschedule::approve(conn, &cmd))
        .await
        .inspect_err(|e| {
            if e.is_business() {
                tracing::warn!(error = %e, "reschedule approval rejected");
            }
        })?;

    tracing::info!(
        booking_id = %approval.outcome.booking_id,
        request_id = %approval.outcome.request_id,
        old_slot_id = ?approval.outcome.old_slot_id,
        new_slot_id = %approval.outcome.new_slot_id,
        "booking rescheduled"
    );

    let note = format!(
        "Your appointment moved to {} {}",
        approval.outcome.new_date,
        approval.outcome.new_time.format("%H:%M")
    );
    notify::dispatch(
        state.notifier.clone(),
        StatusNotice::new(
            NoticeKind::Rescheduled,
            approval.booking,
            approval.previous_status,
            Some(note),
        ),
    );
    Ok(approval.outcome)
}

pub async fn decline_reschedule(
    state: &Arc<AppState>,
    request_id: String,
    reason: Option<String>,
    changed_by: String,
) -> Result<RescheduleRequest, AppError> {
    let (request, booking) = state
        .db
        .run(move |conn| decline(conn, &request_id, reason.as_deref(), &changed_by))
        .await?;

    tracing::info!(request_id = %request.id, booking_id = %booking.id, "reschedule declined");
    let status = booking.status;
    notify::dispatch(
        state.notifier.clone(),
        StatusNotice::new(
            NoticeKind::RescheduleDeclined,
            booking,
            status,
            request.admin_response.clone(),
        ),
    );
    Ok(request)
}

pub async fn list_reschedule_requests(
    state: &Arc<AppState>,
    status: Option<RescheduleStatus>,
) -> Result<Vec<RescheduleRequest>, AppError> {
    state
        .db
        .run(move |conn| Ok(queries::list_reschedule_requests(conn, status)?))
        .await
}
