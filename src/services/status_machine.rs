use serde::Serialize;

use crate::models::BookingStatus;

#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext {
    pub payment_completed: bool,
    pub service_started: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionVerdict {
    pub valid: bool,
    pub reason: Option<String>,
    pub warning: Option<String>,
    pub requires_confirmation: bool,
}

impl TransitionVerdict {
    fn reject(reason: &str) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
            warning: None,
            requires_confirmation: false,
        }
    }

    fn allow() -> Self {
        Self {
            valid: true,
            reason: None,
            warning: None,
            requires_confirmation: false,
        }
    }

    fn warn(warning: String) -> Self {
        Self {
            valid: true,
            reason: None,
            warning: Some(warning),
            requires_confirmation: true,
        }
    }
}

pub fn allowed_transitions(from: BookingStatus) -> &'static [BookingStatus] {
    use BookingStatus::*;

    match from {
        Pending => &[Processing, Confirmed, Declined, Cancelled],
        Processing => &[Confirmed, PaymentFailed, Cancelled],
        PaymentFailed => &[Processing, Cancelled],
        Confirmed => &[InProgress, Rescheduled, Cancelled],
        Rescheduled => &[InProgress, Cancelled],
        InProgress => &[Completed, Cancelled],
        Completed => &[InProgress],
        Declined => &[Pending],
        Cancelled => &[Pending],
        NoShow => &[Pending],
    }
}

pub fn is_listed(from: BookingStatus, to: BookingStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Bookings that may be moved to another slot. A rescheduled booking may move again.
pub fn can_reschedule(from: BookingStatus) -> bool {
    from == BookingStatus::Rescheduled || is_listed(from, BookingStatus::Rescheduled)
}

pub fn validate(
    from: BookingStatus,
    to: BookingStatus,
    context: &TransitionContext,
) -> TransitionVerdict {
    if !is_listed(from, to) {
        return TransitionVerdict::reject("illegal transition");
    }

    // Work may only start on a booking that is scheduled; this also keeps
    // completed jobs from being reopened through `completed -> in_progress`.
    if to == BookingStatus::InProgress
        && !matches!(from, BookingStatus::Confirmed | BookingStatus::Rescheduled)
    {
        return TransitionVerdict::reject("service not ready");
    }

    if from == BookingStatus::Processing
        && to == BookingStatus::Confirmed
        && !context.payment_completed
    {
        return TransitionVerdict::warn(
            "confirming a booking whose payment has not completed".to_string(),
        );
    }

    if to == BookingStatus::Completed && !context.service_started {
        return TransitionVerdict::warn(
            "completing a booking that never entered in_progress".to_string(),
        );
    }

    if to.releases_slot() && from.is_active() {
        return TransitionVerdict::warn(format!("moving an active {from} booking to {to}"));
    }

    TransitionVerdict::allow()
}
