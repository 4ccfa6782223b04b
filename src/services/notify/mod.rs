pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Booking, BookingStatus};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    StatusChanged,
    Rescheduled,
    RescheduleDeclined,
}

/// What the customer is told after a committed change.
#[derive(Debug, Clone, Serialize)]
pub struct StatusNotice {
    pub kind: NoticeKind,
    pub booking: Booking,
    pub customer_id: String,
    pub old_status: BookingStatus,
    pub new_status: BookingStatus,
    pub note: Option<String>,
}

impl StatusNotice {
    pub fn new(
        kind: NoticeKind,
        booking: Booking,
        old_status: BookingStatus,
        note: Option<String>,
    ) -> Self {
        Self {
            kind,
            customer_id: booking.customer_id.clone(),
            new_status: booking.status,
            old_status,
            booking,
            note,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &StatusNotice) -> anyhow::Result<()>;
}

/// Writes notices to the log. Used when no delivery endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &StatusNotice) -> anyhow::Result<()> {
        tracing::info!(
            kind = ?notice.kind,
            booking_id = %notice.booking.id,
            customer_id = %notice.customer_id,
            from = %notice.old_status,
            to = %notice.new_status,
            "customer notification"
        );
        Ok(())
    }
}

/// Sends the notice in the background. Delivery failures are logged and never
/// reach the caller, whose change is already committed.
pub fn dispatch(notifier: Arc<dyn Notifier>, notice: StatusNotice) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notice).await {
            tracing::error!(
                error = %e,
                booking_id = %notice.booking.id,
                "failed to notify customer"
            );
        }
    });
}
