pub mod bookings;
pub mod health;
pub mod reschedule;
pub mod slots;

use axum::http::HeaderMap;
use chrono::{NaiveDate, NaiveTime};

use crate::errors::AppError;

pub const ADMIN_ACTOR: &str = "admin";

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// Caller identity forwarded by the authenticating proxy, if any.
pub(crate) fn customer_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-customer-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("{field} must be a YYYY-MM-DD date")))
}

pub(crate) fn parse_time(field: &str, value: &str) -> Result<NaiveTime, AppError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::Validation(format!("{field} must be an HH:MM time")))
}
