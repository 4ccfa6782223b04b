use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::{check_auth, customer_id, parse_date, parse_time, ADMIN_ACTOR};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, NewBooking, PaymentStatus, StatusHistoryEntry};
use crate::services::bookings::{self, TransitionCommand};
use crate::state::AppState;

const MAX_LIST_LIMIT: i64 = 500;

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingPayload {
    pub customer_id: String,
    pub date: String,
    pub start_time: String,
    pub total_price_cents: i64,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateBookingPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let Json(payload) = payload?;
    let new = NewBooking {
        customer_id: payload.customer_id,
        date: parse_date("date", &payload.date)?,
        start_time: parse_time("start_time", &payload.start_time)?,
        total_price_cents: payload.total_price_cents,
    };
    let booking = bookings::create_booking(&state, new).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(
        bookings::get_booking(&state, id, customer_id(&headers)).await?,
    ))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<BookingsQuery>, QueryRejection>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Query(query) = query?;

    let status = query
        .status
        .as_deref()
        .map(str::parse::<BookingStatus>)
        .transpose()
        .map_err(AppError::Validation)?;
    let limit = query.limit.unwrap_or(50).clamp(1, MAX_LIST_LIMIT);

    Ok(Json(bookings::list_bookings(&state, status, limit).await?))
}

// POST /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusPayload {
    pub status: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

pub async fn transition_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<StatusPayload>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Json(payload) = payload?;

    let cmd = TransitionCommand {
        status: payload.status.parse().map_err(AppError::Validation)?,
        changed_by: ADMIN_ACTOR.to_string(),
        reason: payload.reason,
        notes: payload.notes,
        confirm: payload.confirm,
    };
    Ok(Json(bookings::transition_status(&state, id, cmd).await?))
}

// POST /api/admin/bookings/:id/payment
#[derive(Deserialize)]
pub struct PaymentPayload {
    pub payment_status: String,
}

pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<PaymentPayload>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Json(payload) = payload?;
    let payment_status: PaymentStatus = payload
        .payment_status
        .parse()
        .map_err(AppError::Validation)?;
    Ok(Json(bookings::record_payment(&state, id, payment_status).await?))
}

// DELETE /api/admin/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(
        bookings::delete_booking(&state, id, ADMIN_ACTOR.to_string()).await?,
    ))
}

// GET /api/admin/bookings/:id/history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<StatusHistoryEntry>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(bookings::booking_history(&state, id).await?))
}
