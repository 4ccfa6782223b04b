use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Weekday;
use serde::Deserialize;

use super::{check_auth, parse_date, parse_time};
use crate::errors::AppError;
use crate::models::{SlotAvailability, TimeRange};
use crate::services::slots;
use crate::state::AppState;

// GET /api/slots?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<Vec<SlotAvailability>>, AppError> {
    let Query(query) = query?;
    let date = parse_date("date", &query.date)?;
    Ok(Json(slots::query_availability(&state, date).await?))
}

// POST /api/admin/slots/bulk
#[derive(Deserialize)]
pub struct RangePayload {
    pub start: String,
    pub end: String,
}

#[derive(Deserialize)]
pub struct BulkCreatePayload {
    pub start_date: String,
    pub end_date: String,
    pub weekdays: Option<Vec<String>>,
    pub time_ranges: Vec<RangePayload>,
}

pub async fn bulk_create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<BulkCreatePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Json(payload) = payload?;

    let start_date = parse_date("start_date", &payload.start_date)?;
    let end_date = parse_date("end_date", &payload.end_date)?;
    let weekdays = payload
        .weekdays
        .map(|days| {
            days.iter()
                .map(|d| {
                    d.parse::<Weekday>()
                        .map_err(|_| AppError::Validation(format!("unknown weekday: {d}")))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;
    if payload.time_ranges.is_empty() {
        return Err(AppError::Validation("time_ranges must not be empty".to_string()));
    }
    let ranges = payload
        .time_ranges
        .iter()
        .map(|r| {
            Ok(TimeRange {
                start: parse_time("start", &r.start)?,
                end: parse_time("end", &r.end)?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let created = slots::bulk_create_slots(&state, start_date, end_date, weekdays, ranges).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "created": created })),
    ))
}

// DELETE /api/admin/slots/:id
pub async fn delete_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    slots::delete_slot(&state, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
