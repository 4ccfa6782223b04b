use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use super::{check_auth, customer_id, parse_date, parse_time, ADMIN_ACTOR};
use crate::errors::AppError;
use crate::models::{RescheduleRequest, RescheduleStatus};
use crate::services::reschedule::ApproveReschedule;
use crate::services::workflow::{self, SubmitReschedule};
use crate::state::AppState;

// POST /api/bookings/:id/reschedule-requests
#[derive(Deserialize)]
pub struct SubmitPayload {
    pub requested_date: String,
    pub requested_time: String,
    pub reason: Option<String>,
}

pub async fn submit_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
    payload: Result<Json<SubmitPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<RescheduleRequest>), AppError> {
    let Json(payload) = payload?;
    let cmd = SubmitReschedule {
        booking_id,
        requested_date: parse_date("requested_date", &payload.requested_date)?,
        requested_time: parse_time("requested_time", &payload.requested_time)?,
        reason: payload.reason,
        customer_id: customer_id(&headers),
    };
    let request = workflow::submit_reschedule(&state, cmd).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

// GET /api/admin/reschedule-requests?status=pending
#[derive(Deserialize)]
pub struct RequestsQuery {
    pub status: Option<String>,
}

pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<RequestsQuery>, QueryRejection>,
) -> Result<Json<Vec<RescheduleRequest>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Query(query) = query?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<RescheduleStatus>)
        .transpose()
        .map_err(AppError::Validation)?;
    Ok(Json(workflow::list_reschedule_requests(&state, status).await?))
}

// POST /api/admin/reschedule-requests/:id
#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DecisionPayload {
    Approve {
        new_date: String,
        new_time: String,
        admin_response: Option<String>,
    },
    Decline {
        reason: Option<String>,
    },
}

/// A validated admin decision on a reschedule request.
#[derive(Debug, Clone, PartialEq)]
pub enum RescheduleDecision {
    Approve {
        new_date: NaiveDate,
        new_time: NaiveTime,
        admin_response: Option<String>,
    },
    Decline {
        reason: Option<String>,
    },
}

impl TryFrom<DecisionPayload> for RescheduleDecision {
    type Error = AppError;

    fn try_from(payload: DecisionPayload) -> Result<Self, Self::Error> {
        Ok(match payload {
            DecisionPayload::Approve {
                new_date,
                new_time,
                admin_response,
            } => RescheduleDecision::Approve {
                new_date: parse_date("new_date", &new_date)?,
                new_time: parse_time("new_time", &new_time)?,
                admin_response,
            },
            DecisionPayload::Decline { reason } => RescheduleDecision::Decline { reason },
        })
    }
}

pub async fn decide_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    payload: Result<Json<DecisionPayload>, JsonRejection>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Json(payload) = payload?;

    match RescheduleDecision::try_from(payload)? {
        RescheduleDecision::Approve {
            new_date,
            new_time,
            admin_response,
        } => {
            let cmd = ApproveReschedule {
                request_id,
                new_date,
                new_time,
                admin_response,
                changed_by: ADMIN_ACTOR.to_string(),
            };
            let outcome = workflow::approve_reschedule(&state, cmd).await?;
            Ok(Json(outcome).into_response())
        }
        RescheduleDecision::Decline { reason } => {
            let request =
                workflow::decline_reschedule(&state, request_id, reason, ADMIN_ACTOR.to_string())
                    .await?;
            Ok(Json(request).into_response())
        }
    }
}
