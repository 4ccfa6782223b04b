pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/slots", get(handlers::slots::get_availability))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/reschedule-requests",
            post(handlers::reschedule::submit_request),
        )
        .route("/api/admin/bookings", get(handlers::bookings::list_bookings))
        .route(
            "/api/admin/bookings/:id",
            delete(handlers::bookings::delete_booking),
        )
        .route(
            "/api/admin/bookings/:id/status",
            post(handlers::bookings::transition_status),
        )
        .route(
            "/api/admin/bookings/:id/payment",
            post(handlers::bookings::record_payment),
        )
        .route(
            "/api/admin/bookings/:id/history",
            get(handlers::bookings::get_history),
        )
        .route("/api/admin/slots/bulk", post(handlers::slots::bulk_create))
        .route("/api/admin/slots/:id", delete(handlers::slots::delete_slot))
        .route(
            "/api/admin/reschedule-requests",
            get(handlers::reschedule::list_requests),
        )
        .route(
            "/api/admin/reschedule-requests/:id",
            post(handlers::reschedule::decide_request),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
