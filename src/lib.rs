// lib.rs
// Library root: the server binary and the integration tests share the router.
//
// Endpoints (all behind the session cookie):
// - GET/POST /api/professionals
// - GET/POST /api/appointments, POST /api/appointments/{id}/status
// - /api/settlements...   generation, status workflow, payments, overview
// - /api/cash_transfers...  confirm, update, delete, bulk replace

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

pub mod config;
pub mod liquidation;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;

use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route(
            "/api/professionals",
            get(routes::professionals_index).post(routes::professionals_create),
        )
        .route(
            "/api/appointments",
            get(routes::appointments_index).post(routes::appointments_create),
        )
        .route(
            "/api/appointments/{id}/status",
            post(routes::appointments_update_status),
        )
        .route(
            "/api/settlements",
            get(routes::settlements_index).put(routes::settlements_replace),
        )
        .route(
            "/api/settlements/daily",
            post(routes::settlements_generate_daily),
        )
        .route(
            "/api/settlements/daily/all",
            post(routes::settlements_generate_daily_all),
        )
        .route(
            "/api/settlements/monthly",
            post(routes::settlements_generate_monthly),
        )
        .route("/api/settlements/overview", get(routes::settlements_overview))
        .route(
            "/api/settlements/{id}/status",
            post(routes::settlements_update_status),
        )
        .route(
            "/api/settlements/{id}/payments",
            get(routes::settlements_payments_index).post(routes::settlements_add_payment),
        )
        .route(
            "/api/settlements/{id}/delete",
            post(routes::settlements_delete),
        )
        .route(
            "/api/cash_transfers",
            get(routes::cash_transfers_index).put(routes::cash_transfers_replace),
        )
        .route(
            "/api/cash_transfers/{id}/confirm",
            post(routes::cash_transfers_confirm),
        )
        .route(
            "/api/cash_transfers/{id}/update",
            post(routes::cash_transfers_update),
        )
        .route(
            "/api/cash_transfers/{id}/delete",
            post(routes::cash_transfers_delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new().merge(protected).with_state(state)
}
