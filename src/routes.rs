use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let cors = cors_layer(state.config.cors_origin.as_deref())?;

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/categories", get(handlers::categories::list_categories))
        .route("/api/categories/:id", get(handlers::categories::get_category))
        .route(
            "/api/categories/:id/artists",
            get(handlers::categories::list_category_artists),
        )
        .route("/api/artists", get(handlers::artists::list_artists))
        .route("/api/artists/me", put(handlers::artists::update_my_profile))
        .route("/api/artists/:id", get(handlers::artists::get_artist))
        .route(
            "/api/artists/:id/availability",
            get(handlers::artists::get_availability),
        )
        .route("/api/artists/:id/reviews", get(handlers::artists::list_reviews))
        .route(
            "/api/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_bookings),
        )
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route("/api/bookings/:id/accept", post(handlers::bookings::accept_booking))
        .route("/api/bookings/:id/reject", post(handlers::bookings::reject_booking))
        .route(
            "/api/bookings/:id/complete",
            post(handlers::bookings::complete_booking),
        )
        .route("/api/bookings/:id/cancel", post(handlers::bookings::cancel_booking))
        .route(
            "/api/bookings/:id/calendar.ics",
            get(handlers::calendar::download_ics),
        )
        .route(
            "/api/payments",
            post(handlers::payments::create_payment).get(handlers::payments::list_payments),
        )
        .route("/api/reviews", post(handlers::reviews::create_review))
        .route(
            "/api/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/api/notifications/read-all",
            post(handlers::notifications::mark_all_read),
        )
        .route(
            "/api/notifications/:id/read",
            post(handlers::notifications::mark_read),
        )
        .route(
            "/api/notifications/events",
            get(handlers::notifications::events_stream),
        )
        .route("/api/admin/artists", get(handlers::admin::list_artists))
        .route(
            "/api/admin/artists/:id/approve",
            post(handlers::admin::approve_artist),
        )
        .route(
            "/api/admin/artists/:id/reject",
            post(handlers::admin::reject_artist),
        )
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route("/api/admin/categories", post(handlers::admin::create_category))
        .route(
            "/api/admin/categories/:id",
            put(handlers::admin::update_category).delete(handlers::admin::delete_category),
        )
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(app)
}

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("CORS_ORIGIN is not a valid header value: {origin}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}
