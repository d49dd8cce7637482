pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod services;
pub mod session;
pub mod state;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::get,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

pub use state::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    // Layers added last run first: rate limiting precedes key validation.
    let public_api = Router::new()
        .route("/headcounts", get(handlers::datasets::get_headcounts))
        .route("/enrollment", get(handlers::datasets::get_enrollment))
        .route("/enrollment/dimensions", get(handlers::datasets::list_dimensions))
        .route_layer(middleware::from_fn_with_state(state.clone(), gateway::api_key_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), gateway::rate_limit_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static(gateway::API_KEY_HEADER),
                ])
                .max_age(Duration::from_secs(60 * 60)),
        );

    let user_api = Router::new()
        .route(
            "/keys",
            get(handlers::keys::list_keys)
                .post(handlers::keys::create_key)
                .delete(handlers::keys::revoke_or_delete_key)
                .put(handlers::keys::unrevoke_key),
        )
        .route(
            "/preferences",
            get(handlers::preferences::get_preferences).put(handlers::preferences::update_preferences),
        )
        .route("/{user_id}/stats", get(handlers::stats::get_key_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), session::session_middleware));

    Router::new()
        .route("/api/health", get(handlers::health::health_check))
        .nest("/api/v1", public_api)
        .nest("/api/user", user_api)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
}
