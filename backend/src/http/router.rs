//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing,
//! authentication), and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::auth;
use super::handlers;
use super::state::AppState;
use crate::api::Resource;
use crate::models::{
    Camera, CameraType, Enclosure, GenericMode, GenericModeGroup, Instrument, InstrumentType,
    ModeType, OpticalElement, OpticalElementGroup, Site, Telescope,
};

/// Register the list and detail routes of one collection, with and without
/// the trailing slash.
fn collection<R: Resource>(router: Router<AppState>) -> Router<AppState> {
    let base = format!("/v1/{}", R::COLLECTION);
    let list = get(handlers::list::<R>).post(handlers::create::<R>);
    let detail = get(handlers::retrieve::<R>)
        .put(handlers::update::<R>)
        .patch(handlers::partial_update::<R>)
        .delete(handlers::destroy::<R>);

    router
        .route(&format!("{}/", base), list.clone())
        .route(&base, list)
        .route(&format!("{}/{{id}}/", base), detail.clone())
        .route(&format!("{}/{{id}}", base), detail)
}

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Hardware catalogs are read by browsers and scripts alike.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new().route("/health", get(handlers::health_check));
    router = collection::<Site>(router);
    router = collection::<Enclosure>(router);
    router = collection::<Telescope>(router);
    router = collection::<Instrument>(router);
    router = collection::<Camera>(router);
    router = collection::<CameraType>(router);
    router = collection::<OpticalElement>(router);
    router = collection::<OpticalElementGroup>(router);
    router = collection::<InstrumentType>(router);
    router = collection::<ModeType>(router);
    router = collection::<GenericMode>(router);
    router = collection::<GenericModeGroup>(router);

    router
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
