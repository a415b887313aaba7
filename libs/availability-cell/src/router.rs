use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AvailabilityState};
use crate::services::availability::AvailabilityService;

pub fn availability_routes(config: Arc<AppConfig>, service: Arc<AvailabilityService>) -> Router {
    let state = AvailabilityState {
        service,
    };

    let public_routes = Router::new()
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_availability));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_availability))
        .route("/{slot_id}", put(handlers::update_slot).delete(handlers::delete_slot))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
