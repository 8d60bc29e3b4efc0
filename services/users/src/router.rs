use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use userhub_core::health::healthz;
use userhub_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    health::readyz,
    outbox::get_outbox_stats,
    user::{
        clear_users, create_user, delete_user, get_user_by_email, get_user_by_id, list_users,
        update_user_by_email, update_user_by_id,
    },
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Users
        .route("/users", get(list_users))
        .route("/users/id/{id}", get(get_user_by_id))
        .route("/users/email/{email}", get(get_user_by_email))
        .route("/users/create", post(create_user))
        .route("/users/update/byId/{id}", put(update_user_by_id))
        .route("/users/update/byEmail/{email}", put(update_user_by_email))
        .route("/users/delete/{id}", delete(delete_user))
        .route("/users/clear", delete(clear_users))
        // Outbox
        .route("/outbox/stats", get(get_outbox_stats))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer()),
        )
}
