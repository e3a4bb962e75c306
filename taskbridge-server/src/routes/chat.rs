use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tracing::info;

use crate::{app_state::AppState, handlers};

/// Chat surface routes. Credential enforcement is layered on by the caller
/// (see `server::create_api_router`), so the whole table shares one guard.
pub fn create_router_chat() -> Router<Arc<AppState>> {
    info!("Creating chat router");
    Router::new()
        .route("/chat", post(handlers::chat::send_message))
        .route("/chat/{username}", get(handlers::chat::get_history))
        .route(
            "/chat/message/{id}/delete",
            post(handlers::chat::delete_message),
        )
        .route(
            "/chat/conversation/{other_username}",
            delete(handlers::chat::delete_conversation),
        )
}
