//! Mock chat API backing the CLT chatbot frontend.

pub mod config;
pub mod error;
pub mod routes;
pub mod store;

use axum::routing::{get, post};
use axum::Router;
use store::SharedStore;
use tower_http::cors::CorsLayer;

pub fn app(store: SharedStore, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(routes::healthcheck))
        .route("/chat", post(routes::chat))
        .route(
            "/conversations",
            get(routes::list_conversations).post(routes::create_conversation),
        )
        .route(
            "/conversations/:conversation_id",
            get(routes::conversation_detail)
                .patch(routes::update_conversation)
                .delete(routes::delete_conversation),
        )
        .route("/scenarios", get(routes::list_scenarios))
        .layer(cors)
        .with_state(store)
}
