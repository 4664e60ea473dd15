pub mod events;
pub mod messages;
pub mod queue;
pub mod resources;

use axum::Router;
use axum::routing::{get, post, put};

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Page -> background messages
        .route("/api/v1/messages", post(messages::message))
        .route("/api/v1/submit", post(messages::submit))
        // Queue
        .route("/api/v1/queue", get(queue::status))
        .route("/api/v1/sync", post(queue::sync))
        .route("/api/v1/connectivity", put(queue::report_connectivity))
        // Broadcasts
        .route("/api/v1/events", get(events::stream))
        // Cached bookkeeping data
        .route(
            "/api/v1/resources/{collection}",
            get(resources::get).delete(resources::invalidate),
        )
}
