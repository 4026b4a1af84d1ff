use axum::{
    Router,
    http::Method,
    routing::{delete, get, patch},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handler::{self, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handler::healthcheck))
        .route("/books", get(handler::list_books).post(handler::create_book))
        .route("/books/:serial_number", delete(handler::delete_book))
        .route("/books/:serial_number/status", patch(handler::update_status))
}

/// The full service: routes plus CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
