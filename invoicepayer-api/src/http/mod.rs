// HTTP routes

pub mod error;
pub mod health;
pub mod pages;
pub mod pay;
pub mod stream;

use axum::Router;
use invoicepayer_stream::{PaymentStreamManager, PaymentSubmitter};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: PaymentStreamManager,
    pub submitter: Arc<PaymentSubmitter>,
}

impl AppState {
    pub fn new(manager: PaymentStreamManager, submitter: PaymentSubmitter) -> Self {
        Self {
            manager,
            submitter: Arc::new(submitter),
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::create_health_router())
        .merge(pages::create_pages_router())
        .merge(pay::create_pay_router())
        .merge(stream::create_stream_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
