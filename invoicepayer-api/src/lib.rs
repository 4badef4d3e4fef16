// invoicepayer HTTP API
//
// Invoice submission, live payment status over Server-Sent Events and the
// operational endpoints.

pub mod http;

pub use http::{create_router, AppError, AppResult, AppState};
