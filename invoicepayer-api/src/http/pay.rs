//! Invoice submission

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Form, Router,
};
use serde::Deserialize;

use crate::http::{AppResult, AppState};

pub fn create_pay_router() -> Router<AppState> {
    Router::new().route("/pay", get(pay_query).post(pay_form))
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    #[serde(default)]
    pub invoice: String,
}

pub async fn pay_form(
    State(state): State<AppState>,
    Form(req): Form<PayRequest>,
) -> AppResult<Redirect> {
    submit(&state, &req.invoice).await
}

pub async fn pay_query(
    State(state): State<AppState>,
    Query(req): Query<PayRequest>,
) -> AppResult<Redirect> {
    submit(&state, &req.invoice).await
}

/// Start paying and send the caller to the payment's stream.
async fn submit(state: &AppState, invoice: &str) -> AppResult<Redirect> {
    let decoded = state.submitter.submit(invoice).await?;
    tracing::info!(
        payment_hash = %decoded.payment_hash,
        amount_msat = ?decoded.amount_msat,
        "Invoice submitted"
    );
    Ok(Redirect::to(&format!("/stream/{}", decoded.payment_hash)))
}
