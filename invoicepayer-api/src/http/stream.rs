//! Live payment status over Server-Sent Events
//!
//! `GET /stream/{payment_hash}` attaches the caller to the payment's stream
//! when it asks for `text/event-stream`. Any other request gets the HTML
//! page, which opens the same URL through `EventSource`.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use invoicepayer_core::PaymentHash;
use invoicepayer_stream::{StreamEvent, Subscription};
use std::convert::Infallible;

use crate::http::{pages, AppError, AppResult, AppState};

const EVENT_STREAM: &str = "text/event-stream";

pub fn create_stream_router() -> Router<AppState> {
    Router::new().route("/stream/{payment_hash}", get(payment_stream))
}

pub async fn payment_stream(
    State(state): State<AppState>,
    Path(payment_hash): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let payment_hash =
        PaymentHash::parse(&payment_hash).map_err(|e| AppError::BadRequest(e.to_string()))?;

    if !wants_event_stream(&headers) {
        return Ok(pages::stream_page(&payment_hash).into_response());
    }

    let subscription = state.manager.attach(&payment_hash).await;
    tracing::debug!(payment_hash = %payment_hash, "SSE observer connected");
    Ok(Sse::new(sse_events(subscription)).into_response())
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(EVENT_STREAM))
}

/// Feed one subscription into the SSE body. Dropping the body (client gone)
/// drops the subscription, which detaches the observer.
fn sse_events(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((Ok(to_sse(&event)), subscription))
    })
}

fn to_sse(event: &StreamEvent) -> Event {
    match event {
        StreamEvent::Status(status) => Event::default()
            .event(event.name())
            .data(status.to_string()),
        StreamEvent::Result(record) => Event::default()
            .event(event.name())
            .data(record.to_string()),
        StreamEvent::Keepalive => Event::default().event(event.name()).data(""),
        StreamEvent::Retry(delay) => Event::default().retry(*delay),
    }
}
