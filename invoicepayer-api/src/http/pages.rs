//! HTML pages

use axum::{response::Html, routing::get, Router};
use invoicepayer_core::PaymentHash;

use crate::http::AppState;

const HOME_PAGE: &str = r#"<!doctype html>
<meta charset=utf-8>
<title>invoicepayer</title>
<h1>invoicepayer</h1>
<p>this thing pays lightning invoices on signet, do not abuse</p>
<form method=post action=/pay>
  <label>
    bolt11 invoice
    <textarea name=invoice></textarea>
  </label>
  <button>pay invoice</button>
</form>
<style>
body {
  margin: 10px auto;
  width: 800px;
  max-width: 90%;
}
textarea {
  width: 100%;
  height: 300px;
}
button {
  display: block;
  padding: 2px;
  font-size: 1.5em;
}
</style>
"#;

const STREAM_PAGE: &str = r#"<!doctype html>
<meta charset=utf-8>
<title>invoicepayer: {payment_hash}</title>
<h1>invoicepayer</h1>
<p>payment <code>{payment_hash}</code></p>
<p>status: <strong id=status>connecting</strong></p>
<pre id=result></pre>
<p><a href=/>pay another invoice</a></p>
<script>
const status = document.getElementById("status");
const result = document.getElementById("result");
const source = new EventSource(location.pathname);
source.addEventListener("status", (e) => {
  status.textContent = e.data;
  if (e.data.startsWith("error")) source.close();
});
source.addEventListener("result", (e) => {
  result.textContent = JSON.stringify(JSON.parse(e.data), null, 2);
});
</script>
<style>
body {
  margin: 10px auto;
  width: 800px;
  max-width: 90%;
}
pre {
  white-space: pre-wrap;
  word-break: break-all;
}
</style>
"#;

pub fn create_pages_router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

/// Page that follows one payment through the event stream at its own URL.
pub fn stream_page(payment_hash: &PaymentHash) -> Html<String> {
    Html(STREAM_PAGE.replace("{payment_hash}", payment_hash.as_str()))
}
