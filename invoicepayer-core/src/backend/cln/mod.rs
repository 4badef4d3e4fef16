//! Core Lightning REST (clnrest) backend

mod client;
mod error;
mod types;

pub use client::ClnRestClient;
pub use error::ClnError;
pub use types::rpc_error_message;
