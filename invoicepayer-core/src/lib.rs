pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;

pub use backend::{ClnRestClient, InvoiceDecoder, PaymentBackend};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{
    AttemptStatus, DecodedInvoice, PaymentAttempt, PaymentHash, PaymentStatus, WaitResponse,
};
