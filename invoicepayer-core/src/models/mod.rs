pub mod payment;

pub use payment::{
    AttemptStatus, DecodedInvoice, PaymentAttempt, PaymentHash, PaymentStatus, WaitResponse,
};
