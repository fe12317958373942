use crate::domain::payment::PaymentStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("phone number must contain exactly 10 digits (got {0})")]
    PhoneLength(usize),
    #[error("unknown mobile money provider: {0}")]
    UnknownProvider(String),
    #[error("number prefix {prefix} is not valid for {provider} (accepted prefixes: {accepted})")]
    PrefixMismatch {
        prefix: String,
        provider: String,
        accepted: String,
    },
    #[error("unknown bank: {0}")]
    UnknownBank(String),
    #[error("invalid transfer proof: {0}")]
    InvalidProof(String),
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("a payment attempt is already in progress (status: {0})")]
    AttemptInProgress(PaymentStatus),
    #[error("another operation on this payment session is still outstanding")]
    OperationInProgress,
    #[error("status polling gave up after {attempts} attempts; the payment may still resolve")]
    PollTimeout { attempts: u32 },
    #[error("{operation} is not allowed while the payment is {status}")]
    InvalidState {
        operation: &'static str,
        status: String,
    },
}

pub type Result<T> = std::result::Result<T, PaymentError>;
