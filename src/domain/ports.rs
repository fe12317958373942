use crate::domain::catalog::Bank;
use crate::domain::payment::{
    BankTransferRequest, MobileMoneyRequest, Payment, PaymentId, ProofOfTransfer,
};
use crate::error::PaymentError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Transport/backend failures at the gateway boundary. The core treats them
/// uniformly; the detail string is retained for diagnostics only.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("proof rejected by gateway: {0}")]
    InvalidProof(String),
    #[error("operation not supported by this gateway: {0}")]
    Unsupported(&'static str),
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidProof(detail) => PaymentError::InvalidProof(detail),
            other => PaymentError::GatewayUnavailable(other.to_string()),
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// The external payment backend the core orchestrates against.
///
/// All operations are asynchronous and may fail with a transport error.
/// `check_status` is read-only and safe to call repeatedly; the initiation
/// operations are only retried before a payment identifier has been
/// assigned.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Pushes a payment request to the holder of `phone`. The returned
    /// payment stays within `pending`/`processing`.
    async fn initiate_mobile_money(&self, req: &MobileMoneyRequest) -> GatewayResult<Payment>;

    /// Current snapshot of a payment, status verbatim from the backend.
    async fn check_status(&self, payment_id: &PaymentId) -> GatewayResult<Payment>;

    /// Opens a bank transfer: returns a `pending_transfer` payment carrying
    /// the transfer instructions in its metadata.
    async fn initiate_bank_transfer(&self, req: &BankTransferRequest) -> GatewayResult<Payment>;

    /// Attaches proof of transfer, moving `pending_transfer` to
    /// `pending_validation`. Fails with `InvalidProof` when the backend does
    /// not accept the proof.
    async fn submit_bank_proof(
        &self,
        payment_id: &PaymentId,
        proof: &ProofOfTransfer,
    ) -> GatewayResult<Payment>;

    /// Catalog sync. Callers fall back to the built-in catalog on failure.
    async fn list_banks(&self) -> GatewayResult<Vec<Bank>>;

    /// Sandbox escape hatch forcing a `pending`/`processing` payment to
    /// `completed`. Production gateways reject it.
    async fn simulate_success(&self, _payment_id: &PaymentId) -> GatewayResult<Payment> {
        Err(GatewayError::Unsupported("simulate_success"))
    }
}

pub type GatewayArc = Arc<dyn PaymentGateway>;
