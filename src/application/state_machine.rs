use crate::domain::payment::{
    Payment, PaymentId, PaymentRequest, PaymentStatus, ProofOfTransfer,
};
use crate::domain::ports::GatewayArc;
use crate::error::{PaymentError, Result};
use serde::Serialize;

/// Read-only view of the machine handed to callers. Cloned per call; mutating
/// it has no effect on the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSnapshot {
    /// `None` means idle: no attempt has been started yet.
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    /// Most recent gateway failure detail, cleared on a fresh attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.as_ref().is_some_and(PaymentStatus::is_terminal)
    }

    pub fn payment_id(&self) -> Option<&PaymentId> {
        self.payment.as_ref().map(|p| &p.id)
    }
}

/// Authoritative lifecycle of a single payment attempt.
///
/// Mobile money: `idle → pending → processing → completed | failed`.
/// Bank transfer: `idle → pending_transfer → pending_validation →
/// completed | rejected`. The two rails share the session, error taxonomy
/// and snapshot shape but never a transition table: the bank rail has a
/// human validation step the automatic rail does not.
///
/// The machine stores statuses exactly as the gateway returns them; the only
/// locally invented state is the optimistic `pending`/`pending_transfer` set
/// before the first gateway response arrives.
pub struct PaymentStateMachine {
    gateway: GatewayArc,
    status: Option<PaymentStatus>,
    payment: Option<Payment>,
    last_error: Option<String>,
}

impl PaymentStateMachine {
    pub fn new(gateway: GatewayArc) -> Self {
        Self {
            gateway,
            status: None,
            payment: None,
            last_error: None,
        }
    }

    pub fn snapshot(&self) -> PaymentSnapshot {
        PaymentSnapshot {
            status: self.status.clone(),
            payment: self.payment.clone(),
            error: self.last_error.clone(),
        }
    }

    /// Status of a still-open attempt, `None` when idle or terminal.
    pub fn open_attempt(&self) -> Option<PaymentStatus> {
        self.status.clone().filter(|status| !status.is_terminal())
    }

    fn current_status_name(&self) -> String {
        self.status
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "idle".to_string())
    }

    fn adopt(&mut self, update: Payment) {
        self.status = Some(update.status.clone());
        match &mut self.payment {
            Some(payment) => payment.absorb(update),
            None => self.payment = Some(update),
        }
    }

    /// Starts a new attempt. Permitted from idle or any terminal state;
    /// a non-terminal attempt must finish (or the session be reset) first.
    ///
    /// A gateway failure is folded into the `failed` state and reported
    /// through the snapshot rather than raised.
    pub async fn initiate(&mut self, request: PaymentRequest) -> Result<PaymentSnapshot> {
        if let Some(status) = self.open_attempt() {
            return Err(PaymentError::AttemptInProgress(status));
        }

        self.payment = None;
        self.last_error = None;

        let outcome = match &request {
            PaymentRequest::MobileMoney(req) => {
                self.status = Some(PaymentStatus::Pending);
                tracing::debug!(
                    ec = %req.ec,
                    provider = %req.provider,
                    phone_last4 = req.phone.last4(),
                    "initiating mobile money payment"
                );
                self.gateway.initiate_mobile_money(req).await
            }
            PaymentRequest::BankTransfer(req) => {
                self.status = Some(PaymentStatus::PendingTransfer);
                tracing::debug!(ec = %req.ec, bank = %req.bank, "initiating bank transfer");
                self.gateway.initiate_bank_transfer(req).await
            }
        };

        match outcome {
            Ok(payment) => {
                tracing::debug!(payment_id = %payment.id, status = %payment.status, "attempt opened");
                self.adopt(payment);
            }
            Err(err) => {
                tracing::debug!(error = %err, "initiation failed");
                self.status = Some(PaymentStatus::Failed);
                self.last_error = Some(err.to_string());
            }
        }
        Ok(self.snapshot())
    }

    /// Re-reads the status from the gateway. Only meaningful while the
    /// mobile-money attempt is in a pollable status (`pending`,
    /// `processing`, or an unrecognized one); from any other state this is
    /// a no-op returning the current snapshot, never a network call.
    ///
    /// A transport failure leaves the state untouched: the payment may still
    /// be moving server-side.
    pub async fn refresh(&mut self) -> Result<PaymentSnapshot> {
        let pollable = self.status.as_ref().is_some_and(PaymentStatus::is_pollable);
        let payment_id = match (pollable, &self.payment) {
            (true, Some(payment)) => payment.id.clone(),
            _ => return Ok(self.snapshot()),
        };

        match self.gateway.check_status(&payment_id).await {
            Ok(update) => {
                if self.status.as_ref() != Some(&update.status) {
                    tracing::debug!(payment_id = %payment_id, status = %update.status, "status changed");
                }
                self.adopt(update);
                Ok(self.snapshot())
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Attaches proof of a completed bank transfer. Valid only while the
    /// attempt is `pending_transfer`; on any failure that state is preserved
    /// so the proof can be resubmitted without re-initiating the transfer.
    pub async fn submit_proof(&mut self, proof: ProofOfTransfer) -> Result<PaymentSnapshot> {
        if self.status != Some(PaymentStatus::PendingTransfer) {
            return Err(PaymentError::InvalidState {
                operation: "submit_proof",
                status: self.current_status_name(),
            });
        }
        let payment_id = match &self.payment {
            Some(payment) => payment.id.clone(),
            None => {
                return Err(PaymentError::InvalidState {
                    operation: "submit_proof",
                    status: self.current_status_name(),
                });
            }
        };

        match self.gateway.submit_bank_proof(&payment_id, &proof).await {
            Ok(update) => {
                tracing::debug!(payment_id = %payment_id, status = %update.status, "proof accepted");
                self.adopt(update);
                Ok(self.snapshot())
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Sandbox-only shortcut to `completed`. The gateway contract rejects it
    /// outside sandbox environments; the core only guards the local states.
    pub async fn simulate_success(&mut self) -> Result<PaymentSnapshot> {
        // Only from the two recognized in-flight mobile-money statuses; an
        // unrecognized one stays with the gateway until it resolves.
        let allowed = matches!(
            self.status,
            Some(PaymentStatus::Pending | PaymentStatus::Processing)
        );
        let payment_id = match (allowed, &self.payment) {
            (true, Some(payment)) => payment.id.clone(),
            _ => {
                return Err(PaymentError::InvalidState {
                    operation: "simulate_success",
                    status: self.current_status_name(),
                });
            }
        };

        match self.gateway.simulate_success(&payment_id).await {
            Ok(update) => {
                self.adopt(update);
                Ok(self.snapshot())
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Discards the current attempt and returns to idle.
    pub fn reset(&mut self) {
        self.status = None;
        self.payment = None;
        self.last_error = None;
    }
}
