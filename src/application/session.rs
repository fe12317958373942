use crate::application::poller::{PollOutcome, StatusPoller};
use crate::application::state_machine::{PaymentSnapshot, PaymentStateMachine};
use crate::domain::catalog::RailRegistry;
use crate::domain::payment::{
    BankId, EcId, PaymentRequest, ProofOfTransfer, ProofType, ProviderId,
};
use crate::domain::ports::GatewayArc;
use crate::error::{PaymentError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Process-local handle over one payment attempt and its poll.
///
/// All entry points route through the session so the "at most one in-flight
/// attempt, at most one active poll" invariants hold regardless of caller
/// discipline. Manual calls fail with `OperationInProgress` while another
/// call still holds the machine; the poller task queues behind them instead.
pub struct PaymentSession {
    registry: Arc<RailRegistry>,
    gateway: GatewayArc,
    machine: Arc<Mutex<PaymentStateMachine>>,
    poller: StatusPoller,
}

impl PaymentSession {
    pub fn new(gateway: GatewayArc, registry: Arc<RailRegistry>) -> Self {
        let machine = Arc::new(Mutex::new(PaymentStateMachine::new(Arc::clone(&gateway))));
        Self {
            registry,
            gateway,
            machine,
            poller: StatusPoller::new(),
        }
    }

    pub fn registry(&self) -> &RailRegistry {
        &self.registry
    }

    fn lock_machine(&self) -> Result<tokio::sync::MutexGuard<'_, PaymentStateMachine>> {
        self.machine
            .try_lock()
            .map_err(|_| PaymentError::OperationInProgress)
    }

    /// Validates the number against the provider and pushes a mobile money
    /// payment. Validation failures never reach the gateway.
    pub async fn initiate_mobile_money(
        &mut self,
        ec: EcId,
        provider: ProviderId,
        raw_phone: &str,
    ) -> Result<PaymentSnapshot> {
        let request = PaymentRequest::mobile_money(ec, provider, raw_phone, &self.registry)?;
        let mut machine = self
            .machine
            .try_lock()
            .map_err(|_| PaymentError::OperationInProgress)?;
        // A rejected attempt must not touch the poll that is still watching
        // the current one.
        if let Some(status) = machine.open_attempt() {
            return Err(PaymentError::AttemptInProgress(status));
        }
        self.poller.stop();
        machine.initiate(request).await
    }

    /// Opens a bank transfer attempt; its second stage is caller-driven
    /// proof submission, never polling.
    pub async fn initiate_bank_transfer(
        &mut self,
        ec: EcId,
        bank: BankId,
    ) -> Result<PaymentSnapshot> {
        let request = PaymentRequest::bank_transfer(ec, bank, &self.registry)?;
        let mut machine = self
            .machine
            .try_lock()
            .map_err(|_| PaymentError::OperationInProgress)?;
        if let Some(status) = machine.open_attempt() {
            return Err(PaymentError::AttemptInProgress(status));
        }
        self.poller.stop();
        machine.initiate(request).await
    }

    pub async fn refresh(&self) -> Result<PaymentSnapshot> {
        let mut machine = self.lock_machine()?;
        machine.refresh().await
    }

    pub async fn submit_proof(
        &self,
        proof_type: ProofType,
        proof_value: &str,
    ) -> Result<PaymentSnapshot> {
        let proof = ProofOfTransfer::new(proof_type, proof_value)?;
        let mut machine = self.lock_machine()?;
        machine.submit_proof(proof).await
    }

    pub async fn simulate_success(&self) -> Result<PaymentSnapshot> {
        let mut machine = self.lock_machine()?;
        machine.simulate_success().await
    }

    /// Starts polling the current mobile-money attempt, replacing any poll
    /// already running for this session.
    pub fn start_polling(&mut self, interval: Duration, max_attempts: u32) -> Result<()> {
        let snapshot = self.lock_machine()?.snapshot();
        let pollable = snapshot
            .status
            .as_ref()
            .is_some_and(|status| status.is_pollable());
        let payment_id = match (pollable, snapshot.payment_id()) {
            (true, Some(id)) => id.clone(),
            _ => {
                return Err(PaymentError::InvalidState {
                    operation: "start_polling",
                    status: snapshot
                        .status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "idle".to_string()),
                });
            }
        };

        self.poller.start(
            Arc::clone(&self.machine),
            payment_id,
            interval,
            max_attempts,
        );
        Ok(())
    }

    pub fn stop_polling(&mut self) {
        self.poller.stop();
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// Blocks until the active poll finishes. Timeout surfaces as
    /// `PollTimeout` with the machine state untouched; a poll stopped from
    /// elsewhere simply yields the current snapshot.
    pub async fn wait_for_poll(&mut self) -> Result<PaymentSnapshot> {
        match self.poller.wait().await {
            Some(PollOutcome::TimedOut { attempts }) => Err(PaymentError::PollTimeout { attempts }),
            Some(PollOutcome::Settled(_)) | None => Ok(self.snapshot().await),
        }
    }

    pub async fn snapshot(&self) -> PaymentSnapshot {
        self.machine.lock().await.snapshot()
    }

    /// Cancels any active poll, discards the current payment and returns the
    /// machine to idle.
    pub async fn reset(&mut self) {
        self.poller.stop();
        self.machine.lock().await.reset();
    }

    /// Refreshes the bank catalog from the gateway, keeping the built-in
    /// entries on failure.
    pub async fn sync_banks(&self) {
        self.registry.sync_banks(self.gateway.as_ref()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Bank;
    use crate::domain::payment::{
        BankTransferRequest, MobileMoneyRequest, Payment, PaymentId, PaymentStatus, Rail,
    };
    use crate::domain::ports::{GatewayResult, PaymentGateway};
    use async_trait::async_trait;

    struct AcceptingGateway;

    #[async_trait]
    impl PaymentGateway for AcceptingGateway {
        async fn initiate_mobile_money(&self, _req: &MobileMoneyRequest) -> GatewayResult<Payment> {
            Ok(Payment {
                id: PaymentId::from("PAY-1"),
                status: PaymentStatus::Pending,
                rail: Rail::MobileMoney,
                amount: None,
                metadata: serde_json::Map::new(),
            })
        }
        async fn check_status(&self, payment_id: &PaymentId) -> GatewayResult<Payment> {
            Ok(Payment {
                id: payment_id.clone(),
                status: PaymentStatus::Processing,
                rail: Rail::MobileMoney,
                amount: None,
                metadata: serde_json::Map::new(),
            })
        }
        async fn initiate_bank_transfer(
            &self,
            _req: &BankTransferRequest,
        ) -> GatewayResult<Payment> {
            Ok(Payment {
                id: PaymentId::from("PAY-2"),
                status: PaymentStatus::PendingTransfer,
                rail: Rail::BankTransfer,
                amount: None,
                metadata: serde_json::Map::new(),
            })
        }
        async fn submit_bank_proof(
            &self,
            payment_id: &PaymentId,
            _proof: &ProofOfTransfer,
        ) -> GatewayResult<Payment> {
            Ok(Payment {
                id: payment_id.clone(),
                status: PaymentStatus::PendingValidation,
                rail: Rail::BankTransfer,
                amount: None,
                metadata: serde_json::Map::new(),
            })
        }
        async fn list_banks(&self) -> GatewayResult<Vec<Bank>> {
            Ok(vec![])
        }
    }

    fn session() -> PaymentSession {
        PaymentSession::new(Arc::new(AcceptingGateway), Arc::new(RailRegistry::new()))
    }

    #[tokio::test]
    async fn test_manual_call_rejected_while_machine_is_held() {
        let session = session();
        let _guard = session.machine.try_lock().unwrap();

        let err = session.refresh().await.unwrap_err();
        assert!(matches!(err, PaymentError::OperationInProgress));
    }

    #[tokio::test]
    async fn test_validation_failure_is_local() {
        let mut session = session();
        // 032 belongs to orange_money
        let err = session
            .initiate_mobile_money(
                EcId::from("EC-101"),
                ProviderId::from("mvola"),
                "032 55 55555",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::PrefixMismatch { .. }));
        assert_eq!(session.snapshot().await.status, None);
    }

    #[tokio::test]
    async fn test_polling_requires_pollable_attempt() {
        let mut session = session();
        let err = session
            .start_polling(Duration::from_millis(10), 3)
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState { .. }));

        session
            .initiate_bank_transfer(EcId::from("EC-101"), BankId::from("bfv"))
            .await
            .unwrap();
        let err = session
            .start_polling(Duration::from_millis(10), 3)
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_reset_returns_session_to_idle() {
        let mut session = session();
        session
            .initiate_mobile_money(
                EcId::from("EC-101"),
                ProviderId::from("mvola"),
                "0341234567",
            )
            .await
            .unwrap();
        session.start_polling(Duration::from_secs(5), 10).unwrap();
        assert!(session.is_polling());

        session.reset().await;
        assert!(!session.is_polling());
        assert_eq!(session.snapshot().await.status, None);
    }
}
