#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tuitionpay::domain::catalog::Bank;
use tuitionpay::domain::payment::{
    BankTransferRequest, MobileMoneyRequest, Payment, PaymentId, PaymentStatus, ProofOfTransfer,
    Rail,
};
use tuitionpay::domain::ports::{GatewayError, GatewayResult, PaymentGateway};

/// Gateway test double with scripted `check_status` responses and switchable
/// failures, recording every call it receives.
pub struct ScriptedGateway {
    /// Statuses returned by successive `check_status` calls; once drained,
    /// `default_status` is returned forever.
    pub statuses: Mutex<VecDeque<PaymentStatus>>,
    pub default_status: Mutex<PaymentStatus>,
    pub fail_initiate: AtomicBool,
    pub fail_check: AtomicBool,
    pub fail_proof: AtomicBool,
    pub reject_proof: AtomicBool,
    pub calls: Mutex<Vec<String>>,
    seq: AtomicU64,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            default_status: Mutex::new(PaymentStatus::Pending),
            fail_initiate: AtomicBool::new(false),
            fail_check: AtomicBool::new(false),
            fail_proof: AtomicBool::new(false),
            reject_proof: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            seq: AtomicU64::new(1),
        }
    }

    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = PaymentStatus>) {
        self.statuses.lock().unwrap().extend(statuses);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn check_status_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with("check_status"))
            .count()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self) -> PaymentId {
        PaymentId::from(format!("PAY-{:04}", self.seq.fetch_add(1, Ordering::SeqCst)))
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate_mobile_money(&self, req: &MobileMoneyRequest) -> GatewayResult<Payment> {
        self.log(format!("initiate_mobile_money:{}", req.ec));
        if self.fail_initiate.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("provider api down".to_string()));
        }
        Ok(Payment {
            id: self.next_id(),
            status: PaymentStatus::Pending,
            rail: Rail::MobileMoney,
            amount: Some(dec!(150000)),
            metadata: serde_json::Map::from_iter([
                ("provider".to_string(), json!(req.provider.as_str())),
                ("phone_last4".to_string(), json!(req.phone.last4())),
            ]),
        })
    }

    async fn check_status(&self, payment_id: &PaymentId) -> GatewayResult<Payment> {
        self.log(format!("check_status:{payment_id}"));
        if self.fail_check.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("status endpoint down".to_string()));
        }
        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_status.lock().unwrap().clone());
        Ok(Payment {
            id: payment_id.clone(),
            status,
            rail: Rail::MobileMoney,
            amount: Some(dec!(150000)),
            metadata: serde_json::Map::new(),
        })
    }

    async fn initiate_bank_transfer(&self, req: &BankTransferRequest) -> GatewayResult<Payment> {
        self.log(format!("initiate_bank_transfer:{}", req.ec));
        if self.fail_initiate.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("gateway down".to_string()));
        }
        Ok(Payment {
            id: self.next_id(),
            status: PaymentStatus::PendingTransfer,
            rail: Rail::BankTransfer,
            amount: Some(dec!(150000)),
            metadata: serde_json::Map::from_iter([
                ("reference".to_string(), json!("CNT-TEST-0001")),
                ("bank".to_string(), json!(req.bank.as_str())),
            ]),
        })
    }

    async fn submit_bank_proof(
        &self,
        payment_id: &PaymentId,
        proof: &ProofOfTransfer,
    ) -> GatewayResult<Payment> {
        self.log(format!("submit_bank_proof:{payment_id}"));
        if self.fail_proof.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("gateway down".to_string()));
        }
        if self.reject_proof.load(Ordering::SeqCst) {
            return Err(GatewayError::InvalidProof("unreadable receipt".to_string()));
        }
        Ok(Payment {
            id: payment_id.clone(),
            status: PaymentStatus::PendingValidation,
            rail: Rail::BankTransfer,
            amount: None,
            metadata: serde_json::Map::from_iter([
                ("proof_type".to_string(), json!(proof.proof_type)),
                ("proof_value".to_string(), json!(proof.value)),
            ]),
        })
    }

    async fn list_banks(&self) -> GatewayResult<Vec<Bank>> {
        self.log("list_banks".to_string());
        Ok(Vec::new())
    }

    async fn simulate_success(&self, payment_id: &PaymentId) -> GatewayResult<Payment> {
        self.log(format!("simulate_success:{payment_id}"));
        Ok(Payment {
            id: payment_id.clone(),
            status: PaymentStatus::Completed,
            rail: Rail::MobileMoney,
            amount: Some(dec!(150000)),
            metadata: serde_json::Map::new(),
        })
    }
}
