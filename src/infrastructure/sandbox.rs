use crate::domain::catalog::Bank;
use crate::domain::payment::{
    BankTransferRequest, MobileMoneyRequest, Payment, PaymentId, PaymentStatus, ProofOfTransfer,
    Rail,
};
use crate::domain::ports::{GatewayError, GatewayResult, PaymentGateway};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-memory stand-in for the payment backend's sandbox mode.
///
/// Assigns fake provider transaction ids and transfer references from a
/// monotonic counter, honors `simulate_success`, and exposes the two
/// external drivers the real backend keeps behind webhooks and the admin
/// dashboard: `apply_external_status` and `validate_bank_payment`.
#[derive(Clone)]
pub struct SandboxGateway {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
    sequence: Arc<AtomicU64>,
}

/// Tuition amount reported for every sandbox payment; the real backend
/// derives it from the EC's price.
const SANDBOX_AMOUNT: u64 = 150_000;

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self {
            payments: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn bank_details() -> Vec<Bank> {
        let bank = |id: &str, name: &str, color: &str, rib: &str, swift: &str| Bank {
            id: id.into(),
            name: name.to_string(),
            color: Some(color.to_string()),
            rib: Some(rib.to_string()),
            account_name: Some("CNTEMAD".to_string()),
            swift: Some(swift.to_string()),
        };
        vec![
            bank(
                "bfv",
                "BFV-SG",
                "#1E40AF",
                "00005 00001 01234567890 12",
                "BFVMMGMG",
            ),
            bank(
                "bni",
                "BNI Madagascar",
                "#059669",
                "00001 00002 01234567890 34",
                "BNIMMGMG",
            ),
        ]
    }

    async fn update<F>(&self, payment_id: &PaymentId, apply: F) -> GatewayResult<Payment>
    where
        F: FnOnce(&mut Payment) -> GatewayResult<()>,
    {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(payment_id)
            .ok_or_else(|| GatewayError::Unavailable(format!("payment {payment_id} not found")))?;
        apply(payment)?;
        Ok(payment.clone())
    }

    /// Stands in for the provider webhook: overwrites the stored status with
    /// whatever string the provider reported, recognized or not.
    pub async fn apply_external_status(
        &self,
        payment_id: &PaymentId,
        status: PaymentStatus,
    ) -> GatewayResult<Payment> {
        self.update(payment_id, |payment| {
            payment.status = status;
            Ok(())
        })
        .await
    }

    /// Stands in for the center admin's validation step on the bank rail.
    pub async fn validate_bank_payment(
        &self,
        payment_id: &PaymentId,
        approved: bool,
        note: &str,
    ) -> GatewayResult<Payment> {
        self.update(payment_id, |payment| {
            if payment.status != PaymentStatus::PendingValidation {
                return Err(GatewayError::Unavailable(format!(
                    "payment is {}, expected pending_validation",
                    payment.status
                )));
            }
            if approved {
                payment.status = PaymentStatus::Completed;
            } else {
                payment.status = PaymentStatus::Rejected;
                payment
                    .metadata
                    .insert("failure_reason".to_string(), json!(note));
            }
            payment
                .metadata
                .insert("validation_note".to_string(), json!(note));
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn initiate_mobile_money(&self, req: &MobileMoneyRequest) -> GatewayResult<Payment> {
        let seq = self.next_seq();
        let tx_id = format!("{}-{seq:06}", req.provider.as_str().to_uppercase());
        let payment = Payment {
            id: PaymentId(format!("PAY-{seq:04}")),
            status: PaymentStatus::Processing,
            rail: Rail::MobileMoney,
            amount: Some(Decimal::from(SANDBOX_AMOUNT)),
            metadata: serde_json::Map::from_iter([
                ("ec".to_string(), json!(req.ec.as_str())),
                ("provider".to_string(), json!(req.provider.as_str())),
                ("phone_last4".to_string(), json!(req.phone.last4())),
                ("provider_transaction_id".to_string(), json!(tx_id)),
                (
                    "message".to_string(),
                    json!("Payment initiated (sandbox). Confirm on your phone."),
                ),
            ]),
        };
        self.payments
            .write()
            .await
            .insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    async fn check_status(&self, payment_id: &PaymentId) -> GatewayResult<Payment> {
        self.payments
            .read()
            .await
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Unavailable(format!("payment {payment_id} not found")))
    }

    async fn initiate_bank_transfer(&self, req: &BankTransferRequest) -> GatewayResult<Payment> {
        let bank = Self::bank_details()
            .into_iter()
            .find(|b| b.id == req.bank)
            .ok_or_else(|| GatewayError::Unavailable(format!("unknown bank {}", req.bank)))?;

        let seq = self.next_seq();
        let reference = format!("CNT-{}-{seq:04}", req.ec.as_str().to_uppercase());
        let payment = Payment {
            id: PaymentId(format!("PAY-{seq:04}")),
            status: PaymentStatus::PendingTransfer,
            rail: Rail::BankTransfer,
            amount: Some(Decimal::from(SANDBOX_AMOUNT)),
            metadata: serde_json::Map::from_iter([
                ("ec".to_string(), json!(req.ec.as_str())),
                ("reference".to_string(), json!(reference)),
                (
                    "instructions".to_string(),
                    json!({
                        "bank": bank.id.as_str(),
                        "bank_name": bank.name,
                        "rib": bank.rib,
                        "account_name": bank.account_name,
                        "swift": bank.swift,
                    }),
                ),
                (
                    "message".to_string(),
                    json!("Make the transfer with the given reference, then submit your proof."),
                ),
            ]),
        };
        self.payments
            .write()
            .await
            .insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    async fn submit_bank_proof(
        &self,
        payment_id: &PaymentId,
        proof: &ProofOfTransfer,
    ) -> GatewayResult<Payment> {
        self.update(payment_id, |payment| {
            if payment.status != PaymentStatus::PendingTransfer {
                return Err(GatewayError::InvalidProof(format!(
                    "payment is {}, expected pending_transfer",
                    payment.status
                )));
            }
            payment.status = PaymentStatus::PendingValidation;
            payment
                .metadata
                .insert("proof_type".to_string(), json!(proof.proof_type));
            payment
                .metadata
                .insert("proof_value".to_string(), json!(proof.value));
            Ok(())
        })
        .await
    }

    async fn list_banks(&self) -> GatewayResult<Vec<Bank>> {
        Ok(Self::bank_details())
    }

    async fn simulate_success(&self, payment_id: &PaymentId) -> GatewayResult<Payment> {
        self.update(payment_id, |payment| {
            let in_flight = matches!(
                payment.status,
                PaymentStatus::Pending | PaymentStatus::Processing
            );
            if !in_flight {
                return Err(GatewayError::Unavailable(format!(
                    "payment is {}, cannot simulate success",
                    payment.status
                )));
            }
            payment.status = PaymentStatus::Completed;
            payment
                .metadata
                .insert("message".to_string(), json!("Payment simulated (sandbox)"));
            Ok(())
        })
        .await
    }
}
