use crate::domain::catalog::RailRegistry;
use crate::domain::phone;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier assigned by the gateway on the first successful initiation.
    PaymentId
);
string_id!(
    /// Reference of the enrollment/EC the payment is for.
    EcId
);
string_id!(ProviderId);
string_id!(BankId);

/// A normalized, provider-validated Madagascar mobile number.
///
/// Can only be obtained through [`phone::validate`], so holding one proves
/// the pre-flight checks passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(pub(crate) String);

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four digits, the only part of the number that may be logged.
    pub fn last4(&self) -> &str {
        &self.0[self.0.len() - 4..]
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two money-movement pathways, with distinct lifecycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rail {
    MobileMoney,
    BankTransfer,
}

/// Wire-level payment status. The gateway is authoritative for every value
/// except the optimistic `pending`/`pending_transfer` set locally before the
/// first response arrives.
///
/// Statuses the core does not recognize are kept verbatim in `Unknown` and
/// are never treated as terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    PendingTransfer,
    PendingValidation,
    Rejected,
    #[serde(untagged)]
    Unknown(String),
}

impl PaymentStatus {
    /// No further transition happens from a terminal status without starting
    /// a new attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Rejected)
    }

    /// Statuses the mobile-money poller keeps watching. Unrecognized
    /// statuses stay pollable so a later recognized one can be picked up.
    pub fn is_pollable(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Unknown(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::PendingTransfer => "pending_transfer",
            Self::PendingValidation => "pending_validation",
            Self::Rejected => "rejected",
            Self::Unknown(other) => other,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway-owned record of one payment attempt, refined over the lifecycle.
///
/// `metadata` is whatever the gateway chooses to attach (provider transaction
/// id, bank instructions, proof echo) and is merged across responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub status: PaymentStatus,
    pub rail: Rail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Payment {
    /// Folds a newer gateway snapshot into this record: the status and amount
    /// are replaced, metadata keys are merged, the identifier is retained.
    pub fn absorb(&mut self, update: Payment) {
        self.status = update.status;
        if update.amount.is_some() {
            self.amount = update.amount;
        }
        for (key, value) in update.metadata {
            self.metadata.insert(key, value);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MobileMoneyRequest {
    pub ec: EcId,
    pub provider: ProviderId,
    pub phone: PhoneNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankTransferRequest {
    pub ec: EcId,
    pub bank: BankId,
}

/// A validated payment request, tagged by rail. Constructed only after the
/// registry/phone checks pass; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRequest {
    MobileMoney(MobileMoneyRequest),
    BankTransfer(BankTransferRequest),
}

impl PaymentRequest {
    pub fn mobile_money(
        ec: EcId,
        provider: ProviderId,
        raw_phone: &str,
        registry: &RailRegistry,
    ) -> Result<Self> {
        let phone = phone::validate(raw_phone, &provider, registry)?;
        Ok(Self::MobileMoney(MobileMoneyRequest {
            ec,
            provider,
            phone,
        }))
    }

    pub fn bank_transfer(ec: EcId, bank: BankId, registry: &RailRegistry) -> Result<Self> {
        if registry.bank(&bank).is_none() {
            return Err(PaymentError::UnknownBank(bank.0));
        }
        Ok(Self::BankTransfer(BankTransferRequest { ec, bank }))
    }

    pub fn rail(&self) -> Rail {
        match self {
            Self::MobileMoney(_) => Rail::MobileMoney,
            Self::BankTransfer(_) => Rail::BankTransfer,
        }
    }

    pub fn ec(&self) -> &EcId {
        match self {
            Self::MobileMoney(req) => &req.ec,
            Self::BankTransfer(req) => &req.ec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofType {
    Reference,
    Receipt,
}

impl fmt::Display for ProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Receipt => f.write_str("receipt"),
        }
    }
}

/// Proof of a completed bank transfer: a transfer reference number or a
/// receipt upload handle. The value is trimmed and must be at least three
/// characters; anything shorter is rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofOfTransfer {
    pub proof_type: ProofType,
    pub value: String,
}

impl ProofOfTransfer {
    pub const MIN_VALUE_LEN: usize = 3;

    pub fn new(proof_type: ProofType, value: &str) -> Result<Self> {
        let value = value.trim();
        if value.len() < Self::MIN_VALUE_LEN {
            return Err(PaymentError::InvalidProof(format!(
                "proof value must be at least {} characters",
                Self::MIN_VALUE_LEN
            )));
        }
        Ok(Self {
            proof_type,
            value: value.to_string(),
        })
    }
}
