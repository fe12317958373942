use crate::domain::payment::{BankId, ProviderId};
use crate::domain::ports::PaymentGateway;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A mobile money operator: accepted number prefixes route phone numbers to
/// it during pre-flight validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    /// Three-digit prefixes; disjoint across providers in a valid catalog.
    pub prefixes: Vec<String>,
    pub color: String,
}

/// A bank accepting tuition transfers. Transfer instructions (RIB, account
/// name, SWIFT) are present when the entry was synced from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    pub id: BankId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rib: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swift: Option<String>,
}

#[derive(Debug, Clone)]
struct Catalog {
    providers: Vec<Provider>,
    banks: Vec<Bank>,
}

impl Catalog {
    fn built_in() -> Self {
        let provider = |id: &str, name: &str, prefixes: &[&str], color: &str| Provider {
            id: ProviderId::from(id),
            name: name.to_string(),
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            color: color.to_string(),
        };
        let bank = |id: &str, name: &str, color: &str| Bank {
            id: BankId::from(id),
            name: name.to_string(),
            color: Some(color.to_string()),
            rib: None,
            account_name: None,
            swift: None,
        };
        Self {
            providers: vec![
                provider("mvola", "MVola", &["034", "038"], "#FFD700"),
                provider("orange_money", "Orange Money", &["032", "037"], "#FF6600"),
                provider("airtel_money", "Airtel Money", &["033"], "#E4002B"),
            ],
            banks: vec![
                bank("bfv", "BFV-SG", "#1E40AF"),
                bank("bni", "BNI Madagascar", "#059669"),
            ],
        }
    }
}

/// Read-only catalog of payment rails, seeded at startup from the built-in
/// configuration.
///
/// The bank list can be refreshed from the gateway; the refresh is atomic
/// (readers never observe a partially-updated catalog) and only adds or
/// updates entries, so an id referenced by an in-flight request can never
/// disappear under it. Sync failures fall back to the current catalog.
#[derive(Debug)]
pub struct RailRegistry {
    catalog: RwLock<Catalog>,
}

impl Default for RailRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RailRegistry {
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Catalog::built_in()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn provider(&self, id: &ProviderId) -> Option<Provider> {
        self.read().providers.iter().find(|p| &p.id == id).cloned()
    }

    pub fn bank(&self, id: &BankId) -> Option<Bank> {
        self.read().banks.iter().find(|b| &b.id == id).cloned()
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.read().providers.clone()
    }

    pub fn banks(&self) -> Vec<Bank> {
        self.read().banks.clone()
    }

    /// Provider whose prefix set contains `prefix`, first match wins.
    pub fn provider_for_prefix(&self, prefix: &str) -> Option<Provider> {
        self.read()
            .providers
            .iter()
            .find(|p| p.prefixes.iter().any(|candidate| candidate == prefix))
            .cloned()
    }

    /// Refreshes the bank list from the gateway, merging by id. On failure
    /// the current catalog stays in place; the error is logged, not surfaced.
    pub async fn sync_banks(&self, gateway: &dyn PaymentGateway) {
        match gateway.list_banks().await {
            Ok(fetched) => {
                let mut catalog = self.write();
                for bank in fetched {
                    match catalog.banks.iter_mut().find(|b| b.id == bank.id) {
                        Some(existing) => *existing = bank,
                        None => catalog.banks.push(bank),
                    }
                }
                tracing::debug!(banks = catalog.banks.len(), "bank catalog synced");
            }
            Err(err) => {
                tracing::warn!(error = %err, "bank catalog sync failed, keeping current catalog");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{
        BankTransferRequest, MobileMoneyRequest, Payment, PaymentId, ProofOfTransfer,
    };
    use crate::domain::ports::{GatewayError, GatewayResult};
    use async_trait::async_trait;

    struct BankSyncStub {
        response: GatewayResult<Vec<Bank>>,
    }

    #[async_trait]
    impl PaymentGateway for BankSyncStub {
        async fn initiate_mobile_money(&self, _req: &MobileMoneyRequest) -> GatewayResult<Payment> {
            unimplemented!()
        }
        async fn check_status(&self, _payment_id: &PaymentId) -> GatewayResult<Payment> {
            unimplemented!()
        }
        async fn initiate_bank_transfer(
            &self,
            _req: &BankTransferRequest,
        ) -> GatewayResult<Payment> {
            unimplemented!()
        }
        async fn submit_bank_proof(
            &self,
            _payment_id: &PaymentId,
            _proof: &ProofOfTransfer,
        ) -> GatewayResult<Payment> {
            unimplemented!()
        }
        async fn list_banks(&self) -> GatewayResult<Vec<Bank>> {
            match &self.response {
                Ok(banks) => Ok(banks.clone()),
                Err(_) => Err(GatewayError::Unavailable("stubbed outage".to_string())),
            }
        }
    }

    #[test]
    fn test_built_in_catalog() {
        let registry = RailRegistry::new();
        assert_eq!(registry.providers().len(), 3);
        assert_eq!(registry.banks().len(), 2);

        let mvola = registry.provider(&ProviderId::from("mvola")).unwrap();
        assert_eq!(mvola.prefixes, vec!["034", "038"]);
        assert!(registry.bank(&BankId::from("bfv")).is_some());
        assert!(registry.bank(&BankId::from("boa")).is_none());
    }

    #[test]
    fn test_prefix_lookup_routes_to_provider() {
        let registry = RailRegistry::new();
        assert_eq!(
            registry.provider_for_prefix("037").unwrap().id,
            ProviderId::from("orange_money")
        );
        assert!(registry.provider_for_prefix("030").is_none());
    }

    #[tokio::test]
    async fn test_sync_merges_without_removing() {
        let registry = RailRegistry::new();
        let stub = BankSyncStub {
            response: Ok(vec![
                Bank {
                    id: BankId::from("bfv"),
                    name: "BFV-SG".to_string(),
                    color: None,
                    rib: Some("00005 00001 01234567890 12".to_string()),
                    account_name: Some("CNTEMAD".to_string()),
                    swift: Some("BFVMMGMG".to_string()),
                },
                Bank {
                    id: BankId::from("boa"),
                    name: "BOA Madagascar".to_string(),
                    color: None,
                    rib: None,
                    account_name: None,
                    swift: None,
                },
            ]),
        };

        registry.sync_banks(&stub).await;

        // bni was not in the fetched list but must survive the refresh
        assert!(registry.bank(&BankId::from("bni")).is_some());
        assert!(registry.bank(&BankId::from("boa")).is_some());
        let bfv = registry.bank(&BankId::from("bfv")).unwrap();
        assert_eq!(bfv.swift.as_deref(), Some("BFVMMGMG"));
        assert_eq!(registry.banks().len(), 3);
    }

    #[tokio::test]
    async fn test_sync_failure_keeps_catalog() {
        let registry = RailRegistry::new();
        let stub = BankSyncStub {
            response: Err(GatewayError::Unavailable("down".to_string())),
        };

        registry.sync_banks(&stub).await;
        assert_eq!(registry.banks().len(), 2);
    }
}
