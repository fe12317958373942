//! Pre-flight phone number checks for the mobile money rail.
//!
//! Everything here is pure and local: no gateway call is ever made before a
//! number has been normalized and matched against its provider's prefixes.

use crate::domain::catalog::RailRegistry;
use crate::domain::payment::{PhoneNumber, ProviderId};
use crate::error::{PaymentError, Result};

const PHONE_LEN: usize = 10;
const PREFIX_LEN: usize = 3;

/// Strips whitespace, hyphens and dots. Total: never fails, never validates.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .collect()
}

/// Detects which provider a number belongs to from its three-digit prefix.
///
/// Prefix sets are disjoint in a valid catalog; if that is ever violated the
/// first matching provider wins.
pub fn detect_provider(raw: &str, registry: &RailRegistry) -> Option<ProviderId> {
    let cleaned = normalize(raw);
    let prefix = cleaned.get(..PREFIX_LEN)?;
    registry.provider_for_prefix(prefix).map(|p| p.id)
}

/// Validates `raw` against the named provider and returns the normalized
/// number.
pub fn validate(
    raw: &str,
    provider_id: &ProviderId,
    registry: &RailRegistry,
) -> Result<PhoneNumber> {
    let cleaned = normalize(raw);
    if cleaned.len() != PHONE_LEN || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaymentError::PhoneLength(cleaned.len()));
    }

    let provider = registry
        .provider(provider_id)
        .ok_or_else(|| PaymentError::UnknownProvider(provider_id.to_string()))?;

    let prefix = &cleaned[..PREFIX_LEN];
    if !provider.prefixes.iter().any(|p| p == prefix) {
        return Err(PaymentError::PrefixMismatch {
            prefix: prefix.to_string(),
            provider: provider.name,
            accepted: provider.prefixes.join(", "),
        });
    }

    Ok(PhoneNumber(cleaned))
}
