//! Request types for the scan orchestrator

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Risk appetite hint forwarded to strategy evaluators.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl RiskTolerance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }
}

/// Request to start a discovery scan. Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub user_id: String,
    /// Overwrite the user's cache slot even if a scan is already in flight.
    #[serde(default)]
    pub force_refresh: bool,
    /// Result cap, applied on the read path.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Drop opportunities scoring below this threshold (0-100 scale).
    #[serde(default)]
    pub min_confidence: Option<Decimal>,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
}

impl ScanRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            force_refresh: false,
            limit: None,
            min_confidence: None,
            risk_tolerance: RiskTolerance::default(),
        }
    }

    /// Deterministic cache key for this user's result slot.
    ///
    /// Stable across repeated scans with the same parameters so the latest
    /// result can be resolved without a scan id. Includes the parameters
    /// that change scan *content* (risk tolerance, confidence floor) but
    /// not `limit`, which only caps the response.
    pub fn cache_key(&self) -> String {
        let min_conf = self
            .min_confidence
            .map(|d| d.to_string())
            .unwrap_or_default();
        let input = format!(
            "{}:{}:{}",
            self.user_id,
            self.risk_tolerance.as_str(),
            min_conf
        );
        let hash = Sha256::digest(input.as_bytes());
        format!("{:x}", hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn cache_key_stable_for_same_parameters() {
        let a = ScanRequest::new("user-1");
        let b = ScanRequest::new("user-1");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn cache_key_distinguishes_users_and_parameters() {
        let base = ScanRequest::new("user-1");
        let other_user = ScanRequest::new("user-2");
        assert_ne!(base.cache_key(), other_user.cache_key());

        let mut stricter = ScanRequest::new("user-1");
        stricter.min_confidence = Some(dec!(60));
        assert_ne!(base.cache_key(), stricter.cache_key());

        let mut aggressive = ScanRequest::new("user-1");
        aggressive.risk_tolerance = RiskTolerance::Aggressive;
        assert_ne!(base.cache_key(), aggressive.cache_key());
    }

    #[test]
    fn cache_key_ignores_limit_and_force_refresh() {
        let base = ScanRequest::new("user-1");
        let mut limited = ScanRequest::new("user-1");
        limited.limit = Some(5);
        limited.force_refresh = true;
        assert_eq!(base.cache_key(), limited.cache_key());
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let req: ScanRequest = serde_json::from_str(r#"{"user_id": "u1"}"#).unwrap();
        assert!(!req.force_refresh);
        assert_eq!(req.limit, None);
        assert_eq!(req.risk_tolerance, RiskTolerance::Balanced);
    }
}
