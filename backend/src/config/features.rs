//! Feature flags configuration

use serde::Deserialize;

use crate::domain::billing::UnknownEventPolicy;

/// Switches for the riskier reconciliation behaviours
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    /// Let webhooks fall back to the newest Pending row of any user.
    ///
    /// Unsafe under concurrent checkouts; kept on for gateways that do not
    /// echo the `ref` query parameter.
    #[serde(default = "default_pending_payment_fallback")]
    pub pending_payment_fallback: bool,

    #[serde(default)]
    pub unknown_webhook_events: UnknownEventPolicy,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            pending_payment_fallback: default_pending_payment_fallback(),
            unknown_webhook_events: UnknownEventPolicy::default(),
        }
    }
}

fn default_pending_payment_fallback() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_flags_defaults() {
        let flags = FeatureFlags::default();
        assert!(flags.pending_payment_fallback);
        assert_eq!(flags.unknown_webhook_events, UnknownEventPolicy::AssumeCompleted);
    }

    #[test]
    fn test_feature_flags_deserialization() {
        let json = r#"{
            "pending_payment_fallback": false,
            "unknown_webhook_events": "ignore"
        }"#;

        let flags: FeatureFlags = serde_json::from_str(json).unwrap();
        assert!(!flags.pending_payment_fallback);
        assert_eq!(flags.unknown_webhook_events, UnknownEventPolicy::Ignore);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let flags: FeatureFlags = serde_json::from_str("{}").unwrap();
        assert!(flags.pending_payment_fallback);
    }
}
