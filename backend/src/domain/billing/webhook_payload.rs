//! Field extraction from loosely shaped gateway notifications.
//!
//! The gateway does not send one schema: identifiers show up at the top
//! level or under `data`, as strings or as numbers, under several names.

use serde_json::Value;

use crate::domain::foundation::CorrelationId;

/// Identifiers pulled out of a notification body (and the callback URL).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookNotification {
    pub event_type: Option<String>,
    pub subscription_id: Option<String>,
    pub plan_token: Option<String>,
    pub correlation_id: Option<CorrelationId>,
}

impl WebhookNotification {
    /// Extracts identifiers from a notification body.
    pub fn from_body(body: &Value) -> Self {
        let data = body.get("data");
        let nested = |key: &str| data.and_then(|d| text_field(d, key));

        let subscription_id = text_field(body, "subscriptionId")
            .or_else(|| nested("id"))
            .or_else(|| nested("subscription_id"));

        let plan_token = text_field(body, "plan_token")
            .or_else(|| text_field(body, "subscription_token"))
            .or_else(|| nested("plan_token"))
            .or_else(|| nested("subscription_token"));

        Self {
            event_type: text_field(body, "type"),
            subscription_id,
            plan_token,
            correlation_id: None,
        }
    }

    /// Attaches the correlation token echoed on the callback URL, if it parses.
    pub fn with_correlation_ref(mut self, reference: Option<&str>) -> Self {
        self.correlation_id = reference.and_then(|r| r.parse().ok());
        self
    }

    /// True when at least one identifier can locate a payment row.
    pub fn has_identifier(&self) -> bool {
        self.subscription_id.is_some() || self.plan_token.is_some() || self.correlation_id.is_some()
    }
}

/// Reads a non-blank string or numeric field as text.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
