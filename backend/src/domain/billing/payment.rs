//! Payment rows.
//!
//! A payment row is both a charge record and the subscription record of its
//! owner: `user_id` is persisted in the `id` column, and the gateway's
//! subscription id lands in `dlo_payment_id` once it is known.

use serde::{Deserialize, Serialize};

use super::PaymentStatus;
use crate::domain::foundation::{CorrelationId, PlanId, Timestamp, UserId};

/// Prefix of the external id stored before the gateway has assigned one.
pub const PLACEHOLDER_PREFIX: &str = "temp_";

/// Placeholder external id derived from the creation time.
pub fn placeholder_external_id(now: &Timestamp) -> String {
    format!("{}{}", PLACEHOLDER_PREFIX, now.as_unix_millis())
}

pub fn is_placeholder_external_id(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A persisted payment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub idx: i64,
    #[serde(rename = "id")]
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub dlo_payment_id: String,
    pub dlocal_plan_id: Option<String>,
    pub plan_token: Option<String>,
    pub correlation_id: Option<CorrelationId>,
    pub created_at: Timestamp,
}

impl Payment {
    /// The gateway's payment/subscription id, unless only a placeholder is stored.
    pub fn external_id(&self) -> Option<&str> {
        non_blank(Some(self.dlo_payment_id.as_str())).filter(|id| !is_placeholder_external_id(id))
    }

    pub fn gateway_plan_id(&self) -> Option<&str> {
        non_blank(self.dlocal_plan_id.as_deref())
    }

    pub fn gateway_plan_token(&self) -> Option<&str> {
        non_blank(self.plan_token.as_deref())
    }

    pub fn is_active_subscription(&self) -> bool {
        self.status.is_active_subscription()
    }
}

/// Data needed to insert a new Pending payment row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub amount: f64,
    pub currency: String,
    pub description: Option<String>,
    pub dlo_payment_id: Option<String>,
    pub dlocal_plan_id: Option<String>,
    pub plan_token: Option<String>,
    pub correlation_id: Option<CorrelationId>,
}

impl NewPayment {
    pub fn description_or_default(&self) -> String {
        match non_blank(self.description.as_deref()) {
            Some(desc) => desc.to_string(),
            None => format!(
                "Subscription payment for plan {} for user {}",
                self.plan_id, self.user_id
            ),
        }
    }

    pub fn external_id_or_placeholder(&self, now: &Timestamp) -> String {
        match non_blank(self.dlo_payment_id.as_deref()) {
            Some(id) => id.to_string(),
            None => placeholder_external_id(now),
        }
    }
}

/// Result of a status update: the row after the write and the status it had before.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub payment: Payment,
    pub previous: PaymentStatus,
}

impl StatusChange {
    /// False when the row already held the requested status.
    pub fn is_transition(&self) -> bool {
        self.previous != self.payment.status
    }
}

/// How a status update locates its row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTarget {
    /// Technical row key.
    Idx(i64),
    /// Most recent row owned by the user.
    User(UserId),
}

/// Gateway identifiers recovered from a user's recent payment rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayRefs {
    pub plan_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl GatewayRefs {
    /// Scans rows newest first, keeping the first usable value of each id.
    pub fn collect<'a>(rows: impl IntoIterator<Item = &'a Payment>) -> Self {
        let mut refs = GatewayRefs::default();
        for row in rows {
            if refs.plan_id.is_none() {
                refs.plan_id = row.gateway_plan_id().map(String::from);
            }
            if refs.subscription_id.is_none() {
                refs.subscription_id = row.external_id().map(String::from);
            }
            if refs.plan_id.is_some() && refs.subscription_id.is_some() {
                break;
            }
        }
        refs
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn payment(idx: i64, user: &str, status: PaymentStatus) -> Payment {
        Payment {
            idx,
            user_id: UserId::new(user).unwrap(),
            plan_id: PlanId::new("plan-pro").unwrap(),
            amount: 19.9,
            currency: "USD".to_string(),
            status,
            description: None,
            dlo_payment_id: format!("{}{}", PLACEHOLDER_PREFIX, idx),
            dlocal_plan_id: None,
            plan_token: None,
            correlation_id: None,
            created_at: Timestamp::now(),
        }
    }
}
