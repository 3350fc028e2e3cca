//! Locally defined plans and their billing frequency.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PlanId, ValidationError};

/// Billing period unit understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrequencyType {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl FrequencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyType::Daily => "DAILY",
            FrequencyType::Weekly => "WEEKLY",
            FrequencyType::Monthly => "MONTHLY",
            FrequencyType::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for FrequencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrequencyType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DAILY" => Ok(FrequencyType::Daily),
            "WEEKLY" => Ok(FrequencyType::Weekly),
            "MONTHLY" => Ok(FrequencyType::Monthly),
            "YEARLY" => Ok(FrequencyType::Yearly),
            _ => Err(ValidationError::not_allowed(
                "frequency_type",
                &["DAILY", "WEEKLY", "MONTHLY", "YEARLY"],
                s,
            )),
        }
    }
}

/// A plan as configured in the local catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub plan_name: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub frequency_type: FrequencyType,
    pub frequency_value: i32,
}

impl Plan {
    /// Gateway-side plan name for a given subscriber, e.g. `Pro - Ana`.
    pub fn gateway_name_for(&self, user_name: &str) -> String {
        format!("{} - {}", self.plan_name, user_name)
    }

    /// Description sent to the gateway, falling back to a generated one.
    pub fn gateway_description_for(&self, user_name: &str) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(desc) if !desc.is_empty() => desc.to_string(),
            _ => format!("Subscription for {}", user_name),
        }
    }

    /// Human-readable billing cadence, e.g. `1 MONTHLY`.
    pub fn frequency_label(&self) -> String {
        format!("{} {}", self.frequency_value, self.frequency_type)
    }
}
