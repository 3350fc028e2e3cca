//! Subscriber record.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PlanId, Timestamp, UserId};

/// A registered user and the plan they are currently entitled to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub plan_id: Option<PlanId>,
    pub updated_at: Option<Timestamp>,
}

impl User {
    pub fn is_on_plan(&self, plan_id: &PlanId) -> bool {
        self.plan_id.as_ref() == Some(plan_id)
    }
}
