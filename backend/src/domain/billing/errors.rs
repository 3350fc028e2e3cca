//! Billing-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | NotFound | 404 |
//! | AlreadySubscribed | 409 |
//! | Conflict | 409 |
//! | Gateway | 400 |
//! | MissingIdentifier | 400 |
//! | MalformedWebhook | 400 |
//! | Unmatched | 500 |
//! | Persistence | 500 |

use serde_json::Value;
use thiserror::Error;

use super::Payment;
use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors surfaced by the billing use cases.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BillingError {
    #[error("{message}")]
    ValidationFailed { field: String, message: String },

    #[error("{0}")]
    NotFound(String),

    /// The user already holds a live subscription.
    #[error("User already has an active subscription")]
    AlreadySubscribed { current: Option<Box<Payment>> },

    #[error("{0}")]
    Conflict(String),

    /// The gateway refused or could not be reached.
    #[error("{context}: {message}")]
    Gateway {
        context: String,
        error: String,
        message: String,
        details: Option<Value>,
    },

    /// An external identifier could not be resolved from any source.
    #[error("{message}")]
    MissingIdentifier { message: String, details: Value },

    #[error("{0}")]
    MalformedWebhook(String),

    /// No strategy located a payment row for the notification.
    #[error("Failed to update payment status")]
    Unmatched { details: Value },

    #[error("{0}")]
    Persistence(String),
}

impl BillingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BillingError::NotFound(message.into())
    }

    pub fn gateway(
        context: impl Into<String>,
        error: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        BillingError::Gateway {
            context: context.into(),
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attaches diagnostic details to errors that carry them.
    pub fn with_details(self, extra: Value) -> Self {
        match self {
            BillingError::Gateway {
                context,
                error,
                message,
                ..
            } => BillingError::Gateway {
                context,
                error,
                message,
                details: Some(extra),
            },
            BillingError::MissingIdentifier { message, .. } => BillingError::MissingIdentifier {
                message,
                details: extra,
            },
            BillingError::Unmatched { .. } => BillingError::Unmatched { details: extra },
            other => other,
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        BillingError::Persistence(message.into())
    }

    /// Machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::ValidationFailed { .. } => "VALIDATION_FAILED",
            BillingError::NotFound(_) => "NOT_FOUND",
            BillingError::AlreadySubscribed { .. } => "ACTIVE_SUBSCRIPTION_EXISTS",
            BillingError::Conflict(_) => "CONFLICT",
            BillingError::Gateway { .. } => "GATEWAY_ERROR",
            BillingError::MissingIdentifier { .. } => "MISSING_IDENTIFIER",
            BillingError::MalformedWebhook(_) => "MALFORMED_WEBHOOK",
            BillingError::Unmatched { .. } => "PAYMENT_NOT_MATCHED",
            BillingError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::validation(err.field().to_string(), err.to_string())
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => BillingError::ValidationFailed {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::UserNotFound | ErrorCode::PlanNotFound | ErrorCode::PaymentNotFound => {
                BillingError::NotFound(err.message)
            }
            ErrorCode::ActiveSubscriptionExists => BillingError::AlreadySubscribed { current: None },
            ErrorCode::InvalidStateTransition => BillingError::Conflict(err.message),
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                BillingError::Persistence(err.message)
            }
        }
    }
}
