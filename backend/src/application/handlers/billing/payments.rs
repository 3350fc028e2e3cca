//! One-off payment handlers: checkout links, status, cancellation and
//! payment methods, all proxied to the gateway.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::billing::{money, BillingError};
use crate::ports::{
    CreatePaymentRequest, PaymentGateway, PaymentMethod, PaymentResult, PaymentStatusInfo,
};

use super::callbacks::CallbackUrls;

#[derive(Debug, Clone, Default)]
pub struct SimplePaymentCommand {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SimplePaymentResult {
    pub payment: PaymentResult,
    pub order_id: String,
    /// Amount actually charged, after any sandbox cap.
    pub charged_amount: f64,
}

pub struct PaymentsHandler {
    gateway: Arc<dyn PaymentGateway>,
    callbacks: CallbackUrls,
    sandbox: bool,
}

impl PaymentsHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, callbacks: CallbackUrls, sandbox: bool) -> Self {
        Self {
            gateway,
            callbacks,
            sandbox,
        }
    }

    /// Creates a one-off payment and returns its checkout link.
    pub async fn create_simple(
        &self,
        cmd: SimplePaymentCommand,
    ) -> Result<SimplePaymentResult, BillingError> {
        // 1. Validate
        let amount = match cmd.amount {
            Some(amount) if money::is_valid_amount(amount) => amount,
            _ => return Err(BillingError::validation("amount", "Valid amount is required")),
        };
        let currency = money::normalize_currency(cmd.currency.as_deref().unwrap_or("USD"))
            .map_err(|_| {
                BillingError::validation(
                    "currency",
                    "Invalid currency. Supported: USD, COP, BRL, MXN, ARS",
                )
            })?;
        let country = money::normalize_country(cmd.country.as_deref().unwrap_or("US"))
            .map_err(|_| {
                BillingError::validation("country", "Invalid country. Supported: US, CO, BR, MX, AR")
            })?;

        // 2. Sandbox caps
        let charged_amount = if self.sandbox {
            money::cap_for_sandbox(amount, &currency)
        } else {
            amount
        };
        if charged_amount < amount {
            tracing::info!(
                requested = amount,
                charged = charged_amount,
                currency = %currency,
                "Amount capped for sandbox"
            );
        }

        // 3. Create on the gateway
        let order_id = money::generate_transaction_id();
        let description = cmd
            .description
            .as_deref()
            .map(money::sanitize_text)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("Payment of {}", money::format_amount(charged_amount, &currency)));
        let request = CreatePaymentRequest {
            amount: charged_amount,
            currency,
            country,
            order_id: order_id.clone(),
            description,
            notification_url: Some(self.callbacks.payment_notification_url()),
            success_url: Some(self.callbacks.success_url(None)),
            back_url: self.callbacks.back_url(),
        };
        let payment = self.gateway.create_payment(request).await.map_err(|e| {
            tracing::error!(order_id = %order_id, error = %e, "Gateway payment creation failed");
            e.into_billing("Failed to create payment")
        })?;

        tracing::info!(payment_id = %payment.id, order_id = %order_id, "Payment created");
        Ok(SimplePaymentResult {
            payment,
            order_id,
            charged_amount,
        })
    }

    pub async fn status(&self, payment_id: &str) -> Result<PaymentStatusInfo, BillingError> {
        let payment_id = required_payment_id(payment_id)?;
        self.gateway
            .get_payment_status(payment_id)
            .await
            .map_err(|e| BillingError::not_found(e.message()))
    }

    pub async fn cancel(&self, payment_id: &str) -> Result<Value, BillingError> {
        let payment_id = required_payment_id(payment_id)?;
        let response = self
            .gateway
            .cancel_payment(payment_id)
            .await
            .map_err(|e| e.into_billing("Failed to cancel payment"))?;
        tracing::info!(payment_id, "Payment cancelled");
        Ok(response)
    }

    /// Payment methods for a two-letter country code.
    pub async fn methods(
        &self,
        country: Option<&str>,
    ) -> Result<(String, Vec<PaymentMethod>), BillingError> {
        let country = match country.map(str::trim) {
            Some(c) if !c.is_empty() => c.to_uppercase(),
            _ => {
                return Err(BillingError::validation(
                    "country",
                    "Country parameter is required",
                ))
            }
        };
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(BillingError::validation(
                "country",
                "Country must be a 2-letter ISO code",
            ));
        }
        let methods = self
            .gateway
            .get_payment_methods(&country)
            .await
            .map_err(|e| e.into_billing("Failed to get payment methods"))?;
        Ok((country, methods))
    }
}

fn required_payment_id(payment_id: &str) -> Result<&str, BillingError> {
    let trimmed = payment_id.trim();
    if trimmed.is_empty() {
        Err(BillingError::validation("payment_id", "Payment ID is required"))
    } else {
        Ok(trimmed)
    }
}
