//! Customer support (WhatsApp) configuration

use serde::Deserialize;
use url::Url;

use super::error::ValidationError;

/// WhatsApp hand-off settings for the confirmation pages
#[derive(Debug, Clone, Deserialize)]
pub struct SupportConfig {
    /// International number, digits only once normalized; links are omitted when unset
    pub whatsapp_phone: Option<String>,

    /// Pre-filled text on the payment confirmation page
    #[serde(default = "default_payment_message")]
    pub payment_message: String,

    /// Pre-filled text for `/api/whatsapp/start`
    #[serde(default = "default_start_message")]
    pub start_message: String,
}

impl SupportConfig {
    /// Phone number with spaces, dashes, and the leading `+` removed.
    pub fn normalized_phone(&self) -> Option<String> {
        self.whatsapp_phone
            .as_deref()
            .map(|phone| phone.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
            .filter(|digits| !digits.is_empty())
    }

    /// `https://wa.me/<phone>?text=<message>`, or `None` without a phone.
    pub fn whatsapp_link(&self, message: &str) -> Option<String> {
        let phone = self.normalized_phone()?;
        let link = Url::parse_with_params(&format!("https://wa.me/{}", phone), &[("text", message)])
            .ok()?;
        Some(link.to_string())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let Some(raw) = self.whatsapp_phone.as_deref() else {
            return Ok(());
        };
        let allowed = raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-'));
        let digits = raw.chars().filter(|c| c.is_ascii_digit()).count();
        if !allowed || !(7..=15).contains(&digits) {
            return Err(ValidationError::InvalidSupportPhone);
        }
        Ok(())
    }
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            whatsapp_phone: None,
            payment_message: default_payment_message(),
            start_message: default_start_message(),
        }
    }
}

fn default_payment_message() -> String {
    "Ya realicé el pago".to_string()
}

fn default_start_message() -> String {
    "Quiero realizar una página web".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_phone(phone: &str) -> SupportConfig {
        SupportConfig {
            whatsapp_phone: Some(phone.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn link_is_omitted_without_phone() {
        assert_eq!(SupportConfig::default().whatsapp_link("hola"), None);
    }

    #[test]
    fn link_encodes_message() {
        let link = with_phone("+57 300-123-4567")
            .whatsapp_link("Ya realicé el pago")
            .unwrap();
        assert!(link.starts_with("https://wa.me/573001234567?text="));
        assert!(link.contains("realic%C3%A9"));
        assert!(!link.contains(' '));
    }

    #[test]
    fn phone_validation() {
        assert_eq!(with_phone("+57 300 123 4567").validate(), Ok(()));
        assert_eq!(
            with_phone("call me").validate(),
            Err(ValidationError::InvalidSupportPhone)
        );
        assert_eq!(
            with_phone("123").validate(),
            Err(ValidationError::InvalidSupportPhone)
        );
    }
}
