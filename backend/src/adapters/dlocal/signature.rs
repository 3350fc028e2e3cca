//! Notification signature helper.
//!
//! dLocal Go signs notifications with HMAC-SHA256 over `x_login` followed by
//! the raw body, keyed with the merchant secret, and sends the hex digest as
//! `Authorization: V2-HMAC-SHA256, Signature: <hex>`.
//!
//! Verification is advisory: a mismatch is logged but the notification is
//! still reconciled.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "V2-HMAC-SHA256";

/// Outcome of checking a notification's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
    /// No header, or a header in an unknown format.
    Missing,
}

/// Computes the hex signature for a notification body.
pub fn sign(secret: &SecretString, x_login: &str, payload: &[u8]) -> String {
    hex::encode(digest(secret, x_login, payload))
}

fn digest(secret: &SecretString, x_login: &str, payload: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this never errors.
    let mut mac = match HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(x_login.as_bytes());
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Extracts the hex signature from an `Authorization` header value.
pub fn parse_header(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(',')?;
    if !scheme.trim().eq_ignore_ascii_case(SCHEME) {
        return None;
    }
    let signature = rest.trim().strip_prefix("Signature:")?.trim();
    (!signature.is_empty()).then_some(signature)
}

/// Checks a notification against its `Authorization` header in constant time.
pub fn verify(
    secret: &SecretString,
    x_login: &str,
    payload: &[u8],
    header: Option<&str>,
) -> SignatureCheck {
    let Some(provided) = header.and_then(parse_header) else {
        return SignatureCheck::Missing;
    };
    let Ok(provided) = hex::decode(provided) else {
        return SignatureCheck::Invalid;
    };

    let expected = digest(secret, x_login, payload);
    if expected.ct_eq(&provided).unwrap_u8() == 1 {
        SignatureCheck::Valid
    } else {
        SignatureCheck::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::new("whsec_test".to_string())
    }

    #[test]
    fn signature_is_lowercase_hex_sha256() {
        let signature = sign(&secret(), "login", b"{}");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn signature_depends_on_login_and_body() {
        let base = sign(&secret(), "login", b"{\"a\":1}");
        assert_ne!(base, sign(&secret(), "other", b"{\"a\":1}"));
        assert_ne!(base, sign(&secret(), "login", b"{\"a\":2}"));
    }

    #[test]
    fn parses_scheme_header() {
        assert_eq!(
            parse_header("V2-HMAC-SHA256, Signature: abc123"),
            Some("abc123")
        );
        assert_eq!(parse_header("Bearer abc123"), None);
        assert_eq!(parse_header("V2-HMAC-SHA256, Signature: "), None);
    }

    #[test]
    fn verifies_matching_signature() {
        let payload = br#"{"subscriptionId":"sub-1"}"#;
        let header = format!("V2-HMAC-SHA256, Signature: {}", sign(&secret(), "login", payload));
        assert_eq!(
            verify(&secret(), "login", payload, Some(&header)),
            SignatureCheck::Valid
        );
    }

    #[test]
    fn rejects_tampered_payload() {
        let header = format!("V2-HMAC-SHA256, Signature: {}", sign(&secret(), "login", b"{}"));
        assert_eq!(
            verify(&secret(), "login", b"{\"x\":1}", Some(&header)),
            SignatureCheck::Invalid
        );
    }

    #[test]
    fn non_hex_signature_is_invalid() {
        assert_eq!(
            verify(&secret(), "login", b"{}", Some("V2-HMAC-SHA256, Signature: zz")),
            SignatureCheck::Invalid
        );
    }

    #[test]
    fn absent_header_is_missing() {
        assert_eq!(verify(&secret(), "login", b"{}", None), SignatureCheck::Missing);
    }
}
