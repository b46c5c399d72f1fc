//! HMAC-SHA256 webhook signature validation.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::WebhookValidator;
use crate::error::{webhook_error, Error, WebhookErrorKind};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 webhook validator.
///
/// Fathom signs the raw request body with the shared webhook secret and sends
/// the hex digest in `x-fathom-signature`. Comparison is constant time.
pub struct HmacWebhookValidator {
    provider_id: String,
    secret: SecretString,
    signature_header: String,
}

impl HmacWebhookValidator {
    /// Create a new HMAC webhook validator.
    ///
    /// # Arguments
    ///
    /// * `provider_id` - Provider identifier
    /// * `secret` - Webhook signing secret
    /// * `signature_header` - Name of the header containing the signature
    pub fn new(provider_id: &str, secret: SecretString, signature_header: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            secret,
            signature_header: signature_header.to_lowercase(),
        }
    }

    pub fn signature_header(&self) -> &str {
        &self.signature_header
    }

    /// Hex encoded signature of `body`, as the provider would send it.
    pub fn sign(&self, body: &[u8]) -> Result<String, Error> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> Result<HmacSha256, Error> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| webhook_error(WebhookErrorKind::InvalidPayload, "Invalid HMAC key"))
    }
}

impl WebhookValidator for HmacWebhookValidator {
    fn validate(&self, headers: &HashMap<String, String>, body: &[u8]) -> Result<bool, Error> {
        let signature = headers.get(&self.signature_header).ok_or_else(|| {
            webhook_error(
                WebhookErrorKind::MissingSignature,
                &format!("Missing signature header: {}", self.signature_header),
            )
        })?;

        let expected_sig = hex::decode(signature.trim().trim_start_matches("sha256="))
            .map_err(|_| {
                webhook_error(
                    WebhookErrorKind::InvalidSignature,
                    "Invalid signature format",
                )
            })?;

        let mut mac = self.mac()?;
        mac.update(body);

        Ok(mac.verify_slice(&expected_sig).is_ok())
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> HmacWebhookValidator {
        HmacWebhookValidator::new(
            "fathom",
            SecretString::new("test_secret".to_string()),
            "X-Fathom-Signature",
        )
    }

    fn headers(signature: String) -> HashMap<String, String> {
        HashMap::from([("x-fathom-signature".to_string(), signature)])
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"event":"call_completed"}"#;
        let validator = validator();
        let signature = validator.sign(body).unwrap();

        assert!(validator.validate(&headers(signature), body).unwrap());
    }

    #[test]
    fn test_signature_for_other_body_is_rejected() {
        let validator = validator();
        let signature = validator.sign(b"original").unwrap();

        assert!(!validator.validate(&headers(signature), b"tampered").unwrap());
    }

    #[test]
    fn test_malformed_signature_is_an_error() {
        let result = validator().validate(&headers("not-hex".to_string()), b"payload");

        assert_eq!(
            result.unwrap_err().error_kind,
            crate::ErrorKind::Webhook(WebhookErrorKind::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_signature_is_an_error() {
        let result = validator().validate(&HashMap::new(), b"payload");

        assert_eq!(
            result.unwrap_err().error_kind,
            crate::ErrorKind::Webhook(WebhookErrorKind::MissingSignature)
        );
    }
}
