//! LINE webhook signature verification.
//!
//! LINE signs each webhook delivery with HMAC-SHA256 over the raw request
//! body using the channel secret, base64-encoded into the
//! `x-line-signature` header. Comparison is constant-time.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Verifier for LINE webhook signatures.
pub struct LineSignatureVerifier {
    channel_secret: Secret<String>,
}

impl LineSignatureVerifier {
    /// Creates a new verifier with the given channel secret.
    pub fn new(channel_secret: Secret<String>) -> Self {
        Self { channel_secret }
    }

    /// Verifies the signature header against the raw request body.
    ///
    /// # Errors
    ///
    /// - `ParseError` if the header is not valid base64
    /// - `InvalidSignature` if the MAC does not match
    pub fn verify(&self, body: &[u8], signature_header: &str) -> Result<(), WebhookError> {
        let provided = BASE64
            .decode(signature_header.trim())
            .map_err(|_| WebhookError::ParseError("signature is not valid base64".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.channel_secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::ParseError("invalid channel secret".to_string()))?;
        mac.update(body);
        let expected = mac.finalize().into_bytes();

        if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature)
        }
    }
}
