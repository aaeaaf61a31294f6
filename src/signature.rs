//! Webhook signature verification.
//!
//! The gateway signs every webhook delivery with HMAC-SHA512 over the
//! exact raw request body, hex-encoded into a header. Verification uses
//! the hmac crate's constant-time comparison; any missing header,
//! malformed hex, or mismatch yields `false`, never an error.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Check `signature_header` against the raw body. The header carries
    /// the hex-encoded HMAC-SHA512 of the body under the shared secret.
    pub fn verify(&self, raw_body: &[u8], signature_header: Option<&str>) -> bool {
        let Some(header) = signature_header else {
            return false;
        };

        let Ok(expected) = hex::decode(header.trim()) else {
            return false;
        };

        let Ok(mut mac) = HmacSha512::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(raw_body);

        // Constant-time comparison to prevent timing attacks
        mac.verify_slice(&expected).is_ok()
    }

    /// Produce the signature the verifier expects. Exposed for tests and
    /// for driving sandbox deliveries.
    pub fn sign(&self, raw_body: &[u8]) -> String {
        // new_from_slice is infallible for hmac: any key length is valid
        let mut mac =
            HmacSha512::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(raw_body);
        hex::encode(mac.finalize().into_bytes())
    }
}
