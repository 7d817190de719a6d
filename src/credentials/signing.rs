// src/credentials/signing.rs
//! Server-side credential signing.
//!
//! Computes and verifies the keyed message authentication code embedded in
//! every QR payload. The signature covers `(student_id, secret_token)` under
//! a server-held signing key that is distinct from any per-student token:
//! - Leaking one student's QR code never compromises another student's
//! - Rotating the server key invalidates every outstanding payload at once,
//!   which is the compromise-recovery kill switch
//!
//! Uses HMAC-SHA256 via `ring`; verification is constant-time.

use crate::models::student::SecretToken;
use ring::hmac;
use rand::RngCore;
use thiserror::Error;

/// Required signing key length in bytes.
pub const SIGNING_KEY_LEN: usize = 32;

/// Length of the signature embedded in payloads (HMAC-SHA256 output).
pub const SIGNATURE_LEN: usize = 32;

// Unit separator between the id and token halves of the signed message.
// Student ids are constrained to a printable subset, so the byte is
// unambiguous.
const MESSAGE_DELIMITER: u8 = 0x1f;

/// Errors raised while loading a signing key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The key material has the wrong length
    #[error("signing key must be exactly {SIGNING_KEY_LEN} bytes")]
    InvalidLength,
    /// The encoded key is not valid base64url
    #[error("signing key is not valid base64url")]
    InvalidEncoding,
}

/// The server-held signing key.
///
/// Read-only on the scanning path; the same instance signs at issuance and
/// verifies at the checkpoint.
pub struct SigningKey {
    key: hmac::Key,
}

impl SigningKey {
    /// Builds a signing key from raw bytes.
    ///
    /// # Errors
    /// `KeyError::InvalidLength` unless exactly 32 bytes are supplied.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != SIGNING_KEY_LEN {
            return Err(KeyError::InvalidLength);
        }
        Ok(SigningKey {
            key: hmac::Key::new(hmac::HMAC_SHA256, bytes),
        })
    }

    /// Builds a signing key from its base64url (no padding) encoding, the
    /// form used for the `SIGNING_KEY` environment variable.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = base64::decode_config(encoded, base64::URL_SAFE_NO_PAD)
            .map_err(|_| KeyError::InvalidEncoding)?;
        Self::from_bytes(&bytes)
    }

    /// Generates a fresh random signing key.
    ///
    /// # Returns
    /// The key together with its base64url encoding, so the operator can
    /// persist it for the next process start.
    pub fn generate() -> (Self, String) {
        let mut bytes = [0u8; SIGNING_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let encoded = base64::encode_config(bytes, base64::URL_SAFE_NO_PAD);
        let key = SigningKey {
            key: hmac::Key::new(hmac::HMAC_SHA256, &bytes),
        };
        (key, encoded)
    }

    /// Computes the payload signature for a student credential.
    ///
    /// # Arguments
    /// * `student_id` - The student the payload identifies
    /// * `token` - That student's current secret token
    ///
    /// # Returns
    /// The 32-byte HMAC-SHA256 tag over `(student_id, token)`.
    pub fn sign(&self, student_id: &str, token: &SecretToken) -> [u8; SIGNATURE_LEN] {
        let tag = hmac::sign(&self.key, &credential_message(student_id, token));
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(tag.as_ref());
        out
    }

    /// Verifies a payload signature in constant time.
    ///
    /// # Arguments
    /// * `student_id` - The student id recovered from the payload
    /// * `token` - The student's current token as looked up in storage
    /// * `signature` - The signature recovered from the payload
    ///
    /// # Returns
    /// `true` only when the signature matches the recomputed tag. The
    /// comparison is constant-time (delegated to `ring::hmac::verify`).
    pub fn verify(&self, student_id: &str, token: &SecretToken, signature: &[u8]) -> bool {
        hmac::verify(&self.key, &credential_message(student_id, token), signature).is_ok()
    }
}

/// Canonical signed message for a credential: `id 0x1f token`.
fn credential_message(student_id: &str, token: &SecretToken) -> Vec<u8> {
    let mut message = Vec::with_capacity(student_id.len() + 1 + token.as_str().len());
    message.extend_from_slice(student_id.as_bytes());
    message.push(MESSAGE_DELIMITER);
    message.extend_from_slice(token.as_str().as_bytes());
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; SIGNING_KEY_LEN]).unwrap()
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let key = test_key();
        let token = SecretToken::generate();

        let signature = key.sign("2024-0153", &token);
        assert!(key.verify("2024-0153", &token, &signature));
    }

    #[test]
    fn verification_fails_for_a_different_token() {
        let key = test_key();
        let token = SecretToken::generate();
        let other = SecretToken::generate();

        let signature = key.sign("2024-0153", &token);
        assert!(!key.verify("2024-0153", &other, &signature));
    }

    #[test]
    fn verification_fails_under_a_rotated_server_key() {
        let token = SecretToken::generate();
        let signature = test_key().sign("2024-0153", &token);

        let (rotated, _) = SigningKey::generate();
        assert!(!rotated.verify("2024-0153", &token, &signature));
    }

    #[test]
    fn verification_fails_for_a_different_student() {
        let key = test_key();
        let token = SecretToken::generate();

        let signature = key.sign("2024-0153", &token);
        assert!(!key.verify("2024-0154", &token, &signature));
    }

    #[test]
    fn key_loading_rejects_bad_material() {
        assert_eq!(
            SigningKey::from_bytes(&[0u8; 16]).err(),
            Some(KeyError::InvalidLength)
        );
        assert_eq!(
            SigningKey::from_base64("not!base64url").err(),
            Some(KeyError::InvalidEncoding)
        );
    }

    #[test]
    fn generated_key_round_trips_through_its_encoding() {
        let (key, encoded) = SigningKey::generate();
        let reloaded = SigningKey::from_base64(&encoded).unwrap();

        let token = SecretToken::generate();
        let signature = key.sign("2024-0153", &token);
        assert!(reloaded.verify("2024-0153", &token, &signature));
    }
}
