// src/models/student.rs
//! Student data model and per-student credential material.
//!
//! Defines the student record owned by the storage collaborator, the
//! display-safe summary returned by verification, and the opaque secret
//! token each student's QR payload is signed against.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::fmt;

/// Number of random bytes backing a freshly generated secret token.
pub const TOKEN_LEN: usize = 32;

/// An opaque, high-entropy per-student secret.
///
/// The token is the per-student half of the two-layer credential design:
/// the server signing key signs `(student_id, token)`, so leaking one
/// student's QR code never compromises another student's credential.
///
/// # Lifecycle
/// - Generated once on first issuance (lazy) and persisted by the store
/// - Never mutated by the verification path
/// - Replaced only by explicit rotation
///
/// # Representation
/// Stored and transported as the base64url encoding of 32 random bytes,
/// so it survives any text-based persistence layer unchanged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretToken(String);

impl SecretToken {
    /// Generates a fresh cryptographically random token.
    ///
    /// # Returns
    /// New token backed by 32 bytes from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut buf = [0u8; TOKEN_LEN];
        rand::thread_rng().fill_bytes(&mut buf);
        SecretToken(base64::encode_config(buf, base64::URL_SAFE_NO_PAD))
    }

    /// Returns the encoded token string.
    ///
    /// # Security Note
    /// Callers must never embed this value in payloads, logs, or UI
    /// surfaces; it is signing material only.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Redacted on purpose: tokens are signing material and must never
// reach log output through a stray `{:?}`.
impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(..)")
    }
}

/// A student record as owned by the storage collaborator.
///
/// # Fields
/// - `id`: Stable student identifier used in payloads
/// - `name`: Full display name
/// - `class_name`: Class/homeroom label shown to the operator
/// - `token`: Per-student credential secret, absent until first issuance
/// - `token_issued_at`: When the current token was generated
///
/// # Invariant
/// At most one token exists per student at any time; the field is written
/// only by the issuer (first issuance or explicit rotation).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StudentRecord {
    /// Stable student identifier
    /// Example: "2024-0153"
    pub id: String,

    /// Full display name
    /// Example: "Siti Rahma"
    pub name: String,

    /// Class or homeroom label
    /// Example: "XI-IPA-2"
    pub class_name: String,

    /// Per-student credential secret (absent until first issuance)
    #[serde(default)]
    pub token: Option<SecretToken>,

    /// Timestamp of the current token's generation, kept so a TTL check
    /// can be introduced later without a schema change
    #[serde(default)]
    pub token_issued_at: Option<DateTime<Utc>>,
}

impl StudentRecord {
    /// Creates a new student record with no credential material.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        StudentRecord {
            id: id.into(),
            name: name.into(),
            class_name: class_name.into(),
            token: None,
            token_issued_at: None,
        }
    }
}

/// Display-safe projection of a student record.
///
/// This is the only student shape the verification path hands back to
/// callers; it deliberately omits the secret token and issuance metadata.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StudentSummary {
    /// Stable student identifier
    pub id: String,
    /// Full display name
    pub name: String,
    /// Class or homeroom label
    pub class_name: String,
}

impl From<&StudentRecord> for StudentSummary {
    fn from(record: &StudentRecord) -> Self {
        StudentSummary {
            id: record.id.clone(),
            name: record.name.clone(),
            class_name: record.class_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_high_entropy() {
        let a = SecretToken::generate();
        let b = SecretToken::generate();

        assert_ne!(a, b);
        // 32 bytes of base64url without padding is 43 characters
        assert_eq!(a.as_str().len(), 43);
    }

    #[test]
    fn debug_output_never_leaks_the_token() {
        let token = SecretToken::generate();
        let rendered = format!("{:?}", token);

        assert!(!rendered.contains(token.as_str()));
        assert_eq!(rendered, "SecretToken(..)");
    }

    #[test]
    fn summary_omits_credential_material() {
        let mut record = StudentRecord::new("2024-0153", "Siti Rahma", "XI-IPA-2");
        record.token = Some(SecretToken::generate());

        let summary = StudentSummary::from(&record);
        let json = serde_json::to_string(&summary).unwrap();

        assert_eq!(summary.id, "2024-0153");
        assert!(!json.contains("token"));
    }
}
