// src/credentials/verifier.rs
//! Credential verification service.
//!
//! Turns an arbitrary scanned string into either a resolved student
//! identity or a typed failure. Every branch returns a reason from the
//! fixed taxonomy below; the scanner maps reasons to operator-facing
//! messages without re-deriving them, so no UI surface can invent
//! inconsistent error text.
//!
//! # Verification order
//! 1. Cheap length gate (camera noise never reaches the decoder)
//! 2. Structural decode (no cryptography yet)
//! 3. Token lookup via the storage collaborator
//! 4. Constant-time signature check, last
//! 5. Resolve the display-safe student summary

use crate::credentials::codec;
use crate::credentials::signing::SigningKey;
use crate::models::student::StudentSummary;
use crate::storage::store::{AttendanceStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Inputs shorter than this are rejected before any decode or storage
/// work. Deliberately below the codec's own floor so obvious garbage
/// (partial camera reads, stray keystrokes) fails on the fastest path.
pub const MIN_SCAN_LEN: usize = 16;

/// Typed reasons a scan fails verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// The input is not a structurally valid payload
    #[error("scanned code is not a readable credential")]
    Malformed,
    /// The payload names a student with no stored token (or no record)
    #[error("credential does not match any enrolled student")]
    UnknownStudent,
    /// The signature does not match the student's current token
    #[error("credential failed the signature check")]
    TamperedOrStale,
    /// The storage collaborator failed mid-verification
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VerifyError {
    /// Stable machine-readable kind, used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Malformed => "malformed",
            VerifyError::UnknownStudent => "unknown_student",
            VerifyError::TamperedOrStale => "tampered_or_stale",
            VerifyError::Store(_) => "store_unavailable",
        }
    }
}

/// Result of verifying one scanned string.
#[derive(Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The credential is authentic; carries the display-safe summary only,
    /// never the secret token
    Valid(StudentSummary),
    /// The credential was rejected for the given reason
    Invalid(VerifyError),
}

impl VerifyOutcome {
    /// Projects the outcome into the serializable report shape consumed by
    /// external surfaces.
    pub fn report(&self) -> VerifyReport {
        match self {
            VerifyOutcome::Valid(student) => VerifyReport {
                valid: true,
                student: Some(student.clone()),
                error: None,
            },
            VerifyOutcome::Invalid(error) => VerifyReport {
                valid: false,
                student: None,
                error: Some(error.kind().to_string()),
            },
        }
    }
}

/// Serializable verification report: `{ valid, student?, error? }`.
#[derive(Debug, Serialize)]
pub struct VerifyReport {
    /// Whether the credential verified
    pub valid: bool,
    /// Display-safe student summary, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentSummary>,
    /// Stable error kind, present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Service that validates scanned payloads against stored credentials.
///
/// Read-only with respect to tokens: verification never creates or mutates
/// credential material.
pub struct VerificationService {
    store: Arc<dyn AttendanceStore>,
    signing_key: Arc<SigningKey>,
}

impl VerificationService {
    /// Creates a new verifier over the given store and signing key.
    pub fn new(store: Arc<dyn AttendanceStore>, signing_key: Arc<SigningKey>) -> Self {
        VerificationService { store, signing_key }
    }

    /// Verifies a raw scanned string.
    ///
    /// Total over its input: every string produces a `VerifyOutcome`,
    /// never a panic or an unstructured error.
    pub async fn verify(&self, raw: &str) -> VerifyOutcome {
        let raw = raw.trim();
        if raw.len() < MIN_SCAN_LEN {
            return VerifyOutcome::Invalid(VerifyError::Malformed);
        }

        let decoded = match codec::decode(raw) {
            Ok(decoded) => decoded,
            Err(_) => return VerifyOutcome::Invalid(VerifyError::Malformed),
        };

        let token = match self.store.get_token(&decoded.student_id).await {
            Ok(Some(token)) => token,
            Ok(None) => return VerifyOutcome::Invalid(VerifyError::UnknownStudent),
            Err(err) => return VerifyOutcome::Invalid(VerifyError::Store(err)),
        };

        if !self
            .signing_key
            .verify(&decoded.student_id, &token, &decoded.signature)
        {
            return VerifyOutcome::Invalid(VerifyError::TamperedOrStale);
        }

        match self.store.get_student_by_id(&decoded.student_id).await {
            Ok(Some(record)) => VerifyOutcome::Valid(StudentSummary::from(&record)),
            Ok(None) => VerifyOutcome::Invalid(VerifyError::UnknownStudent),
            Err(err) => VerifyOutcome::Invalid(VerifyError::Store(err)),
        }
    }
}
