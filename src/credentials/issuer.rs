// src/credentials/issuer.rs
//! Credential issuance service.
//!
//! Owns the write side of the credential lifecycle: lazily generating a
//! student's secret token on first issuance, composing the signed QR
//! payload, and rotating a token when a card must be invalidated. The
//! verification path never calls into this module, so tokens cannot drift
//! under high-traffic scanning.

use crate::credentials::codec;
use crate::credentials::signing::SigningKey;
use crate::models::student::SecretToken;
use crate::storage::store::{AttendanceStore, StoreError};
use futures::stream::{self, StreamExt};
use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

/// Upper bound on in-flight issuance calls during a batch, so bulk card
/// generation never fans out unboundedly against the storage collaborator.
pub const MAX_CONCURRENT_ISSUANCE: usize = 8;

/// Errors raised while issuing a credential.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// The id does not resolve to a student record
    #[error("student {0} was not found")]
    StudentNotFound(String),
    /// The student exists but its id cannot be represented on the wire
    #[error("student id {0:?} cannot be encoded into a payload")]
    UnencodableId(String),
    /// The storage collaborator failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Service that derives per-student tokens and issues signed QR payloads.
///
/// Shares the storage collaborator and server signing key with the
/// verification service via `Arc`.
pub struct TokenIssuer {
    store: Arc<dyn AttendanceStore>,
    signing_key: Arc<SigningKey>,
}

impl TokenIssuer {
    /// Creates a new issuer over the given store and signing key.
    pub fn new(store: Arc<dyn AttendanceStore>, signing_key: Arc<SigningKey>) -> Self {
        TokenIssuer { store, signing_key }
    }

    /// Returns the student's secret token, generating and persisting a
    /// fresh one on first call.
    ///
    /// Idempotent: repeated calls return the same token until an explicit
    /// rotation replaces it.
    ///
    /// # Errors
    /// - `IssuanceError::StudentNotFound` when the id does not resolve
    /// - `IssuanceError::Store` when the collaborator fails
    pub async fn ensure_token(&self, student_id: &str) -> Result<SecretToken, IssuanceError> {
        if self.store.get_student_by_id(student_id).await?.is_none() {
            return Err(IssuanceError::StudentNotFound(student_id.to_string()));
        }
        if let Some(existing) = self.store.get_token(student_id).await? {
            return Ok(existing);
        }

        let token = SecretToken::generate();
        self.store.set_token(student_id, token.clone()).await?;
        debug!("issued first token for student {}", student_id);
        Ok(token)
    }

    /// Replaces the student's token with a fresh one, invalidating every
    /// payload issued under the old token.
    #[allow(dead_code)]
    pub async fn rotate_token(&self, student_id: &str) -> Result<SecretToken, IssuanceError> {
        if self.store.get_student_by_id(student_id).await?.is_none() {
            return Err(IssuanceError::StudentNotFound(student_id.to_string()));
        }

        let token = SecretToken::generate();
        self.store.set_token(student_id, token.clone()).await?;
        info!("rotated token for student {}", student_id);
        Ok(token)
    }

    /// Issues the scannable QR payload for a student.
    ///
    /// Composes `ensure_token`, the HMAC signature over
    /// `(student_id, token)`, and the wire encoding. Issuing twice without
    /// a rotation in between yields payloads that both verify.
    pub async fn issue_payload(&self, student_id: &str) -> Result<String, IssuanceError> {
        let token = self.ensure_token(student_id).await?;
        let signature = self.signing_key.sign(student_id, &token);
        codec::encode(student_id, &signature)
            .map_err(|_| IssuanceError::UnencodableId(student_id.to_string()))
    }

    /// Issues payloads for many students with bounded concurrency.
    ///
    /// At most [`MAX_CONCURRENT_ISSUANCE`] issuance calls run against the
    /// store at once; per-student failures are reported alongside the id
    /// rather than aborting the batch.
    pub async fn issue_batch(
        &self,
        student_ids: &[String],
    ) -> Vec<(String, Result<String, IssuanceError>)> {
        stream::iter(student_ids.iter().cloned())
            .map(|id| async move {
                let result = self.issue_payload(&id).await;
                (id, result)
            })
            .buffer_unordered(MAX_CONCURRENT_ISSUANCE)
            .collect::<Vec<_>>()
            .await
    }
}
