// src/credentials/codec.rs
//! Compact wire format for QR credential payloads.
//!
//! A payload is the base64url (no padding) encoding of
//! `version 0x7c student_id 0x7c signature`, where `signature` is the
//! 32-byte HMAC tag computed by the signing layer. The format is
//! version-tagged so a future signature scheme can coexist with already
//! issued cards during a migration window: the decoder branches on the
//! version before validating anything else.
//!
//! Decoding is total. The scanner feeds arbitrary camera noise through this
//! path continuously, so every structural check (length bounds, encoding
//! alphabet, field layout) runs before any cryptographic work and malformed
//! input fails fast with a typed error, never a panic.

use crate::credentials::signing::SIGNATURE_LEN;
use thiserror::Error;

/// Version tag of the current wire format.
pub const PAYLOAD_VERSION: u8 = b'1';

/// Maximum accepted student id length on the wire.
pub const MAX_STUDENT_ID_LEN: usize = 32;

// Shortest valid payload: version + delimiter + 1-char id + delimiter +
// 32-byte signature is 36 inner bytes, 48 base64url characters.
/// Minimum accepted payload length in characters.
pub const MIN_PAYLOAD_LEN: usize = 48;

/// Maximum accepted payload length in characters.
pub const MAX_PAYLOAD_LEN: usize = 96;

// Field delimiter inside the decoded payload. Excluded from the student id
// alphabet, so only the (binary) signature tail may contain it.
const FIELD_DELIMITER: u8 = b'|';

/// Errors raised while encoding a payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The student id contains characters outside the wire alphabet or has
    /// an unacceptable length
    #[error("student id {0:?} cannot be encoded into a payload")]
    InvalidStudentId(String),
}

/// Errors raised while decoding a scanned payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The input is not a structurally valid payload
    #[error("payload is not a well-formed credential")]
    Malformed,
    /// The payload decoded cleanly but carries an unknown version tag
    #[error("payload version {0:?} is not supported")]
    UnsupportedVersion(char),
}

/// A structurally valid payload, not yet signature-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    /// Wire format version the payload was issued under
    #[allow(dead_code)]
    pub version: u8,
    /// Student id recovered from the payload
    pub student_id: String,
    /// Signature bytes recovered from the payload (length-checked)
    pub signature: Vec<u8>,
}

/// Checks whether an id is usable on the wire: 1..=32 characters drawn
/// from `[A-Za-z0-9._-]`.
pub fn is_valid_student_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_STUDENT_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

/// Encodes a student id and its signature into a scannable payload string.
///
/// # Arguments
/// * `student_id` - The student the payload identifies
/// * `signature` - The signature computed by the signing layer
///
/// # Returns
/// A compact base64url string (no padding) suitable for a low-density QR
/// code; roughly 60 characters for typical ids.
pub fn encode(student_id: &str, signature: &[u8; SIGNATURE_LEN]) -> Result<String, EncodeError> {
    if !is_valid_student_id(student_id) {
        return Err(EncodeError::InvalidStudentId(student_id.to_string()));
    }

    let mut inner = Vec::with_capacity(3 + student_id.len() + SIGNATURE_LEN);
    inner.push(PAYLOAD_VERSION);
    inner.push(FIELD_DELIMITER);
    inner.extend_from_slice(student_id.as_bytes());
    inner.push(FIELD_DELIMITER);
    inner.extend_from_slice(signature);

    Ok(base64::encode_config(&inner, base64::URL_SAFE_NO_PAD))
}

/// Decodes a scanned string into a payload candidate.
///
/// Constraint checks run in order of increasing cost: length bounds, then
/// encoding alphabet, then base64 decoding, then the version branch, then
/// field layout. No cryptographic work happens here.
///
/// # Errors
/// - `DecodeError::Malformed` for any structural failure
/// - `DecodeError::UnsupportedVersion` when the framing is intact but the
///   version tag is unknown
pub fn decode(payload: &str) -> Result<DecodedPayload, DecodeError> {
    if payload.len() < MIN_PAYLOAD_LEN || payload.len() > MAX_PAYLOAD_LEN {
        return Err(DecodeError::Malformed);
    }
    if !payload.bytes().all(is_base64url_byte) {
        return Err(DecodeError::Malformed);
    }

    let inner = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)
        .map_err(|_| DecodeError::Malformed)?;

    // Version branch comes before any further validation so an unknown
    // version is reported as such rather than as garbage.
    if inner.len() < 2 || inner[1] != FIELD_DELIMITER {
        return Err(DecodeError::Malformed);
    }
    let version = inner[0];
    if version != PAYLOAD_VERSION {
        return Err(DecodeError::UnsupportedVersion(version as char));
    }

    let body = &inner[2..];
    let delimiter = body
        .iter()
        .position(|&b| b == FIELD_DELIMITER)
        .ok_or(DecodeError::Malformed)?;
    let (id_bytes, tail) = body.split_at(delimiter);
    let signature = &tail[1..];

    if signature.len() != SIGNATURE_LEN {
        return Err(DecodeError::Malformed);
    }
    let student_id =
        std::str::from_utf8(id_bytes).map_err(|_| DecodeError::Malformed)?;
    if !is_valid_student_id(student_id) {
        return Err(DecodeError::Malformed);
    }

    Ok(DecodedPayload {
        version,
        student_id: student_id.to_string(),
        signature: signature.to_vec(),
    })
}

fn is_base64url_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signature() -> [u8; SIGNATURE_LEN] {
        let mut signature = [0u8; SIGNATURE_LEN];
        for (i, byte) in signature.iter_mut().enumerate() {
            *byte = i as u8;
        }
        signature
    }

    #[test]
    fn round_trip_recovers_id_and_signature() {
        let signature = test_signature();
        let payload = encode("2024-0153", &signature).unwrap();

        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded.version, PAYLOAD_VERSION);
        assert_eq!(decoded.student_id, "2024-0153");
        assert_eq!(decoded.signature, signature.to_vec());
    }

    #[test]
    fn payload_stays_compact_for_typical_ids() {
        let payload = encode("2024-0153", &test_signature()).unwrap();
        assert!(payload.len() <= 80, "payload was {} chars", payload.len());
    }

    #[test]
    fn encode_rejects_ids_outside_the_wire_alphabet() {
        assert_eq!(
            encode("bad|id", &test_signature()).err(),
            Some(EncodeError::InvalidStudentId("bad|id".into()))
        );
        assert!(encode("", &test_signature()).is_err());
        assert!(encode(&"x".repeat(MAX_STUDENT_ID_LEN + 1), &test_signature()).is_err());
    }

    #[test]
    fn short_input_is_rejected_before_decoding() {
        assert_eq!(decode("abcd"), Err(DecodeError::Malformed));
        assert_eq!(decode(""), Err(DecodeError::Malformed));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let long = "A".repeat(MAX_PAYLOAD_LEN + 1);
        assert_eq!(decode(&long), Err(DecodeError::Malformed));
    }

    #[test]
    fn non_base64url_characters_are_rejected() {
        let noisy = "!!".to_string() + &"A".repeat(MIN_PAYLOAD_LEN);
        assert_eq!(decode(&noisy), Err(DecodeError::Malformed));
    }

    #[test]
    fn structurally_wrong_base64_is_malformed() {
        // Valid base64url of the right length, but no credential framing.
        let inner = [0xABu8; 40];
        let payload = base64::encode_config(inner, base64::URL_SAFE_NO_PAD);
        assert_eq!(decode(&payload), Err(DecodeError::Malformed));
    }

    #[test]
    fn unknown_version_is_reported_distinctly() {
        let mut inner = Vec::new();
        inner.push(b'2');
        inner.push(b'|');
        inner.extend_from_slice(b"2024-0153");
        inner.push(b'|');
        inner.extend_from_slice(&test_signature());

        let payload = base64::encode_config(&inner, base64::URL_SAFE_NO_PAD);
        assert_eq!(decode(&payload), Err(DecodeError::UnsupportedVersion('2')));
    }

    #[test]
    fn truncated_signature_is_malformed() {
        let mut inner = Vec::new();
        inner.push(PAYLOAD_VERSION);
        inner.push(b'|');
        inner.extend_from_slice(b"2024-0153");
        inner.push(b'|');
        inner.extend_from_slice(&test_signature()[..16]);
        // Pad back above the length floor so the length gate passes.
        inner.extend_from_slice(&[b'x'; 20]);

        let payload = base64::encode_config(&inner, base64::URL_SAFE_NO_PAD);
        assert_eq!(decode(&payload), Err(DecodeError::Malformed));
    }
}
