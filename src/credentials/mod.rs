// src/credentials/mod.rs
//! Credential issuance, verification, signing, and the QR wire format.

pub mod codec;
pub mod issuer;
pub mod signing;
pub mod verifier;
