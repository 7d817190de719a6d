// src/scanner/mod.rs
//! Scanner state machine, session state, and capture-device access.

pub mod capture;
pub mod controller;
pub mod session;
