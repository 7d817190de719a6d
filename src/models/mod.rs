// src/models/mod.rs
//! Data structures shared across the credential and scanning layers.

pub mod attendance;
pub mod student;
