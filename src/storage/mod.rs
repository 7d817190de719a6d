// src/storage/mod.rs
//! Storage collaborator contract and backends.

pub mod store;
