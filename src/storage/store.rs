// src/storage/store.rs
//! Storage collaborator contract and in-memory implementation.
//!
//! The credential core never talks to a database directly; it consumes the
//! narrow `AttendanceStore` contract defined here. `MemoryStore` is the
//! in-memory implementation used by the kiosk binary and by tests; a real
//! deployment substitutes its own backend behind the same trait.

use crate::models::attendance::AttendanceRecord;
use crate::models::student::{SecretToken, StudentRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or failed mid-operation
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    /// The referenced student does not exist
    #[error("student {0} was not found")]
    NotFound(String),
}

/// The external storage collaborator contract.
///
/// # Contract
/// - `get_student_by_id` / `get_token` are read-only and safe to call from
///   the scanning path at any rate
/// - `set_token` is called only by the issuer, on first issuance or
///   explicit rotation
/// - `record_attendance` is called only after operator confirmation of a
///   verified scan
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Resolves a student id to its full record.
    async fn get_student_by_id(&self, id: &str) -> Result<Option<StudentRecord>, StoreError>;

    /// Returns the student's current secret token, if one has been issued.
    async fn get_token(&self, id: &str) -> Result<Option<SecretToken>, StoreError>;

    /// Persists a newly generated token for the student.
    async fn set_token(&self, id: &str, token: SecretToken) -> Result<(), StoreError>;

    /// Persists a lateness record for a verified, confirmed scan.
    async fn record_attendance(
        &self,
        id: &str,
        arrival_time: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<AttendanceRecord, StoreError>;
}

/// In-memory store backed by read/write-locked maps.
///
/// Lookups are concurrent reads; token writes and attendance appends take
/// the write lock briefly. Suitable for a single-kiosk process and for
/// driving the test suite.
pub struct MemoryStore {
    students: RwLock<HashMap<String, StudentRecord>>,
    attendance: RwLock<Vec<AttendanceRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryStore {
            students: RwLock::new(HashMap::new()),
            attendance: RwLock::new(Vec::new()),
        }
    }

    /// Creates a store pre-populated with a roster of students.
    pub fn with_students(students: Vec<StudentRecord>) -> Self {
        let map = students
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        MemoryStore {
            students: RwLock::new(map),
            attendance: RwLock::new(Vec::new()),
        }
    }

    /// Adds a student to the roster, replacing any existing record with the
    /// same id.
    #[allow(dead_code)]
    pub async fn insert_student(&self, record: StudentRecord) {
        self.students
            .write()
            .await
            .insert(record.id.clone(), record);
    }

    /// Returns all roster ids, in arbitrary order.
    pub async fn student_ids(&self) -> Vec<String> {
        self.students.read().await.keys().cloned().collect()
    }

    /// Number of attendance records written so far.
    #[allow(dead_code)]
    pub async fn attendance_count(&self) -> usize {
        self.attendance.read().await.len()
    }

    /// Attendance records for one student, in insertion order.
    #[allow(dead_code)]
    pub async fn attendance_for(&self, id: &str) -> Vec<AttendanceRecord> {
        self.attendance
            .read()
            .await
            .iter()
            .filter(|record| record.student_id == id)
            .cloned()
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn get_student_by_id(&self, id: &str) -> Result<Option<StudentRecord>, StoreError> {
        Ok(self.students.read().await.get(id).cloned())
    }

    async fn get_token(&self, id: &str) -> Result<Option<SecretToken>, StoreError> {
        Ok(self
            .students
            .read()
            .await
            .get(id)
            .and_then(|record| record.token.clone()))
    }

    async fn set_token(&self, id: &str, token: SecretToken) -> Result<(), StoreError> {
        let mut students = self.students.write().await;
        let record = students
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.token = Some(token);
        record.token_issued_at = Some(Utc::now());
        Ok(())
    }

    async fn record_attendance(
        &self,
        id: &str,
        arrival_time: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<AttendanceRecord, StoreError> {
        if !self.students.read().await.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let record = AttendanceRecord {
            student_id: id.to_string(),
            arrival_time,
            reason,
            recorded_at: Utc::now(),
        };
        self.attendance.write().await.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<StudentRecord> {
        vec![
            StudentRecord::new("2024-0153", "Siti Rahma", "XI-IPA-2"),
            StudentRecord::new("2024-0201", "Budi Santoso", "X-IPS-1"),
        ]
    }

    #[tokio::test]
    async fn students_resolve_by_id() {
        let store = MemoryStore::with_students(roster());

        let found = store.get_student_by_id("2024-0153").await.unwrap();
        assert_eq!(found.unwrap().name, "Siti Rahma");
        assert!(store.get_student_by_id("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_token_persists_and_stamps_issuance_time() {
        let store = MemoryStore::with_students(roster());
        let token = SecretToken::generate();

        store.set_token("2024-0153", token.clone()).await.unwrap();

        assert_eq!(store.get_token("2024-0153").await.unwrap(), Some(token));
        let record = store
            .get_student_by_id("2024-0153")
            .await
            .unwrap()
            .unwrap();
        assert!(record.token_issued_at.is_some());
    }

    #[tokio::test]
    async fn set_token_for_unknown_student_fails() {
        let store = MemoryStore::new();
        let err = store
            .set_token("ghost", SecretToken::generate())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("ghost".into()));
    }

    #[tokio::test]
    async fn attendance_appends_per_student() {
        let store = MemoryStore::with_students(roster());

        store
            .record_attendance("2024-0153", Utc::now(), Some("bus delay".into()))
            .await
            .unwrap();
        store
            .record_attendance("2024-0201", Utc::now(), None)
            .await
            .unwrap();

        assert_eq!(store.attendance_count().await, 2);
        let for_siti = store.attendance_for("2024-0153").await;
        assert_eq!(for_siti.len(), 1);
        assert_eq!(for_siti[0].reason.as_deref(), Some("bus delay"));

        let err = store
            .record_attendance("ghost", Utc::now(), None)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("ghost".into()));
    }
}
