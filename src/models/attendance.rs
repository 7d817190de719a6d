// src/models/attendance.rs
//! Attendance (lateness) record data model.
//!
//! Records are created by the storage collaborator only after a verified
//! scan has been explicitly confirmed by the operator, never by the
//! verification path itself.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// A persisted lateness record.
///
/// # Fields
/// - `student_id`: The verified student the record belongs to
/// - `arrival_time`: When the student arrived at the checkpoint
/// - `reason`: Optional operator-entered reason for the lateness
/// - `recorded_at`: When the record was written by the store
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    /// The verified student the record belongs to
    pub student_id: String,

    /// Arrival time at the checkpoint
    pub arrival_time: DateTime<Utc>,

    /// Optional operator-entered reason
    /// Example: "overslept", "bus delay"
    pub reason: Option<String>,

    /// When the record was persisted
    pub recorded_at: DateTime<Utc>,
}
