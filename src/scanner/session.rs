// src/scanner/session.rs
//! Scan session state.
//!
//! One `ScanSession` covers one scanning attempt, from capture to
//! confirmation or dismissal. The session owns the verification lock flag
//! and the generation counter used to discard stale results; there is no
//! ambient "is processing" state anywhere else in the scanner.

use crate::credentials::verifier::{VerifyError, VerifyOutcome};
use crate::models::student::StudentSummary;
use crate::scanner::capture::ResourceError;
use thiserror::Error;

/// Error raised while persisting a confirmed scan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordingError {
    /// The storage collaborator failed to write the attendance record
    #[error("attendance record could not be saved: {0}")]
    PersistenceFailed(String),
}

/// Selectable input modes for the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Operator types or wand-scans the code
    Manual,
    /// Live camera feed decodes codes continuously
    Camera,
}

/// States of the scanning state machine.
///
/// `Idle` is the initial state; `Recorded` and an explicit reset are the
/// only ways back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Waiting for the operator to pick an input mode
    Idle,
    /// Accepting typed/wanded codes
    ManualEntry,
    /// Camera feed is live and decoding
    CameraActive,
    /// A verification is in flight; new scan events are dropped
    Verifying,
    /// Verification succeeded; awaiting operator confirmation
    Found,
    /// Verification or device acquisition failed; retry available
    Failed,
    /// Attendance persisted; terminal success
    Recorded,
}

/// Everything that can go wrong inside one session, unified so the
/// operator-facing message is derived in exactly one place.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    /// The scanned credential was rejected
    Verify(VerifyError),
    /// The capture device could not be used
    Resource(ResourceError),
    /// The confirmed scan could not be persisted
    Recording(RecordingError),
}

impl SessionError {
    /// Fixed operator-facing message for this failure.
    ///
    /// The scanner UI renders these verbatim; no other component derives
    /// error text, so new surfaces cannot invent inconsistent wording.
    pub fn operator_message(&self) -> &'static str {
        match self {
            SessionError::Verify(VerifyError::Malformed) => {
                "Code could not be read. Hold the card steady and scan again."
            }
            SessionError::Verify(VerifyError::UnknownStudent) => {
                "Card is not registered to any student. Contact the administrator."
            }
            SessionError::Verify(VerifyError::TamperedOrStale) => {
                "Card failed the security check. It may be outdated or altered."
            }
            SessionError::Verify(VerifyError::Store(_)) => {
                "Student directory is temporarily unavailable. Try again shortly."
            }
            SessionError::Resource(ResourceError::PermissionDenied) => {
                "Camera access was denied. Allow camera use or switch to manual entry."
            }
            SessionError::Resource(ResourceError::DeviceBusy) => {
                "Camera is in use by another application. Close it or use manual entry."
            }
            SessionError::Resource(ResourceError::NotFound) => {
                "No camera was found. Use manual entry instead."
            }
            SessionError::Resource(ResourceError::Unavailable) => {
                "Camera is unavailable. Use manual entry instead."
            }
            SessionError::Recording(RecordingError::PersistenceFailed(_)) => {
                "Attendance could not be saved. Press confirm to retry."
            }
        }
    }
}

/// One scanning attempt.
///
/// Owned by the controller and passed through the state machine; holds the
/// lock flag (single in-flight verification) and the generation counter
/// (stale-result rejection).
pub struct ScanSession {
    state: ScanState,
    raw_input: Option<String>,
    resolved: Option<StudentSummary>,
    error: Option<SessionError>,
    lock_held: bool,
    generation: u64,
}

impl ScanSession {
    /// Creates a fresh idle session.
    pub fn new() -> Self {
        ScanSession {
            state: ScanState::Idle,
            raw_input: None,
            resolved: None,
            error: None,
            lock_held: false,
            generation: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Session identity; bumped on reset and on abandoning a verification.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a verification is in flight.
    pub fn lock_held(&self) -> bool {
        self.lock_held
    }

    /// The raw input currently under (or last under) verification.
    #[allow(dead_code)]
    pub fn raw_input(&self) -> Option<&str> {
        self.raw_input.as_deref()
    }

    /// The verified student, available in `Found` and `Recorded`.
    pub fn resolved(&self) -> Option<&StudentSummary> {
        self.resolved.as_ref()
    }

    /// The current session error, if any.
    #[allow(dead_code)]
    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Operator-facing message for the current error.
    pub fn operator_message(&self) -> Option<&'static str> {
        self.error.as_ref().map(SessionError::operator_message)
    }

    /// Enters an input mode, clearing any previous attempt's leftovers.
    pub fn enter_input_mode(&mut self, mode: InputMode) {
        self.state = match mode {
            InputMode::Manual => ScanState::ManualEntry,
            InputMode::Camera => ScanState::CameraActive,
        };
        self.raw_input = None;
        self.resolved = None;
        self.error = None;
    }

    /// Attempts to start a verification for the given input.
    ///
    /// Returns `false` (and changes nothing) when the lock is already held
    /// or the session is not in an input mode; this is the anti-duplicate
    /// guarantee when a camera delivers several frames of the same code.
    pub fn begin_verifying(&mut self, raw: String) -> bool {
        if self.lock_held
            || !matches!(self.state, ScanState::ManualEntry | ScanState::CameraActive)
        {
            return false;
        }
        self.lock_held = true;
        self.state = ScanState::Verifying;
        self.raw_input = Some(raw);
        true
    }

    /// Applies a verification result, releasing the lock.
    ///
    /// Callers must have already checked the generation; this method
    /// assumes the result belongs to the current session.
    pub fn complete_verification(&mut self, outcome: VerifyOutcome) {
        self.lock_held = false;
        match outcome {
            VerifyOutcome::Valid(student) => {
                self.resolved = Some(student);
                self.error = None;
                self.state = ScanState::Found;
            }
            VerifyOutcome::Invalid(err) => {
                self.resolved = None;
                self.error = Some(SessionError::Verify(err));
                self.state = ScanState::Failed;
            }
        }
    }

    /// Abandons an in-flight verification (operator navigated away); the
    /// eventual result will fail the generation check and be discarded.
    pub fn abandon_verification(&mut self) {
        self.lock_held = false;
        self.generation += 1;
        self.raw_input = None;
    }

    /// Fails the session with a device error.
    pub fn fail_resource(&mut self, err: ResourceError) {
        self.error = Some(SessionError::Resource(err));
        self.resolved = None;
        self.state = ScanState::Failed;
    }

    /// Surfaces a recording failure without leaving `Found`, so the
    /// operator can retry persisting without re-scanning.
    pub fn fail_recording(&mut self, err: RecordingError) {
        self.error = Some(SessionError::Recording(err));
    }

    /// Marks the confirmed scan as persisted (terminal success).
    pub fn mark_recorded(&mut self) {
        self.error = None;
        self.state = ScanState::Recorded;
    }

    /// Resets to a fresh idle session under a new generation.
    pub fn reset(&mut self) {
        self.state = ScanState::Idle;
        self.raw_input = None;
        self.resolved = None;
        self.error = None;
        self.lock_held = false;
        self.generation += 1;
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_verifying_requires_an_input_mode_and_a_free_lock() {
        let mut session = ScanSession::new();

        // Idle: no input mode selected yet.
        assert!(!session.begin_verifying("payload".into()));

        session.enter_input_mode(InputMode::Manual);
        assert!(session.begin_verifying("payload".into()));
        assert_eq!(session.state(), ScanState::Verifying);
        assert!(session.lock_held());

        // Lock held: further attempts are dropped.
        assert!(!session.begin_verifying("another".into()));
        assert_eq!(session.raw_input(), Some("payload"));
    }

    #[test]
    fn reset_bumps_the_generation_and_clears_everything() {
        let mut session = ScanSession::new();
        session.enter_input_mode(InputMode::Manual);
        session.begin_verifying("payload".into());

        let generation = session.generation();
        session.reset();

        assert_eq!(session.state(), ScanState::Idle);
        assert!(!session.lock_held());
        assert!(session.raw_input().is_none());
        assert_eq!(session.generation(), generation + 1);
    }

    #[test]
    fn abandoning_a_verification_invalidates_its_result() {
        let mut session = ScanSession::new();
        session.enter_input_mode(InputMode::Camera);
        session.begin_verifying("payload".into());

        let before = session.generation();
        session.abandon_verification();

        assert!(!session.lock_held());
        assert_eq!(session.generation(), before + 1);
    }

    #[test]
    fn recording_failure_keeps_the_found_state() {
        let mut session = ScanSession::new();
        session.enter_input_mode(InputMode::Manual);
        session.begin_verifying("payload".into());
        session.complete_verification(VerifyOutcome::Valid(
            crate::models::student::StudentSummary {
                id: "2024-0153".into(),
                name: "Siti Rahma".into(),
                class_name: "XI-IPA-2".into(),
            },
        ));
        assert_eq!(session.state(), ScanState::Found);

        session.fail_recording(RecordingError::PersistenceFailed("disk full".into()));

        assert_eq!(session.state(), ScanState::Found);
        assert!(session.resolved().is_some());
        assert_eq!(
            session.operator_message(),
            Some("Attendance could not be saved. Press confirm to retry.")
        );
    }

    #[test]
    fn every_failure_maps_to_a_fixed_operator_message() {
        let errors = [
            SessionError::Verify(VerifyError::Malformed),
            SessionError::Verify(VerifyError::UnknownStudent),
            SessionError::Verify(VerifyError::TamperedOrStale),
            SessionError::Resource(ResourceError::PermissionDenied),
            SessionError::Resource(ResourceError::NotFound),
            SessionError::Recording(RecordingError::PersistenceFailed("x".into())),
        ];

        for err in &errors {
            assert!(!err.operator_message().is_empty());
        }
    }
}
