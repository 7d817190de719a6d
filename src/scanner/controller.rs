// src/scanner/controller.rs
//! Scanner state machine controller.
//!
//! Consumes scan events from a single mpsc channel and drives the session
//! through `Idle → ManualEntry | CameraActive → Verifying → Found | Failed
//! → Recorded`. Capture sources publish decoded strings as messages; the
//! controller consumes at most one per lock acquisition and drops the rest,
//! so a noisy camera feed can never queue duplicate verifications.
//!
//! Verification runs as a spawned task so the controller keeps servicing
//! mode toggles while a check is in flight; the completion is delivered
//! back through the same event channel tagged with the session generation,
//! and results for a superseded session are discarded.

use crate::credentials::verifier::{VerificationService, VerifyOutcome};
use crate::scanner::capture::{CameraHandle, CaptureDevice};
use crate::scanner::session::{InputMode, RecordingError, ScanSession, ScanState};
use crate::storage::store::AttendanceStore;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events consumed by the controller.
///
/// Everything flows through one channel: operator actions, capture-source
/// scans, and internally produced verification completions.
#[derive(Debug)]
pub enum ScanEvent {
    /// Operator selected manual entry
    SelectManual,
    /// Operator selected the camera feed
    SelectCamera,
    /// A capture source decoded a code
    CodeScanned(String),
    /// Operator confirmed the verified student, with an optional reason
    Confirm { reason: Option<String> },
    /// Operator dismissed the current result
    Dismiss,
    /// Operator reset the session
    Reset,
    /// Internal: a spawned verification finished
    VerifyCompleted {
        generation: u64,
        outcome: VerifyOutcome,
    },
    /// Stop the controller loop
    Shutdown,
}

/// The scanning state machine.
///
/// Owns the session (lock flag, generation) and the camera handle; neither
/// exists anywhere else, so there is no ambient shared scanning state.
pub struct ScanSessionController {
    verifier: Arc<VerificationService>,
    store: Arc<dyn AttendanceStore>,
    camera: Arc<dyn CaptureDevice>,
    /// Sender used by spawned verifications to deliver completions
    events_tx: mpsc::Sender<ScanEvent>,
    session: ScanSession,
    camera_handle: Option<CameraHandle>,
}

impl ScanSessionController {
    /// Creates a controller.
    ///
    /// # Arguments
    /// * `verifier` - Shared verification service
    /// * `store` - Storage collaborator for attendance recording
    /// * `camera` - Capture device for camera mode
    /// * `events_tx` - Clone of the event channel sender, used to post
    ///   verification completions back to the loop
    pub fn new(
        verifier: Arc<VerificationService>,
        store: Arc<dyn AttendanceStore>,
        camera: Arc<dyn CaptureDevice>,
        events_tx: mpsc::Sender<ScanEvent>,
    ) -> Self {
        ScanSessionController {
            verifier,
            store,
            camera,
            events_tx,
            session: ScanSession::new(),
            camera_handle: None,
        }
    }

    /// Read access to the session, for rendering and tests.
    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Whether the camera is currently held.
    #[allow(dead_code)]
    pub fn camera_held(&self) -> bool {
        self.camera_handle.is_some()
    }

    /// Runs the controller until a `Shutdown` event arrives or every
    /// sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<ScanEvent>) {
        while let Some(event) = events.recv().await {
            if matches!(event, ScanEvent::Shutdown) {
                debug!("controller shutting down");
                break;
            }
            self.handle_event(event).await;
        }
        // Dropping self releases any held camera handle.
    }

    /// Applies one event to the state machine.
    pub async fn handle_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::SelectManual => self.switch_mode(InputMode::Manual).await,
            ScanEvent::SelectCamera => self.switch_mode(InputMode::Camera).await,
            ScanEvent::CodeScanned(raw) => self.on_code_scanned(raw),
            ScanEvent::VerifyCompleted {
                generation,
                outcome,
            } => self.on_verify_completed(generation, outcome),
            ScanEvent::Confirm { reason } => self.on_confirm(reason).await,
            ScanEvent::Dismiss | ScanEvent::Reset => self.reset_session(),
            ScanEvent::Shutdown => {}
        }
    }

    /// Switches input mode, acquiring or releasing the camera as needed.
    ///
    /// Allowed from every state except `Found` (confirm or dismiss first)
    /// and `Recorded` (reset first). Switching away during `Verifying`
    /// abandons the in-flight check; its result will be discarded.
    async fn switch_mode(&mut self, mode: InputMode) {
        match self.session.state() {
            ScanState::Found | ScanState::Recorded => {
                debug!(
                    "ignoring mode switch in state {:?}",
                    self.session.state()
                );
                return;
            }
            ScanState::Verifying => {
                debug!("mode switch during verification; in-flight result will be discarded");
                self.session.abandon_verification();
            }
            _ => {}
        }

        match mode {
            InputMode::Manual => {
                self.release_camera();
                self.session.enter_input_mode(InputMode::Manual);
                info!("input mode: manual entry");
            }
            InputMode::Camera => {
                if self.camera_handle.is_none() {
                    match CameraHandle::acquire(self.camera.clone()).await {
                        Ok(handle) => self.camera_handle = Some(handle),
                        Err(err) => {
                            warn!("camera acquisition failed: {}", err);
                            self.session.fail_resource(err);
                            return;
                        }
                    }
                }
                self.session.enter_input_mode(InputMode::Camera);
                info!("input mode: camera");
            }
        }
    }

    /// Starts a verification for a scanned code, unless one is in flight.
    ///
    /// Events arriving while the lock is held are dropped, not queued.
    fn on_code_scanned(&mut self, raw: String) {
        if !self.session.begin_verifying(raw.clone()) {
            debug!(
                "dropped scan event in state {:?} (lock held: {})",
                self.session.state(),
                self.session.lock_held()
            );
            return;
        }

        let verifier = Arc::clone(&self.verifier);
        let events = self.events_tx.clone();
        let generation = self.session.generation();
        tokio::spawn(async move {
            let outcome = verifier.verify(&raw).await;
            if events
                .send(ScanEvent::VerifyCompleted {
                    generation,
                    outcome,
                })
                .await
                .is_err()
            {
                debug!("controller stopped before verification completed");
            }
        });
    }

    /// Applies a verification completion if it still belongs to the
    /// current session.
    fn on_verify_completed(&mut self, generation: u64, outcome: VerifyOutcome) {
        if generation != self.session.generation()
            || self.session.state() != ScanState::Verifying
        {
            debug!("discarding verification result for a superseded session");
            return;
        }

        match serde_json::to_string(&outcome.report()) {
            Ok(json) => info!("verification result: {}", json),
            Err(err) => warn!("could not serialize verification report: {}", err),
        }

        self.session.complete_verification(outcome);
        if let Some(message) = self.session.operator_message() {
            info!("operator message: {}", message);
        }
    }

    /// Records attendance for the verified student on operator
    /// confirmation.
    ///
    /// A persistence failure keeps the verified result in place so the
    /// operator can retry without re-scanning.
    async fn on_confirm(&mut self, reason: Option<String>) {
        if self.session.state() != ScanState::Found {
            debug!("ignoring confirm in state {:?}", self.session.state());
            return;
        }
        let student = match self.session.resolved() {
            Some(student) => student.clone(),
            None => return,
        };

        match self
            .store
            .record_attendance(&student.id, Utc::now(), reason)
            .await
        {
            Ok(record) => {
                info!(
                    "recorded lateness for {} ({}) at {}",
                    student.name, student.id, record.arrival_time
                );
                self.session.mark_recorded();
            }
            Err(err) => {
                error!("failed to persist attendance for {}: {}", student.id, err);
                self.session
                    .fail_recording(RecordingError::PersistenceFailed(err.to_string()));
            }
        }
    }

    /// Resets the session to idle, releasing the camera.
    fn reset_session(&mut self) {
        self.release_camera();
        self.session.reset();
        debug!("session reset");
    }

    fn release_camera(&mut self) {
        // Dropping the handle releases the device.
        self.camera_handle.take();
    }
}
