// src/main.rs

//! # QR Attendance Credential System - Kiosk Entry Point
//!
//! This module serves as the main entry point for the lateness-recording
//! kiosk. It initializes all core components and runs the interactive
//! scanning loop.
//!
//! ## Architecture Overview
//! 1. **Credential Layer**: Token issuance, payload codec, and signature
//!    verification (HMAC-SHA256 under a server signing key)
//! 2. **Scanner Layer**: Event-driven state machine with camera/manual
//!    input modes and a single-in-flight-verification lock
//! 3. **Storage Layer**: In-memory student roster and attendance log
//!    behind the external collaborator contract
//!
//! ## Environment Variables
//! - `SIGNING_KEY`: base64url-encoded 32-byte server signing key; an
//!   ephemeral key is generated when absent
//! - `STUDENT_ROSTER`: (Optional) path to a JSON array of student records
//! - `RUST_LOG`: log filter (e.g. `info`, `qr_attendance_system=debug`)

use crate::credentials::issuer::TokenIssuer;
use crate::credentials::signing::SigningKey;
use crate::credentials::verifier::VerificationService;
use crate::models::student::StudentRecord;
use crate::scanner::capture::{CaptureDevice, DisconnectedCamera};
use crate::scanner::controller::{ScanEvent, ScanSessionController};
use crate::storage::store::MemoryStore;
use anyhow::Context;
use dotenv::dotenv;
use log::{info, warn};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

// Module declarations (organized by functional domain)
mod credentials; // Issuance, verification, signing, wire format
mod models;      // Data structures
mod scanner;     // State machine and capture devices
mod storage;     // Storage collaborator contract

/// Kiosk entry point.
///
/// # Initialization Sequence
/// 1. Load environment configuration
/// 2. Load the signing key and student roster
/// 3. Issue payloads for the roster (bounded-concurrency batch)
/// 4. Run the scanner loop over stdin events
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::init();

    let signing_key = load_signing_key()?;
    let store = Arc::new(load_roster().await?);

    let issuer = TokenIssuer::new(store.clone(), signing_key.clone());
    let verifier = Arc::new(VerificationService::new(store.clone(), signing_key));
    let camera: Arc<dyn CaptureDevice> = Arc::new(DisconnectedCamera);

    let (events_tx, events_rx) = mpsc::channel(32);
    let controller =
        ScanSessionController::new(verifier, store.clone(), camera, events_tx.clone());
    let controller_task = tokio::spawn(controller.run(events_rx));

    // Issue credentials for everyone on the roster so cards can be printed.
    let ids = store.student_ids().await;
    for (id, result) in issuer.issue_batch(&ids).await {
        match result {
            Ok(payload) => println!("{}: {}", id, payload),
            Err(err) => warn!("could not issue credential for {}: {}", id, err),
        }
    }

    println!("Scanner commands:");
    println!("- :manual           switch to manual entry");
    println!("- :camera           switch to the camera feed");
    println!("- :confirm [reason] record attendance for the verified student");
    println!("- :dismiss / :reset discard the current session");
    println!("- :quit             stop the kiosk");
    println!("Any other line is treated as a scanned code.");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = match line {
            ":quit" => break,
            ":manual" => ScanEvent::SelectManual,
            ":camera" => ScanEvent::SelectCamera,
            ":dismiss" => ScanEvent::Dismiss,
            ":reset" => ScanEvent::Reset,
            _ if line.starts_with(":confirm") => ScanEvent::Confirm {
                reason: line
                    .strip_prefix(":confirm")
                    .map(str::trim)
                    .filter(|reason| !reason.is_empty())
                    .map(String::from),
            },
            code => ScanEvent::CodeScanned(code.to_string()),
        };
        if events_tx.send(event).await.is_err() {
            break;
        }
    }

    let _ = events_tx.send(ScanEvent::Shutdown).await;
    controller_task.await.context("controller task panicked")?;
    Ok(())
}

/// Loads the server signing key from `SIGNING_KEY`, generating an
/// ephemeral key when the variable is absent.
fn load_signing_key() -> anyhow::Result<Arc<SigningKey>> {
    match std::env::var("SIGNING_KEY") {
        Ok(encoded) => {
            let key = SigningKey::from_base64(encoded.trim())
                .context("SIGNING_KEY is not a valid base64url 32-byte key")?;
            info!("loaded signing key from environment");
            Ok(Arc::new(key))
        }
        Err(_) => {
            let (key, encoded) = SigningKey::generate();
            warn!(
                "SIGNING_KEY not set; generated an ephemeral key \
                 (set SIGNING_KEY={} to keep issued codes valid across restarts)",
                encoded
            );
            Ok(Arc::new(key))
        }
    }
}

/// Loads the student roster from `STUDENT_ROSTER` (a JSON array of student
/// records), falling back to a built-in demo roster.
async fn load_roster() -> anyhow::Result<MemoryStore> {
    match std::env::var("STUDENT_ROSTER") {
        Ok(path) => {
            let data = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read student roster {}", path))?;
            let students: Vec<StudentRecord> =
                serde_json::from_str(&data).context("student roster is not valid JSON")?;
            info!("loaded {} students from {}", students.len(), path);
            Ok(MemoryStore::with_students(students))
        }
        Err(_) => {
            warn!("STUDENT_ROSTER not set; using the built-in demo roster");
            Ok(MemoryStore::with_students(demo_roster()))
        }
    }
}

/// Small roster used when no `STUDENT_ROSTER` file is configured.
fn demo_roster() -> Vec<StudentRecord> {
    vec![
        StudentRecord::new("2024-0153", "Siti Rahma", "XI-IPA-2"),
        StudentRecord::new("2024-0201", "Budi Santoso", "X-IPS-1"),
        StudentRecord::new("2024-0322", "Dewi Lestari", "XII-IPA-1"),
    ]
}
