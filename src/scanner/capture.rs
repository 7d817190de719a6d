// src/scanner/capture.rs
//! Capture-device access for camera-driven scanning.
//!
//! The physical camera driver is outside this crate; the scanner core only
//! needs scoped acquire/release semantics and a typed classification of
//! device failures. `CameraHandle` ties the release to Drop, so every exit
//! from camera mode (mode switch, error, session reset, or abnormal
//! termination) gives the device back.

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use thiserror::Error;

/// Typed camera failure reasons.
///
/// Raw device/OS errors are classified into the closest variant via
/// [`ResourceError::classify`]; the catch-all `Unavailable` covers anything
/// with no known pattern.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// The operating system refused camera access
    #[error("camera access was denied")]
    PermissionDenied,
    /// Another application holds the device
    #[error("camera is in use by another application")]
    DeviceBusy,
    /// No capture device is attached
    #[error("no camera device was found")]
    NotFound,
    /// Unclassifiable device failure
    #[error("camera is unavailable")]
    Unavailable,
}

#[allow(dead_code)]
impl ResourceError {
    /// Classifies a raw device error message into the closest variant.
    pub fn classify(raw: &str) -> Self {
        let lowered = raw.to_ascii_lowercase();
        if lowered.contains("permission") || lowered.contains("denied") {
            ResourceError::PermissionDenied
        } else if lowered.contains("busy") || lowered.contains("in use") {
            ResourceError::DeviceBusy
        } else if lowered.contains("not found") || lowered.contains("no device") {
            ResourceError::NotFound
        } else {
            ResourceError::Unavailable
        }
    }
}

/// Access to a physical capture device.
///
/// Implementations wrap a real camera driver. The contract is exclusive:
/// one successful `acquire` must be paired with exactly one `release`,
/// which [`CameraHandle`] guarantees.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquires exclusive access to the device.
    async fn acquire(&self) -> Result<(), ResourceError>;

    /// Releases the device. Called exactly once per successful acquire.
    fn release(&self);
}

/// RAII guard over an acquired capture device.
///
/// Dropping the handle releases the device, so camera access can never
/// leak past the scope that acquired it.
pub struct CameraHandle {
    device: Arc<dyn CaptureDevice>,
}

impl CameraHandle {
    /// Acquires the device, returning a guard that releases it on drop.
    pub async fn acquire(device: Arc<dyn CaptureDevice>) -> Result<Self, ResourceError> {
        device.acquire().await?;
        debug!("camera acquired");
        Ok(CameraHandle { device })
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.device.release();
        debug!("camera released");
    }
}

/// Stand-in device for kiosk hosts with no camera attached.
///
/// Selecting camera mode against this device reports `NotFound`, leaving
/// manual entry as the working input mode.
pub struct DisconnectedCamera;

#[async_trait]
impl CaptureDevice for DisconnectedCamera {
    async fn acquire(&self) -> Result<(), ResourceError> {
        Err(ResourceError::NotFound)
    }

    fn release(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeCamera {
        fail_with: Option<ResourceError>,
        held: AtomicBool,
        releases: AtomicUsize,
    }

    impl FakeCamera {
        fn working() -> Self {
            FakeCamera {
                fail_with: None,
                held: AtomicBool::new(false),
                releases: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CaptureDevice for FakeCamera {
        async fn acquire(&self) -> Result<(), ResourceError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.held.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn release(&self) {
            self.held.store(false, Ordering::SeqCst);
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dropping_the_handle_releases_the_device() {
        let camera = Arc::new(FakeCamera::working());

        {
            let _handle = CameraHandle::acquire(camera.clone()).await.unwrap();
            assert!(camera.held.load(Ordering::SeqCst));
        }

        assert!(!camera.held.load(Ordering::SeqCst));
        assert_eq!(camera.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_acquisition_yields_no_handle_and_no_release() {
        let camera = Arc::new(FakeCamera {
            fail_with: Some(ResourceError::PermissionDenied),
            held: AtomicBool::new(false),
            releases: AtomicUsize::new(0),
        });

        let result = CameraHandle::acquire(camera.clone()).await;
        assert_eq!(result.err(), Some(ResourceError::PermissionDenied));
        assert_eq!(camera.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn raw_device_errors_classify_to_the_closest_variant() {
        assert_eq!(
            ResourceError::classify("NotAllowedError: Permission denied"),
            ResourceError::PermissionDenied
        );
        assert_eq!(
            ResourceError::classify("device busy"),
            ResourceError::DeviceBusy
        );
        assert_eq!(
            ResourceError::classify("requested device not found"),
            ResourceError::NotFound
        );
        assert_eq!(
            ResourceError::classify("ERR_UNKNOWN 0x8007"),
            ResourceError::Unavailable
        );
    }
}
