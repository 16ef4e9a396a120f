//! Scan session state shared with whatever presents the results
//!
//! Guards against overlapping scans, keeps the last result list and the
//! user's selection, and turns scan failures into an empty list.

use elaphure_core::DiscoveredDevice;
use elaphure_discovery::DiscoveryError;
use std::future::Future;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{error, info};

/// Result of asking the session to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Scan ran to completion (possibly with no devices)
    Completed { found: usize },
    /// Another scan was already in flight; nothing was started
    Busy,
    /// Scan could not be set up; the device list is left empty
    Failed(String),
}

#[derive(Default)]
struct SessionState {
    devices: Vec<DiscoveredDevice>,
    selected: Option<DiscoveredDevice>,
}

#[derive(Default)]
pub struct ScanSession {
    scanning: AtomicBool,
    state: RwLock<SessionState>,
}

/// Clears the scanning flag on every exit path
struct ScanningGuard<'a>(&'a AtomicBool);

impl Drop for ScanningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `scan` unless one is already in flight.
    ///
    /// The future is not polled when the session is busy, so no socket is
    /// opened for a rejected request.
    pub async fn run<F>(&self, scan: F) -> ScanOutcome
    where
        F: Future<Output = Result<Vec<DiscoveredDevice>, DiscoveryError>>,
    {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Scan already in progress, ignoring request");
            return ScanOutcome::Busy;
        }
        let _guard = ScanningGuard(&self.scanning);

        {
            let mut state = self.state.write().await;
            state.devices.clear();
            state.selected = None;
        }

        match scan.await {
            Ok(devices) => {
                let found = devices.len();
                let mut state = self.state.write().await;
                // A lone device is the obvious pick
                if found == 1 {
                    state.selected = devices.first().cloned();
                }
                state.devices = devices;
                ScanOutcome::Completed { found }
            }
            Err(e) => {
                error!(error = %e, "Device discovery failed");
                ScanOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// True only once a scan has finished with at least one device
    pub async fn has_devices(&self) -> bool {
        !self.is_scanning() && !self.state.read().await.devices.is_empty()
    }

    pub async fn devices(&self) -> Vec<DiscoveredDevice> {
        self.state.read().await.devices.clone()
    }

    pub async fn selected(&self) -> Option<DiscoveredDevice> {
        self.state.read().await.selected.clone()
    }

    /// Select the device at `address`, returning it when present
    pub async fn select(&self, address: IpAddr) -> Option<DiscoveredDevice> {
        let mut state = self.state.write().await;
        let device = state.devices.iter().find(|d| d.address == address).cloned();
        if device.is_some() {
            state.selected = device.clone();
        }
        device
    }

    /// Address to hand to the connection setup, from the current selection
    pub async fn connection_address(&self) -> Option<IpAddr> {
        self.state.read().await.selected.as_ref().map(|d| d.address)
    }
}
