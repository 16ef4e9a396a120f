//! Discovery scanner: broadcast the probe and collect distinct responders

use elaphure_core::{sort_by_address, DiscoveredDevice};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::interface::{broadcast_targets, InterfaceSource, SystemInterfaces};
use crate::probe::{DEFAULT_SUB_TIMEOUT, DISCOVERY_PORT, DISCOVERY_REQUEST, RECV_BUFFER_LEN};

/// Errors that abort a whole scan
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to enumerate network interfaces: {0}")]
    Interfaces(String),
    #[error("Failed to bind discovery socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Failed to enable broadcast on discovery socket: {0}")]
    Broadcast(#[source] io::Error),
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// UDP port devices listen on
    pub port: u16,
    /// Local address the probe socket binds to (port is always ephemeral)
    pub bind_addr: Ipv4Addr,
    /// Longest single receive wait before the deadline is re-checked
    pub sub_timeout_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            port: DISCOVERY_PORT,
            bind_addr: Ipv4Addr::UNSPECIFIED,
            sub_timeout_ms: DEFAULT_SUB_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Discovery event for real-time updates
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// Probes sent, listening for replies
    ScanStarted { targets: usize },
    /// First reply from a new address
    DeviceDiscovered(DiscoveredDevice),
    /// Scan finished, by deadline or cancellation
    ScanCompleted { found: usize, cancelled: bool },
}

/// UDP broadcast discovery scanner.
///
/// Holds no per-scan state: every call opens, owns and releases its own
/// socket, so one scanner can be shared between callers.
pub struct UdpScanner<S = SystemInterfaces> {
    config: ScannerConfig,
    source: S,
    event_tx: broadcast::Sender<DiscoveryEvent>,
}

impl UdpScanner<SystemInterfaces> {
    /// Create a scanner over the operating system's interfaces
    pub fn new(config: ScannerConfig) -> Self {
        Self::with_source(config, SystemInterfaces)
    }
}

impl<S: InterfaceSource> UdpScanner<S> {
    /// Create a scanner with a custom interface source
    pub fn with_source(config: ScannerConfig, source: S) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            source,
            event_tx,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Subscribe to discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Probe every eligible interface and collect replies for `timeout`
    pub async fn scan(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        self.scan_with_cancel(timeout, &CancellationToken::new()).await
    }

    /// Like [`scan`](Self::scan), but returns early with the devices seen so
    /// far once `cancel` fires
    pub async fn scan_with_cancel(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let deadline = Instant::now() + timeout;

        let interfaces = self.source.interfaces()?;
        let targets = broadcast_targets(&interfaces, self.config.port);
        if targets.is_empty() {
            info!("No broadcast-capable interfaces, skipping discovery");
            return Ok(Vec::new());
        }

        self.run(&targets, deadline, cancel).await
    }

    /// Probe an explicit list of targets instead of the interface broadcasts
    pub async fn scan_targets(
        &self,
        targets: &[SocketAddrV4],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let deadline = Instant::now() + timeout;
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        self.run(targets, deadline, cancel).await
    }

    async fn run(
        &self,
        targets: &[SocketAddrV4],
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let socket = self.open_socket().await?;

        for target in targets {
            match socket.send_to(DISCOVERY_REQUEST, target).await {
                Ok(_) => trace!(target = %target, "Sent discovery probe"),
                Err(e) => warn!(target = %target, error = %e, "Failed to send discovery probe"),
            }
        }
        let _ = self.event_tx.send(DiscoveryEvent::ScanStarted {
            targets: targets.len(),
        });

        let sub_timeout = Duration::from_millis(self.config.sub_timeout_ms);
        let mut seen: HashMap<IpAddr, DiscoveredDevice> = HashMap::new();
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        let mut cancelled = false;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = sub_timeout.min(deadline - now);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                received = time::timeout(wait, socket.recv_from(&mut buf)) => match received {
                    // Sub-timeout elapsed, re-check the deadline
                    Err(_) => continue,
                    Ok(Err(e)) => {
                        debug!(error = %e, "Receive failed, continuing");
                    }
                    Ok(Ok((len, from))) => self.record_reply(&mut seen, from, &buf[..len]),
                },
            }
        }

        drop(socket);

        let mut devices: Vec<DiscoveredDevice> = seen.into_values().collect();
        sort_by_address(&mut devices);

        let _ = self.event_tx.send(DiscoveryEvent::ScanCompleted {
            found: devices.len(),
            cancelled,
        });
        info!(
            found = devices.len(),
            targets = targets.len(),
            cancelled,
            "Discovery scan complete"
        );

        Ok(devices)
    }

    async fn open_socket(&self) -> Result<UdpSocket, DiscoveryError> {
        let addr = SocketAddr::from((self.config.bind_addr, 0));
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| DiscoveryError::Bind { addr, source })?;
        socket.set_broadcast(true).map_err(DiscoveryError::Broadcast)?;

        if let Ok(local) = socket.local_addr() {
            debug!(local = %local, "Discovery socket bound");
        }
        Ok(socket)
    }

    /// Keep the first reply per source address
    fn record_reply(
        &self,
        seen: &mut HashMap<IpAddr, DiscoveredDevice>,
        from: SocketAddr,
        payload: &[u8],
    ) {
        let slot = match seen.entry(from.ip()) {
            Entry::Occupied(_) => {
                trace!(from = %from, "Duplicate reply ignored");
                return;
            }
            Entry::Vacant(slot) => slot,
        };

        let device = DiscoveredDevice::from_reply(from.ip(), from.port(), payload);
        info!(ip = %device.address, port = device.port, "Found elaphureLink device");
        let _ = self
            .event_tx
            .send(DiscoveryEvent::DeviceDiscovered(device.clone()));
        slot.insert(device);
    }
}
