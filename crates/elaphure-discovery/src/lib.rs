//! Elaphure Discovery - LAN discovery of elaphureLink devices
//!
//! A scan broadcasts a fixed probe on every usable IPv4 interface and
//! collects the distinct addresses that answer within a time window:
//! - Interface enumeration and directed-broadcast target computation
//! - The probe wire format
//! - The scanner that sends, listens and deduplicates replies

pub mod interface;
pub mod probe;
pub mod scanner;

pub use interface::{
    broadcast_address, broadcast_targets, merge_interfaces, InterfaceAddr, InterfaceInfo,
    InterfaceSource, LinkFlags, SystemInterfaces,
};
pub use probe::{DISCOVERY_PORT, DISCOVERY_REQUEST};
pub use scanner::{DiscoveryError, DiscoveryEvent, ScannerConfig, UdpScanner};
