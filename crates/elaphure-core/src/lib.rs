//! Elaphure Core - Core types shared by the discovery scanner and its callers
//!
//! This crate provides the result entity produced by a LAN discovery scan
//! and the helpers used to render it.

pub mod device;

pub use device::{payload_text, sort_by_address, DiscoveredDevice, DEVICE_NAME};
