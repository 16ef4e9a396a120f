//! Device types for responders found by a discovery scan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::debug;

/// Label reported for every responder; the probe carries no per-device identity
pub const DEVICE_NAME: &str = "elaphureLink";

/// A responder observed during one discovery scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    /// Source address of the first reply (unique within a scan)
    pub address: IpAddr,
    /// Source UDP port of the first reply
    pub port: u16,
    /// Protocol family label
    pub name: String,
    /// Board/model string (not reported by the base protocol)
    #[serde(default)]
    pub model: Option<String>,
    /// Firmware version (not reported by the base protocol)
    #[serde(default)]
    pub firmware_version: Option<String>,
    /// Text capture of the first reply payload
    #[serde(default)]
    pub raw: String,
    /// When the first reply arrived
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredDevice {
    /// Create a device record from the first reply seen from `address`
    pub fn from_reply(address: IpAddr, port: u16, payload: &[u8]) -> Self {
        Self {
            address,
            port,
            name: DEVICE_NAME.to_string(),
            model: None,
            firmware_version: None,
            raw: payload_text(payload),
            discovered_at: Utc::now(),
        }
    }

    /// Label shown to the user when picking a device
    pub fn display_label(&self) -> String {
        match self.firmware_version.as_deref().map(str::trim) {
            Some(version) if !version.is_empty() => {
                format!("{}  {}  v{}", self.name, self.address, version)
            }
            _ => format!("{}  {}", self.name, self.address),
        }
    }
}

impl std::fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_label())
    }
}

/// Render a reply payload as text, falling back to dash-separated hex
/// (`FF-FE-00`) when it is not valid UTF-8
pub fn payload_text(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(e) => {
            debug!(len = payload.len(), error = %e, "Reply payload is not UTF-8, keeping hex");
            payload
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join("-")
        }
    }
}

/// Sort devices by their dotted-decimal address string.
///
/// This is plain string ordering, so `10.0.0.20` comes before `10.0.0.3`.
/// Callers rely on this ordering staying stable between releases.
pub fn sort_by_address(devices: &mut [DiscoveredDevice]) {
    devices.sort_by_cached_key(|d| d.address.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn device(ip: [u8; 4]) -> DiscoveredDevice {
        DiscoveredDevice::from_reply(IpAddr::V4(Ipv4Addr::from(ip)), 50000, b"hi")
    }

    #[test]
    fn test_from_reply_fills_fixed_fields() {
        let dev = device([192, 168, 1, 5]);
        assert_eq!(dev.name, DEVICE_NAME);
        assert_eq!(dev.port, 50000);
        assert_eq!(dev.raw, "hi");
        assert!(dev.firmware_version.is_none());
        assert!(dev.model.is_none());
    }

    #[test]
    fn test_payload_text_utf8() {
        assert_eq!(payload_text(b"ELAPHURE_DEVICE"), "ELAPHURE_DEVICE");
        assert_eq!(payload_text(b""), "");
    }

    #[test]
    fn test_payload_text_falls_back_to_hex() {
        assert_eq!(payload_text(&[0xff, 0xfe, 0x00]), "FF-FE-00");
        assert_eq!(payload_text(&[0xc3]), "C3");
    }

    #[test]
    fn test_sort_is_lexicographic() {
        let mut devices = vec![device([10, 0, 0, 3]), device([10, 0, 0, 20])];
        sort_by_address(&mut devices);
        let order: Vec<String> = devices.iter().map(|d| d.address.to_string()).collect();
        assert_eq!(order, vec!["10.0.0.20", "10.0.0.3"]);
    }

    #[test]
    fn test_display_label() {
        let mut dev = device([192, 168, 1, 9]);
        assert_eq!(dev.display_label(), "elaphureLink  192.168.1.9");

        dev.firmware_version = Some("   ".to_string());
        assert_eq!(dev.display_label(), "elaphureLink  192.168.1.9");

        dev.firmware_version = Some("1.2.0".to_string());
        assert_eq!(dev.to_string(), "elaphureLink  192.168.1.9  v1.2.0");
    }

    #[test]
    fn test_serializes_camel_case() {
        let dev = device([192, 168, 1, 5]);
        let json = serde_json::to_value(&dev).unwrap();
        assert_eq!(json["address"], "192.168.1.5");
        assert!(json.get("firmwareVersion").is_some());
        assert!(json.get("discoveredAt").is_some());
    }
}
