//! Discovery probe wire format

use std::time::Duration;

/// UDP port devices listen on for discovery probes
pub const DISCOVERY_PORT: u16 = 50000;

/// Request payload broadcast to every target
pub const DISCOVERY_REQUEST: &[u8] = b"ELAPHURE_DISCOVERY?";

/// Default overall scan window
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(800);

/// Upper bound on a single receive wait before the deadline is re-checked
pub const DEFAULT_SUB_TIMEOUT: Duration = Duration::from_millis(120);

/// Receive buffer size, large enough for any UDP payload so replies are
/// never truncated before their text is captured
pub const RECV_BUFFER_LEN: usize = 65_535;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_ascii() {
        assert!(DISCOVERY_REQUEST.is_ascii());
        assert_eq!(DISCOVERY_REQUEST, "ELAPHURE_DISCOVERY?".as_bytes());
    }

    #[test]
    fn test_sub_timeout_shorter_than_scan() {
        assert!(DEFAULT_SUB_TIMEOUT < DEFAULT_SCAN_TIMEOUT);
    }
}
