//! Bluetooth device representation

use crate::core::transport::TransportError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A remote device the terminal can connect to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    /// Device address (MAC)
    pub address: String,
    /// Friendly name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl BluetoothDevice {
    /// Create a device with an address and no name
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            name: None,
        }
    }

    /// Set the friendly name. An empty name leaves the device unnamed.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = (!name.is_empty()).then(|| name.to_string());
        self
    }

    /// Friendly name, `None` when unknown or empty
    pub fn known_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    /// Get display name (name or address if name unknown)
    pub fn display_name(&self) -> &str {
        self.known_name().unwrap_or(&self.address)
    }
}

/// Named devices first, by name then address. Unnamed devices by address.
/// An empty name counts as unnamed.
impl Ord for BluetoothDevice {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.known_name(), other.known_name()) {
            (Some(a), Some(b)) => a.cmp(b).then_with(|| self.address.cmp(&other.address)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self
                .address
                .cmp(&other.address)
                .then_with(|| self.name.cmp(&other.name)),
        }
    }
}

impl PartialOrd for BluetoothDevice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Helper to format Bluetooth MAC address
pub fn format_mac_address(addr: &[u8; 6]) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        addr[0], addr[1], addr[2], addr[3], addr[4], addr[5]
    )
}

/// Parse MAC address string to bytes
pub fn parse_mac_address(addr: &str) -> Result<[u8; 6], TransportError> {
    let invalid = || TransportError::InvalidAddress(addr.to_string());
    let mut result = [0u8; 6];
    let mut parts = addr.split(':');

    for slot in &mut result {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 {
            return Err(invalid());
        }
        *slot = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mac() {
        let addr = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        assert_eq!(format_mac_address(&addr), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_parse_mac() {
        let addr = parse_mac_address("aa:BB:cc:DD:ee:FF").unwrap();
        assert_eq!(addr, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[test]
    fn test_parse_mac_rejects_malformed() {
        for bad in ["", "AA:BB:CC:DD:EE", "AA:BB:CC:DD:EE:FF:00", "AA:BB:CC:DD:EE:GG", "A:BB:CC:DD:EE:FFF"] {
            assert!(
                matches!(parse_mac_address(bad), Err(TransportError::InvalidAddress(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_name() {
        let unnamed = BluetoothDevice::new("00:11:22:33:44:55");
        assert_eq!(unnamed.display_name(), "00:11:22:33:44:55");
        assert_eq!(unnamed.with_name("HC-05").display_name(), "HC-05");
    }

    #[test]
    fn test_empty_name_is_unnamed() {
        let device = BluetoothDevice::new("00:11:22:33:44:55").with_name("");
        assert_eq!(device.name, None);
        assert_eq!(device.display_name(), "00:11:22:33:44:55");

        let loaded = BluetoothDevice {
            address: "00:00:00:00:00:01".to_string(),
            name: Some(String::new()),
        };
        assert_eq!(loaded.display_name(), "00:00:00:00:00:01");

        let mut devices = vec![loaded, BluetoothDevice::new("00:00:00:00:00:09").with_name("Zeta")];
        devices.sort();
        assert_eq!(devices[0].display_name(), "Zeta");
        assert_eq!(devices[1].address, "00:00:00:00:00:01");
    }

    #[test]
    fn test_ordering() {
        let mut devices = vec![
            BluetoothDevice::new("00:00:00:00:00:03"),
            BluetoothDevice::new("00:00:00:00:00:09").with_name("Zeta"),
            BluetoothDevice::new("00:00:00:00:00:01"),
            BluetoothDevice::new("00:00:00:00:00:08").with_name("Alpha"),
            BluetoothDevice::new("00:00:00:00:00:02").with_name("Alpha"),
        ];
        devices.sort();

        let order: Vec<_> = devices.iter().map(|d| d.address.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "00:00:00:00:00:02",
                "00:00:00:00:00:08",
                "00:00:00:00:00:09",
                "00:00:00:00:00:01",
                "00:00:00:00:00:03",
            ]
        );
    }
}
