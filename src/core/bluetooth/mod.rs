//! Bluetooth Classic support
//!
//! Provides:
//! - RFCOMM/SPP serial transport
//! - Device records with the ordering used by device lists
//! - MAC address parsing and formatting

pub mod device;
pub mod rfcomm;

pub use device::{format_mac_address, parse_mac_address, BluetoothDevice};
pub use rfcomm::{RfcommConfig, RfcommTransport};

use uuid::Uuid;

/// Serial Port Profile service class
pub const SPP_UUID: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spp_uuid() {
        assert_eq!(
            SPP_UUID.to_string().to_uppercase(),
            "00001101-0000-1000-8000-00805F9B34FB"
        );
    }
}
