//! Default virtual network topology for the QEMU user-mode network.
//!
//! These values seed [`super::NetworkConfig::default`]; callers that need a
//! different topology pass their own config instead of editing these.

/// Virtual network subnet configuration
pub const GUEST_NET: &str = "192.168.3.0/24";

/// Guest IP address (first DHCP lease handed out by QEMU)
pub const GUEST_IP: [u8; 4] = [192, 168, 3, 9];

/// Host IP address as seen from the guest
pub const HOST_IP: [u8; 4] = [192, 168, 3, 2];

/// Guest MAC address
///
/// Uses the QEMU OUI (52:54:00).
pub const GUEST_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x63, 0x5e, 0x7b];

/// Guest MAC address as colon-separated string
pub const GUEST_MAC_STRING: &str = "52:54:00:63:5e:7b";

/// Guest port the host SSH forward targets
pub const GUEST_SSH_PORT: u16 = 22;

/// QEMU netdev identifier tying `-netdev` to its `-device`
pub const NETDEV_ID: &str = "net0";

/// Helper function to format MAC address as string
pub fn mac_to_string(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}
