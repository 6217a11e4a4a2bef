//! Guest networking for the emulator.
//!
//! QEMU's user-mode network stack gives the guest a private subnet; the host
//! reaches the guest's SSH server through a single TCP port forward whose host
//! side is allocated per launch.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

pub mod constants;
mod ports;

pub use ports::{EphemeralPortAllocator, PortAllocator};

use constants::{GUEST_IP, GUEST_MAC, GUEST_NET, GUEST_SSH_PORT, HOST_IP, NETDEV_ID};

/// Topology of the user-mode network handed to the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Guest subnet in CIDR notation
    pub subnet: String,
    /// Address the guest receives via DHCP
    pub guest_ip: Ipv4Addr,
    /// Address of the host inside the guest subnet
    pub host_ip: Ipv4Addr,
    /// MAC address of the guest NIC
    pub guest_mac: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            subnet: GUEST_NET.to_string(),
            guest_ip: Ipv4Addr::from(GUEST_IP),
            host_ip: Ipv4Addr::from(HOST_IP),
            guest_mac: constants::mac_to_string(&GUEST_MAC),
        }
    }
}

impl NetworkConfig {
    /// Value for `-netdev`, forwarding `host_ssh_port` to the guest's port 22.
    pub fn netdev_arg(&self, host_ssh_port: u16) -> String {
        format!(
            "user,id={},net={},dhcpstart={},host={},hostfwd=tcp::{}-:{}",
            NETDEV_ID, self.subnet, self.guest_ip, self.host_ip, host_ssh_port, GUEST_SSH_PORT
        )
    }

    /// Value for the NIC `-device` bound to the netdev.
    pub fn device_arg(&self, model: &str) -> String {
        format!("{},netdev={},mac={}", model, NETDEV_ID, self.guest_mac)
    }
}
