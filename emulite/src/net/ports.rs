//! Host TCP port allocation.

use std::net::{Ipv4Addr, TcpListener};

use emulite_shared::errors::{EmuliteError, EmuliteResult};

/// Source of free host TCP ports.
///
/// A returned port is free at the time of the call only; another process may
/// take it before the emulator binds it.
pub trait PortAllocator {
    fn allocate(&self) -> EmuliteResult<u16>;
}

/// Asks the kernel for an ephemeral port by binding `127.0.0.1:0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralPortAllocator;

impl PortAllocator for EphemeralPortAllocator {
    fn allocate(&self) -> EmuliteResult<u16> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(|e| {
            EmuliteError::ResourceUnavailable(format!("No free host TCP port: {}", e))
        })?;

        let port = listener
            .local_addr()
            .map_err(|e| {
                EmuliteError::ResourceUnavailable(format!("Failed to read bound port: {}", e))
            })?
            .port();

        tracing::debug!(port, "Allocated host TCP port");
        Ok(port)
    }
}
