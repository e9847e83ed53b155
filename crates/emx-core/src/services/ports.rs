use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::{Mutex, PoisonError};

use crate::error::{EmulatorError, Result};

/// Tracks ports handed to emulators started by this process.
pub struct PortAllocator {
    reserved: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new() -> Self {
        Self {
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve `port` on `host`, failing if it is already taken here or bound
    /// by anything else. Port `0` picks a free port instead.
    pub fn reserve(&self, host: &str, port: u16) -> Result<u16> {
        if port == 0 {
            return self.allocate(host);
        }
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        if reserved.contains(&port) || TcpListener::bind((host, port)).is_err() {
            return Err(EmulatorError::PortAllocation(format!(
                "port {port} already in use on {host}"
            )));
        }
        reserved.insert(port);
        Ok(port)
    }

    pub fn allocate(&self, host: &str) -> Result<u16> {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..100 {
            let port = find_available_port(host)?;
            if reserved.insert(port) {
                return Ok(port);
            }
        }
        Err(EmulatorError::PortAllocation(
            "could not find an available port after 100 attempts".into(),
        ))
    }

    pub fn release(&self, port: u16) {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        reserved.remove(&port);
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn find_available_port(host: &str) -> Result<u16> {
    let listener = TcpListener::bind((host, 0))
        .map_err(|e| EmulatorError::PortAllocation(e.to_string()))?;
    let port = listener
        .local_addr()
        .map_err(|e| EmulatorError::PortAllocation(e.to_string()))?
        .port();
    Ok(port)
}
