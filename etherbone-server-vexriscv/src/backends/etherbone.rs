//! # Etherbone Backend
//!
//! Performs relay requests on a remote bus: plain accesses through the CSR adapter, debug
//! register accesses through a debug bus bridge.
//!
//! ## Example Usage
//!
//! ```ignore
//! use etherbone_client::{Bus, Connection, Csr, CsrWidth, DebugBus, DebugBusConfig};
//! use etherbone_server::server::Builder;
//!
//! let mut csr = Csr::new(Bus::new(connection), CsrWidth::Byte);
//! let debug = DebugBus::connect(&mut csr, map, DebugBusConfig::default())?;
//! let mut server = Builder::new().build(EtherboneBackend::new(csr, Box::new(debug)));
//! server.listen("127.0.0.1:7893")?;
//! ```
use etherbone_client::{Csr, DebugAccess, Transport};
use etherbone_protocol::relay::Width;
use etherbone_server::RelayBackend;

/// Reply to a read that failed. The relay protocol cannot carry errors.
const FAILED_READ: u32 = 0xffff_ffff;

pub struct EtherboneBackend<T: Transport> {
    csr: Csr<T>,
    debug: Box<dyn DebugAccess<T>>,
}

impl<T: Transport> EtherboneBackend<T> {
    pub fn new(csr: Csr<T>, debug: Box<dyn DebugAccess<T>>) -> EtherboneBackend<T> {
        EtherboneBackend { csr, debug }
    }
}

impl<T: Transport> RelayBackend for EtherboneBackend<T> {
    fn read(&mut self, width: Width, address: u32) -> u32 {
        self.csr.read(width, address).unwrap_or_else(|e| {
            log::error!("{}-bit read of {:08x} failed: {}", width.bits(), address, e);
            FAILED_READ
        })
    }

    fn write(&mut self, width: Width, address: u32, value: u32) {
        if let Err(e) = self.csr.write(width, address, value) {
            log::error!(
                "{}-bit write of {:08x} to {:08x} failed: {}",
                width.bits(),
                value,
                address,
                e
            );
        }
    }

    fn debug_read(&mut self, offset: u32) -> u32 {
        self.debug
            .debug_read_offset(&mut self.csr, offset)
            .unwrap_or_else(|e| {
                log::error!("Debug read at offset {} failed: {}", offset, e);
                FAILED_READ
            })
    }

    fn debug_write(&mut self, offset: u32, value: u32) {
        if let Err(e) = self.debug.debug_write_offset(&mut self.csr, offset, value) {
            log::error!("Debug write at offset {} failed: {}", offset, e);
        }
    }
}
