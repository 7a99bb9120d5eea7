//! # Etherbone Client
//!
//! Register access to a remote Wishbone bus through an Etherbone bridge, and access to the
//! VexRiscv debug interface that sits behind it.
//!
//! ## Overview
//!
//! The crate is layered:
//!
//! - [`transport`]: a UDP or TCP [`transport::Connection`] that carries encoded packets.
//! - [`bus::Bus`]: native 32-bit reads and writes, one transaction per call.
//! - [`csr::Csr`]: 8/16/32/64-bit register access on byte-native or word-native CSR buses.
//! - [`debug_bus`]: the CPU debug registers `CORE` and `DATA`, reached through a handshake
//!   over ordinary CSR accesses.
//! - [`csr_map::CsrMap`]: symbolic register names from a LiteX `csr.csv`.
//!
//! For the wire format see the [`etherbone_protocol`] crate.
//!
//! ## Basic Usage
//!
//! ### Peeking and poking
//!
//! ```ignore
//! use etherbone_client::{Bus, Connection, Csr, CsrWidth, TransportConfig};
//!
//! let connection = Connection::connect("192.168.1.50", 1234, &TransportConfig::default())?;
//! let mut csr = Csr::new(Bus::new(connection), CsrWidth::Byte);
//!
//! csr.write32(0x1000_0000, 0x1234_5678)?;
//! assert_eq!(csr.read32(0x1000_0000)?, 0x1234_5678);
//! ```
//!
//! ### Talking to the debug bus
//!
//! ```ignore
//! use etherbone_client::{CsrMap, DebugAccess, DebugBus, DebugBusConfig};
//! use etherbone_protocol::DebugRegister;
//!
//! let map = CsrMap::from_path("csr.csv")?.counter_sync_map("vexriscv_debug")?;
//! let mut debug = DebugBus::connect(&mut csr, map, DebugBusConfig::default())?;
//! let core = debug.debug_read(&mut csr, DebugRegister::Core)?;
//! ```
//!
//! ## Error Handling
//!
//! Opening a connection fails with [`error::ConnectionError`]. Bus operations fail with
//! [`error::BusError`] on socket errors. A read reply of the wrong size is not an error: it
//! is logged and [`bus::BEST_EFFORT_VALUE`] is returned. Debug bus operations additionally
//! fail with [`error::DebugBusError::Timeout`] when the handshake does not complete.
//!
//! ## Thread Model
//!
//! Every operation is synchronous and at most one transaction is in flight. Callers that
//! share a bus between threads must serialize access themselves.
pub mod bus;
pub mod csr;
pub mod csr_map;
pub mod debug_bus;
pub mod error;
pub mod transport;

#[cfg(test)]
mod testing;

pub use bus::Bus;
pub use csr::{Csr, CsrWidth};
pub use csr_map::CsrMap;
pub use debug_bus::{
    CommandDebugBus, CommandMap, CounterSyncMap, DebugAccess, DebugBus, DebugBusConfig,
};
pub use transport::{Connection, Protocol, Transport, TransportConfig};
