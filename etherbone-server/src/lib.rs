//! # Etherbone Relay Server Library
//!
//! A TCP server that lets a debugger (e.g. OpenOCD's VexRiscv target driver) reach the bus and
//! the debug interface of a remote VexRiscv CPU.
//!
//! ## Overview
//!
//! Debugger clients speak a fixed-size protocol: every request is 10 bytes and every read is
//! answered with 4 bytes (see [`etherbone_protocol::relay`]). The server decodes requests and
//! hands them to a backend that performs the actual bus accesses.
//!
//! ## Architecture
//!
//! - **[`RelayBackend`] Trait**: the interface a backend implements to perform bus and debug
//!   register accesses.
//! - **[`server::Server`]**: accepts connections, decodes requests, routes them and writes
//!   replies.
//!
//! ## Request Routing
//!
//! Addresses inside the 8-byte debug window (default base `0xf00f0000`) are translated to a
//! register offset (0 for `CORE`, 4 for `DATA`) and passed to [`RelayBackend::debug_read`] or
//! [`RelayBackend::debug_write`]. Only 32-bit accesses are accepted in the window. Every other
//! address goes to [`RelayBackend::read`] or [`RelayBackend::write`] at the requested width.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use etherbone_server::server::Builder;
//!
//! let mut server = Builder::new()
//!     .debug_window_base(0xf00f_0000)
//!     .build(my_backend);
//! server.listen("127.0.0.1:7893")?;
//! ```
//!
//! ## Error Handling
//!
//! The relay protocol has no way to report errors. Malformed requests are logged and dropped.
//! Backends are expected to log their own failures and to return `0xffffffff` from failed
//! reads, so that the client is never left waiting for a reply.
//!
//! ## Thread Model
//!
//! Clients are served one at a time, and each request is completed before the next one is
//! read.
pub mod server;

use etherbone_protocol::relay::Width;

/// Bus access performed on behalf of relay clients.
pub trait RelayBackend {
    /// Read `width` bits at `address`. The result is zero-extended.
    fn read(&mut self, width: Width, address: u32) -> u32;

    /// Write the low `width` bits of `value` to `address`.
    fn write(&mut self, width: Width, address: u32, value: u32);

    /// Read the debug register at `offset` inside the debug window.
    ///
    /// Offsets that do not name a register should be logged and answered with `0xffffffff`.
    fn debug_read(&mut self, offset: u32) -> u32;

    /// Write the debug register at `offset` inside the debug window.
    fn debug_write(&mut self, offset: u32, value: u32);
}
