//! # Etherbone Protocol Library
//!
//! Wire formats used to reach a remote Wishbone bus over IP and to relay a CPU debug interface
//! to a debugger.
//!
//! ## Overview
//!
//! Two independent formats live in this crate:
//!
//! - [`packet`]: Etherbone packets carrying exactly one 32-bit bus transaction (read or write),
//!   plus the header-only probe. Every transaction packet is exactly 20 bytes.
//! - [`relay`]: the 10-byte request / 4-byte reply protocol that debugger clients
//!   (e.g. OpenOCD's VexRiscv driver) use to access the bus and the debug registers.
//!
//! ## Basic Usage
//!
//! ### Encoding a bus transaction
//!
//! ```
//! use etherbone_protocol::packet::{self, Transaction};
//!
//! let bytes = packet::encode_write(0xe000_a024, 1);
//! assert_eq!(&bytes[..4], &[0x4e, 0x6f, 0x10, 0x44]);
//! assert_eq!(
//!     Transaction::from_bytes(&bytes).expect("Packet should parse"),
//!     Transaction::Write { address: 0xe000_a024, value: 1 }
//! );
//! ```
//!
//! ### Decoding a read reply
//!
//! ```
//! use etherbone_protocol::{error::ProtocolError, packet};
//!
//! let reply = packet::encode_reply(0x1234_5678);
//! assert_eq!(packet::decode_reply(&reply), Ok(0x1234_5678));
//! assert!(matches!(
//!     packet::decode_reply(&reply[..19]),
//!     Err(ProtocolError::UnexpectedLength { .. })
//! ));
//! ```
//!
//! ### Relay requests
//!
//! ```
//! use etherbone_protocol::relay::{Operation, RelayRequest, Width};
//!
//! let request = RelayRequest::from_bytes(&[0, 2, 0x00, 0x00, 0x0f, 0xf0, 0, 0, 0, 0])
//!     .expect("Request should parse");
//! assert_eq!(request.operation, Operation::Read);
//! assert_eq!(request.width, Width::Bits32);
//! assert_eq!(request.address, 0xf00f_0000);
//! ```
//!
//! ## Error Handling
//!
//! Packet decoding fails with [`error::ProtocolError`], relay decoding with
//! [`error::RelayError`].
//!
//! ## Features
//!
//! - `tokio`: `tokio_util::codec` framing for both formats (`tokio_codec` module).

pub mod error;
pub mod packet;
pub mod relay;
#[cfg(feature = "tokio")]
pub mod tokio_codec;

pub use packet::Transaction;
pub use relay::{DebugRegister, DebugWindow, RelayRequest};
