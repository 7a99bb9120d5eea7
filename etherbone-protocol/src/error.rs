use std::{error::Error, fmt::Display};

/// Errors that may occur when decoding an Etherbone packet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProtocolError {
    /// The packet did not have the size the decoder requires.
    UnexpectedLength { expected: usize, got: usize },
    InvalidMagic([u8; 2]),
    UnsupportedVersion(u8),
    /// Address or port width other than 32 bit.
    UnsupportedWidth { address: u8, port: u8 },
    /// The record does not describe exactly one read or one write.
    InvalidRecord { write_count: u8, read_count: u8 },
    /// A probe was answered by something that is not a probe reply.
    NotAProbeReply,
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::UnexpectedLength { expected, got } => {
                write!(f, "Unexpected packet length {}, expected {}", got, expected)
            }
            ProtocolError::InvalidMagic(magic) => {
                write!(f, "Invalid magic {:02x}{:02x}", magic[0], magic[1])
            }
            ProtocolError::UnsupportedVersion(version) => {
                write!(f, "Unsupported Etherbone version {}", version)
            }
            ProtocolError::UnsupportedWidth { address, port } => write!(
                f,
                "Unsupported width code: address={:#x}, port={:#x}",
                address, port
            ),
            ProtocolError::InvalidRecord {
                write_count,
                read_count,
            } => write!(
                f,
                "Record must hold a single transaction, got wcount={} rcount={}",
                write_count, read_count
            ),
            ProtocolError::NotAProbeReply => write!(f, "Packet is not a probe reply"),
        }
    }
}

impl Error for ProtocolError {}

/// Errors that may occur when decoding a relay request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RelayError {
    UnexpectedLength { expected: usize, got: usize },
    InvalidOperation(u8),
    InvalidWidth(u8),
    /// Offset inside the debug window that names neither the core nor the data register.
    InvalidDebugRegister(u32),
}

impl Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::UnexpectedLength { expected, got } => {
                write!(f, "Unrecognized request size {}, expected {}", got, expected)
            }
            RelayError::InvalidOperation(op) => write!(f, "Unrecognized readwrite command {}", op),
            RelayError::InvalidWidth(width) => write!(f, "Unrecognized size {}", width),
            RelayError::InvalidDebugRegister(offset) => {
                write!(f, "No debug register at offset {:#x}", offset)
            }
        }
    }
}

impl Error for RelayError {}
