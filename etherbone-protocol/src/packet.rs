//! Encoding and decoding of single-transaction Etherbone packets.
//!
//! Every packet carries an 8-byte header followed by exactly one record:
//!
//! ```text
//!  0      1      2          3          4..8     8      9     10     11     12..16      16..20
//! +------+------+----------+----------+--------+------+-----+------+------+-----------+-------+
//! | 0x4e | 0x6f | VVVV?nRF | AAAApppp | pad    | flag | BE  | wcnt | rcnt | wr. addr  | value |
//! +------+------+----------+----------+--------+------+-----+------+------+-----------+-------+
//! ```
//!
//! All multi-byte fields are big-endian. A read has no separate address field: the address to
//! fetch travels in `value`, and the reply carries the fetched data in the same field.
use crate::error::ProtocolError;

/// Size of a header plus one record.
pub const PACKET_LEN: usize = 20;
/// Size of the packet header. Probes consist of the header only.
pub const HEADER_LEN: usize = 8;

const MAGIC: [u8; 2] = [0x4e, 0x6f];
const VERSION: u8 = 1;
/// Address width and port width, both 32 bit.
const WIDTHS_32: u8 = 0x44;
const BYTE_ENABLE: u8 = 0x0f;

const FLAG_PROBE: u8 = 0x01;
const FLAG_PROBE_REPLY: u8 = 0x02;
const FLAG_NO_READS: u8 = 0x04;

const OFFSET_FLAGS: usize = 2;
const OFFSET_WIDTHS: usize = 3;
const OFFSET_BYTE_ENABLE: usize = 9;
const OFFSET_WRITE_COUNT: usize = 10;
const OFFSET_READ_COUNT: usize = 11;
const OFFSET_WRITE_ADDR: usize = 12;
const OFFSET_VALUE: usize = 16;

/// A single bus transaction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Transaction {
    /// Fetch the 32-bit word at `address`.
    Read { address: u32 },
    /// Store `value` at `address`.
    Write { address: u32, value: u32 },
}

impl Transaction {
    /// The bus address this transaction targets.
    pub fn address(&self) -> u32 {
        match self {
            Transaction::Read { address } | Transaction::Write { address, .. } => *address,
        }
    }

    /// Serializes the transaction into a complete 20-byte packet.
    pub fn to_bytes(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[..HEADER_LEN].copy_from_slice(&header(0));
        buf[OFFSET_BYTE_ENABLE] = BYTE_ENABLE;
        match *self {
            Transaction::Read { address } => {
                buf[OFFSET_READ_COUNT] = 1;
                buf[OFFSET_VALUE..].copy_from_slice(&address.to_be_bytes());
            }
            Transaction::Write { address, value } => {
                buf[OFFSET_WRITE_COUNT] = 1;
                buf[OFFSET_WRITE_ADDR..OFFSET_VALUE].copy_from_slice(&address.to_be_bytes());
                buf[OFFSET_VALUE..].copy_from_slice(&value.to_be_bytes());
            }
        }
        buf
    }

    /// Parses and validates a complete 20-byte packet.
    pub fn from_bytes(bytes: &[u8]) -> Result<Transaction, ProtocolError> {
        if bytes.len() != PACKET_LEN {
            return Err(ProtocolError::UnexpectedLength {
                expected: PACKET_LEN,
                got: bytes.len(),
            });
        }
        validate_header(bytes)?;

        let write_count = bytes[OFFSET_WRITE_COUNT];
        let read_count = bytes[OFFSET_READ_COUNT];
        match (write_count, read_count) {
            (1, 0) => Ok(Transaction::Write {
                address: be_u32(bytes, OFFSET_WRITE_ADDR),
                value: be_u32(bytes, OFFSET_VALUE),
            }),
            (0, 1) => Ok(Transaction::Read {
                address: be_u32(bytes, OFFSET_VALUE),
            }),
            _ => Err(ProtocolError::InvalidRecord {
                write_count,
                read_count,
            }),
        }
    }
}

fn header(flags: u8) -> [u8; HEADER_LEN] {
    [
        MAGIC[0],
        MAGIC[1],
        (VERSION << 4) | flags,
        WIDTHS_32,
        0,
        0,
        0,
        0,
    ]
}

fn validate_header(bytes: &[u8]) -> Result<(), ProtocolError> {
    if bytes[..2] != MAGIC {
        return Err(ProtocolError::InvalidMagic([bytes[0], bytes[1]]));
    }
    let version = bytes[OFFSET_FLAGS] >> 4;
    if version != VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }
    let widths = bytes[OFFSET_WIDTHS];
    if widths != WIDTHS_32 {
        return Err(ProtocolError::UnsupportedWidth {
            address: widths >> 4,
            port: widths & 0x0f,
        });
    }
    Ok(())
}

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Header-only packet asking the remote end to identify itself.
pub fn encode_probe() -> [u8; HEADER_LEN] {
    header(FLAG_PROBE)
}

/// Answer to [`encode_probe`], as sent by a device.
pub fn encode_probe_reply() -> [u8; HEADER_LEN] {
    header(FLAG_PROBE_REPLY | FLAG_NO_READS)
}

/// Returns true if `header` is a probe request.
pub fn is_probe(header: &[u8]) -> bool {
    header.len() >= HEADER_LEN && header[..2] == MAGIC && header[OFFSET_FLAGS] & FLAG_PROBE != 0
}

/// Returns true if `header` is a probe reply.
pub fn is_probe_reply(header: &[u8]) -> bool {
    header.len() >= HEADER_LEN
        && header[..2] == MAGIC
        && header[OFFSET_FLAGS] & FLAG_PROBE_REPLY != 0
}

/// Checks that `bytes` starts with a valid probe reply header.
pub fn decode_probe_reply(bytes: &[u8]) -> Result<(), ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::UnexpectedLength {
            expected: HEADER_LEN,
            got: bytes.len(),
        });
    }
    validate_header(bytes)?;
    if bytes[OFFSET_FLAGS] & FLAG_PROBE_REPLY == 0 {
        return Err(ProtocolError::NotAProbeReply);
    }
    Ok(())
}

pub fn encode_read(address: u32) -> [u8; PACKET_LEN] {
    Transaction::Read { address }.to_bytes()
}

pub fn encode_write(address: u32, value: u32) -> [u8; PACKET_LEN] {
    Transaction::Write { address, value }.to_bytes()
}

/// Packet a device sends back in response to a read. The data is written to return address 0.
pub fn encode_reply(value: u32) -> [u8; PACKET_LEN] {
    Transaction::Write { address: 0, value }.to_bytes()
}

/// Extracts the value field from a read reply.
///
/// Only the length is checked; the remaining fields are not validated.
pub fn decode_reply(bytes: &[u8]) -> Result<u32, ProtocolError> {
    if bytes.len() != PACKET_LEN {
        return Err(ProtocolError::UnexpectedLength {
            expected: PACKET_LEN,
            got: bytes.len(),
        });
    }
    Ok(be_u32(bytes, OFFSET_VALUE))
}
