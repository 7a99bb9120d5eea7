//! The fixed-size request/response protocol spoken by debugger clients (e.g. OpenOCD's
//! VexRiscv target driver) to the relay server.
//!
//! A request is 10 bytes:
//!
//! ```text
//! +------+-------+-----------------+-----------------+
//! | op   | width | address (u32le) | data (u32le)    |
//! +------+-------+-----------------+-----------------+
//! ```
//!
//! Only reads are answered, with a 4-byte little-endian value.
use crate::error::RelayError;

pub const REQUEST_LEN: usize = 10;
pub const REPLY_LEN: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    const CODE_READ: u8 = 0;
    const CODE_WRITE: u8 = 1;

    pub fn code(&self) -> u8 {
        match self {
            Operation::Read => Self::CODE_READ,
            Operation::Write => Self::CODE_WRITE,
        }
    }

    pub fn from_code(code: u8) -> Result<Operation, RelayError> {
        match code {
            Self::CODE_READ => Ok(Operation::Read),
            Self::CODE_WRITE => Ok(Operation::Write),
            other => Err(RelayError::InvalidOperation(other)),
        }
    }
}

/// Access width of a relay request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Width {
    Bits8,
    Bits16,
    Bits32,
}

impl Width {
    pub fn code(&self) -> u8 {
        match self {
            Width::Bits8 => 0,
            Width::Bits16 => 1,
            Width::Bits32 => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Width, RelayError> {
        match code {
            0 => Ok(Width::Bits8),
            1 => Ok(Width::Bits16),
            2 => Ok(Width::Bits32),
            other => Err(RelayError::InvalidWidth(other)),
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            Width::Bits8 => 8,
            Width::Bits16 => 16,
            Width::Bits32 => 32,
        }
    }

    /// Mask selecting the bits covered by this width.
    pub fn mask(&self) -> u32 {
        match self {
            Width::Bits8 => 0xff,
            Width::Bits16 => 0xffff,
            Width::Bits32 => 0xffff_ffff,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RelayRequest {
    pub operation: Operation,
    pub width: Width,
    pub address: u32,
    /// Only meaningful for writes.
    pub data: u32,
}

impl RelayRequest {
    pub fn read(width: Width, address: u32) -> RelayRequest {
        RelayRequest {
            operation: Operation::Read,
            width,
            address,
            data: 0,
        }
    }

    pub fn write(width: Width, address: u32, data: u32) -> RelayRequest {
        RelayRequest {
            operation: Operation::Write,
            width,
            address,
            data,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<RelayRequest, RelayError> {
        if bytes.len() != REQUEST_LEN {
            return Err(RelayError::UnexpectedLength {
                expected: REQUEST_LEN,
                got: bytes.len(),
            });
        }
        Ok(RelayRequest {
            operation: Operation::from_code(bytes[0])?,
            width: Width::from_code(bytes[1])?,
            address: u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
            data: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; REQUEST_LEN] {
        let mut buf = [0u8; REQUEST_LEN];
        buf[0] = self.operation.code();
        buf[1] = self.width.code();
        buf[2..6].copy_from_slice(&self.address.to_le_bytes());
        buf[6..].copy_from_slice(&self.data.to_le_bytes());
        buf
    }
}

pub fn encode_reply(value: u32) -> [u8; REPLY_LEN] {
    value.to_le_bytes()
}

pub fn decode_reply(bytes: [u8; REPLY_LEN]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// A register of the CPU debug interface.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DebugRegister {
    Core,
    Data,
}

impl DebugRegister {
    /// Offset of the register inside the debug window.
    pub fn offset(&self) -> u32 {
        match self {
            DebugRegister::Core => 0,
            DebugRegister::Data => 4,
        }
    }
}

impl TryFrom<u32> for DebugRegister {
    type Error = RelayError;

    fn try_from(offset: u32) -> Result<Self, Self::Error> {
        match offset {
            0 => Ok(DebugRegister::Core),
            4 => Ok(DebugRegister::Data),
            other => Err(RelayError::InvalidDebugRegister(other)),
        }
    }
}

/// The address range that clients use to reach the debug interface.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebugWindow {
    base: u32,
}

impl DebugWindow {
    pub const DEFAULT_BASE: u32 = 0xf00f_0000;
    pub const SIZE: u32 = 8;

    pub fn new(base: u32) -> DebugWindow {
        DebugWindow { base }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn contains(&self, address: u32) -> bool {
        address >= self.base && address - self.base < Self::SIZE
    }

    /// Offset of `address` inside the window, if it falls into it.
    pub fn offset(&self, address: u32) -> Option<u32> {
        self.contains(address).then(|| address - self.base)
    }
}

impl Default for DebugWindow {
    fn default() -> Self {
        DebugWindow::new(Self::DEFAULT_BASE)
    }
}
