use std::{
    error::Error,
    fmt::Display,
    io::{self},
    time::Duration,
};

use etherbone_protocol::error::ProtocolError;

/// Errors that prevent a connection to the bridge from being opened.
#[derive(Debug)]
pub enum ConnectionError {
    /// The remote host could not be resolved to a socket address.
    Resolve { host: String, reason: String },
    IoError(io::Error),
}

impl From<io::Error> for ConnectionError {
    fn from(value: io::Error) -> Self {
        ConnectionError::IoError(value)
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Resolve { host, reason } => {
                write!(f, "Failed to resolve remote address {}: {}", host, reason)
            }
            ConnectionError::IoError(error) => write!(f, "{}", error),
        }
    }
}

impl Error for ConnectionError {}

/// Errors of a single bus transaction.
#[derive(Debug)]
pub enum BusError {
    IoError(io::Error),
    Protocol(ProtocolError),
}

impl From<io::Error> for BusError {
    fn from(value: io::Error) -> Self {
        BusError::IoError(value)
    }
}

impl From<ProtocolError> for BusError {
    fn from(value: ProtocolError) -> Self {
        BusError::Protocol(value)
    }
}

impl Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::IoError(error) => write!(f, "{}", error),
            BusError::Protocol(error) => write!(f, "{}", error),
        }
    }
}

impl Error for BusError {}

/// Errors of a debug bus transaction.
#[derive(Debug)]
pub enum DebugBusError {
    Bus(BusError),
    /// The offset does not name a debug register.
    InvalidRegister(u32),
    /// The packet counter did not move while waiting for the handshake.
    Timeout(Duration),
}

impl From<BusError> for DebugBusError {
    fn from(value: BusError) -> Self {
        DebugBusError::Bus(value)
    }
}

impl Display for DebugBusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebugBusError::Bus(error) => write!(f, "{}", error),
            DebugBusError::InvalidRegister(offset) => {
                write!(f, "No debug register at offset {:#x}", offset)
            }
            DebugBusError::Timeout(waited) => {
                write!(f, "Debug bus handshake timed out after {:?}", waited)
            }
        }
    }
}

impl Error for DebugBusError {}

/// Errors while loading a register map.
#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    Csv(csv::Error),
    InvalidNumber(String),
    /// A line of the map did not have the expected columns.
    Malformed { line: u64, content: String },
    MissingRegister(String),
}

impl From<io::Error> for ConfigError {
    fn from(value: io::Error) -> Self {
        ConfigError::IoError(value)
    }
}

impl From<csv::Error> for ConfigError {
    fn from(value: csv::Error) -> Self {
        ConfigError::Csv(value)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(error) => write!(f, "{}", error),
            ConfigError::Csv(error) => write!(f, "{}", error),
            ConfigError::InvalidNumber(number) => write!(f, "Invalid number: {}", number),
            ConfigError::Malformed { line, content } => {
                write!(f, "Malformed register map entry on line {}: {}", line, content)
            }
            ConfigError::MissingRegister(name) => {
                write!(f, "Register {} is not present in the register map", name)
            }
        }
    }
}

impl Error for ConfigError {}
