//! Symbolic register names, loaded from the `csr.csv` file LiteX generates with a design.
//!
//! Rows look like
//!
//! ```text
//! csr_base,ctrl,0xe0000000,,
//! csr_register,ctrl_reset,0xe0000000,1,rw
//! memory_region,sram,0x10000000,8192,cached
//! ```
//!
//! `csr_base`, `csr_register` and `memory_region` rows are recorded by lowercase name. A
//! register spanning several subregisters is also recorded as `<name>N .. <name>0`, where
//! `<name>0` is the least significant subregister. Anything else (constants, comments) is
//! skipped.
use std::{collections::HashMap, fs::File, io::Read, path::Path};

use crate::{
    debug_bus::{CommandMap, CounterSyncMap},
    error::ConfigError,
};

/// Largest subregister count accepted for one `csr_register` row.
pub const MAX_SUBREGISTERS: u32 = 64;

#[derive(Debug, Clone, Default)]
pub struct CsrMap {
    registers: HashMap<String, u32>,
}

impl CsrMap {
    pub fn new() -> CsrMap {
        CsrMap::default()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<CsrMap, ConfigError> {
        let path = path.as_ref();
        log::debug!("Loading register map from {}", path.display());
        let map = CsrMap::from_reader(File::open(path)?)?;
        log::info!(
            "Loaded {} registers from {}",
            map.registers.len(),
            path.display()
        );
        Ok(map)
    }

    pub fn from_reader(reader: impl Read) -> Result<CsrMap, ConfigError> {
        let mut map = CsrMap::new();
        let mut rows = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);
        for row in rows.records() {
            let row = row?;
            let kind = row.get(0).unwrap_or_default();
            if !matches!(kind, "csr_base" | "csr_register" | "memory_region") {
                continue;
            }
            let (Some(name), Some(address)) = (row.get(1), row.get(2)) else {
                return Err(malformed(&row));
            };
            if name.is_empty() {
                return Err(malformed(&row));
            }
            let address = parse_u32(address)?;
            map.insert(name, address);

            // Multi-byte CSRs also get one name per subregister, most significant first.
            let size = match row.get(3) {
                Some(size) if kind == "csr_register" && !size.is_empty() => parse_u32(size)?,
                _ => 1,
            };
            if size > MAX_SUBREGISTERS {
                return Err(malformed(&row));
            }
            if size > 1 {
                for index in 0..size {
                    let subregister = format!("{}{}", name, size - index - 1);
                    map.insert(&subregister, address.wrapping_add(index * 4));
                }
            }
        }
        Ok(map)
    }

    pub fn insert(&mut self, name: &str, address: u32) {
        self.registers.insert(name.to_lowercase(), address);
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.registers.get(&name.to_lowercase()).copied()
    }

    pub fn require(&self, name: &str) -> Result<u32, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::MissingRegister(name.to_lowercase()))
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Registers of the counter-synchronized debug bus below `prefix`:
    /// `<prefix>_core`, `<prefix>_data`, `<prefix>_refresh` and `<prefix>_packet_counter`.
    pub fn counter_sync_map(&self, prefix: &str) -> Result<CounterSyncMap, ConfigError> {
        Ok(CounterSyncMap {
            core: self.require(&format!("{}_core", prefix))?,
            data: self.require(&format!("{}_data", prefix))?,
            sync_trigger: self.require(&format!("{}_refresh", prefix))?,
            packet_counter: self.require(&format!("{}_packet_counter", prefix))?,
        })
    }

    /// Registers of the command/response debug bus, e.g. `cpu_or_bridge_i_debug_bus_cmd_valid`.
    pub fn command_map(&self, prefix: &str) -> Result<CommandMap, ConfigError> {
        Ok(CommandMap {
            control_valid: self.require(&format!("{}_i_debug_bus_cmd_valid", prefix))?,
            payload_write: self.require(&format!("{}_i_debug_bus_cmd_payload_wr", prefix))?,
            payload_address: self
                .require(&format!("{}_i_debug_bus_cmd_payload_address", prefix))?,
            payload_data: self.require(&format!("{}_i_debug_bus_cmd_payload_data", prefix))?,
            control_ready: self.require(&format!("{}_o_debug_bus_cmd_ready", prefix))?,
            response_data: self.require(&format!("{}_o_debug_bus_rsp_data", prefix))?,
        })
    }
}

fn malformed(row: &csv::StringRecord) -> ConfigError {
    ConfigError::Malformed {
        line: row.position().map_or(0, |p| p.line()),
        content: row.iter().collect::<Vec<_>>().join(","),
    }
}

/// Parses decimal, `0x` hexadecimal or `0b` binary numbers.
pub fn parse_u32(value: &str) -> Result<u32, ConfigError> {
    let (digits, radix) = if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        (hex, 16)
    } else if let Some(bin) = value
        .strip_prefix("0b")
        .or_else(|| value.strip_prefix("0B"))
    {
        (bin, 2)
    } else {
        (value, 10)
    };
    u32::from_str_radix(digits, radix)
        .map_err(|e| ConfigError::InvalidNumber(format!("{} ({})", value, e)))
}
