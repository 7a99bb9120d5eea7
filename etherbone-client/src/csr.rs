//! Register access at any width on top of the native CSR width of the bus.
//!
//! LiteX designs expose CSRs either as 8-bit subregisters spaced 4 bytes apart or as plain
//! 32-bit words. [`Csr`] hides the difference behind 8/16/32/64-bit accessors.
//!
//! ## Byte-native buses
//!
//! An N-byte access becomes N single-byte transactions at `a, a+4, a+8, …`. The most
//! significant byte lives at the lowest address, which is the order LiteX uses for
//! multi-subregister CSRs and the one the C `wb_write32` helpers have always produced. It is
//! not little-endian assembly.
//!
//! ## Word-native buses
//!
//! 32-bit accesses are a single transaction. 8 and 16-bit reads return the low bits of a
//! full word. 8 and 16-bit writes store the zero-extended value into the full word: the
//! upper bits of the register are overwritten, not preserved. This differs from
//! byte-native buses, where a narrow write only touches its own subregisters.
//! 64-bit accesses are two words, high word first.
use etherbone_protocol::relay::Width;

use crate::{bus::Bus, error::BusError, transport::Transport};

/// Distance between two consecutive subregisters.
const SUBREGISTER_STRIDE: u32 = 4;

/// The access granularity the bus natively supports.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CsrWidth {
    /// 8-bit subregisters, 4 bytes apart.
    #[default]
    Byte,
    /// 32-bit registers.
    Word,
}

impl CsrWidth {
    /// Maps a LiteX `csr_data_width` to a native width.
    pub fn from_bits(bits: u32) -> Option<CsrWidth> {
        match bits {
            8 => Some(CsrWidth::Byte),
            32 => Some(CsrWidth::Word),
            _ => None,
        }
    }
}

pub struct Csr<T: Transport> {
    bus: Bus<T>,
    width: CsrWidth,
}

impl<T: Transport> Csr<T> {
    pub fn new(bus: Bus<T>, width: CsrWidth) -> Csr<T> {
        log::debug!("CSR access with native width {:?}", width);
        Csr { bus, width }
    }

    pub fn width(&self) -> CsrWidth {
        self.width
    }

    pub fn bus(&self) -> &Bus<T> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus<T> {
        &mut self.bus
    }

    /// Reads `bytes` consecutive subregisters, most significant first.
    fn read_subregisters(&mut self, address: u32, bytes: u32) -> Result<u64, BusError> {
        let mut value = 0u64;
        for i in 0..bytes {
            let byte = self.bus.read(subregister(address, i))? & 0xff;
            value = (value << 8) | u64::from(byte);
        }
        Ok(value)
    }

    fn write_subregisters(&mut self, address: u32, bytes: u32, value: u64) -> Result<(), BusError> {
        for i in 0..bytes {
            let byte = (value >> ((bytes - 1 - i) * 8)) & 0xff;
            self.bus.write(subregister(address, i), byte as u32)?;
        }
        Ok(())
    }

    pub fn read8(&mut self, address: u32) -> Result<u8, BusError> {
        let value = match self.width {
            CsrWidth::Byte => self.read_subregisters(address, 1)?,
            CsrWidth::Word => u64::from(self.bus.read(address)?),
        };
        Ok((value & 0xff) as u8)
    }

    pub fn read16(&mut self, address: u32) -> Result<u16, BusError> {
        let value = match self.width {
            CsrWidth::Byte => self.read_subregisters(address, 2)?,
            CsrWidth::Word => u64::from(self.bus.read(address)?),
        };
        Ok((value & 0xffff) as u16)
    }

    pub fn read32(&mut self, address: u32) -> Result<u32, BusError> {
        match self.width {
            CsrWidth::Byte => Ok(self.read_subregisters(address, 4)? as u32),
            CsrWidth::Word => self.bus.read(address),
        }
    }

    pub fn read64(&mut self, address: u32) -> Result<u64, BusError> {
        match self.width {
            CsrWidth::Byte => self.read_subregisters(address, 8),
            CsrWidth::Word => {
                let high = self.bus.read(address)?;
                let low = self.bus.read(address.wrapping_add(SUBREGISTER_STRIDE))?;
                Ok((u64::from(high) << 32) | u64::from(low))
            }
        }
    }

    pub fn write8(&mut self, address: u32, value: u8) -> Result<(), BusError> {
        match self.width {
            CsrWidth::Byte => self.write_subregisters(address, 1, u64::from(value)),
            CsrWidth::Word => self.bus.write(address, u32::from(value)),
        }
    }

    pub fn write16(&mut self, address: u32, value: u16) -> Result<(), BusError> {
        match self.width {
            CsrWidth::Byte => self.write_subregisters(address, 2, u64::from(value)),
            CsrWidth::Word => self.bus.write(address, u32::from(value)),
        }
    }

    pub fn write32(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        match self.width {
            CsrWidth::Byte => self.write_subregisters(address, 4, u64::from(value)),
            CsrWidth::Word => self.bus.write(address, value),
        }
    }

    pub fn write64(&mut self, address: u32, value: u64) -> Result<(), BusError> {
        match self.width {
            CsrWidth::Byte => self.write_subregisters(address, 8, value),
            CsrWidth::Word => {
                self.bus.write(address, (value >> 32) as u32)?;
                self.bus
                    .write(address.wrapping_add(SUBREGISTER_STRIDE), value as u32)
            }
        }
    }

    /// Reads at a relay request width, zero-extended to 32 bits.
    pub fn read(&mut self, width: Width, address: u32) -> Result<u32, BusError> {
        match width {
            Width::Bits8 => self.read8(address).map(u32::from),
            Width::Bits16 => self.read16(address).map(u32::from),
            Width::Bits32 => self.read32(address),
        }
    }

    /// Writes the low `width` bits of `value`.
    pub fn write(&mut self, width: Width, address: u32, value: u32) -> Result<(), BusError> {
        match width {
            Width::Bits8 => self.write8(address, (value & 0xff) as u8),
            Width::Bits16 => self.write16(address, (value & 0xffff) as u16),
            Width::Bits32 => self.write32(address, value),
        }
    }
}

fn subregister(address: u32, index: u32) -> u32 {
    address.wrapping_add(index * SUBREGISTER_STRIDE)
}
