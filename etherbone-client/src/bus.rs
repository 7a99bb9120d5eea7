use etherbone_protocol::{error::ProtocolError, packet};

use crate::{error::BusError, transport::Transport};

/// Value returned for a read whose reply had the wrong size.
pub const BEST_EFFORT_VALUE: u32 = 0xffff_ffff;

/// Receive buffer size. Larger than a packet, so that oversized replies are detected.
const RECV_BUFFER_LEN: usize = 64;

/// Native 32-bit bus access, one Etherbone transaction per call.
pub struct Bus<T: Transport> {
    transport: T,
}

impl<T: Transport> Bus<T> {
    pub fn new(transport: T) -> Bus<T> {
        Bus { transport }
    }

    /// Reads the 32-bit word at `address`.
    ///
    /// A reply of unexpected size is logged as [`ProtocolError::UnexpectedLength`] and
    /// [`BEST_EFFORT_VALUE`] is returned instead of failing the call.
    pub fn read(&mut self, address: u32) -> Result<u32, BusError> {
        self.transport.send(&packet::encode_read(address))?;
        let mut buf = [0u8; RECV_BUFFER_LEN];
        let count = self.transport.recv(&mut buf)?;
        match packet::decode_reply(&buf[..count]) {
            Ok(value) => {
                log::trace!("PEEK @ {:08x} = {:08x}", address, value);
                Ok(value)
            }
            Err(e @ ProtocolError::UnexpectedLength { .. }) => {
                log::error!("Read of {:08x}: {}", address, e);
                Ok(BEST_EFFORT_VALUE)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `value` to `address`. Writes are not acknowledged by the bus.
    pub fn write(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        log::trace!("POKE @ {:08x} -> {:08x}", address, value);
        self.transport.send(&packet::encode_write(address, value))?;
        Ok(())
    }

    /// Sends a probe and checks that the remote end answers like an Etherbone device.
    pub fn probe(&mut self) -> Result<(), BusError> {
        self.transport.send(&packet::encode_probe())?;
        let mut buf = [0u8; packet::HEADER_LEN];
        let count = self.transport.recv(&mut buf)?;
        packet::decode_probe_reply(&buf[..count])?;
        log::debug!("Probe answered with {} bytes", count);
        Ok(())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}
