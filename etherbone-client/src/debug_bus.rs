//! Access to the VexRiscv debug bus through ordinary CSR operations.
//!
//! The debug interface of the CPU runs in a slower clock domain than the main bus and is not
//! directly addressable. It exposes two registers, `CORE` and `DATA`, which are reached
//! through a handshake with a bridge block on the main bus.
//!
//! Two bridge flavours exist:
//!
//! - [`DebugBus`]: backing registers plus a sync trigger and a free-running packet counter.
//!   The counter steps once per debug transaction, which both completes the handshake and
//!   reveals transactions lost in transit.
//! - [`CommandDebugBus`]: the older command/response block with `cmd_valid` and `cmd_ready`.
//!
//! Neither type owns the bus. The [`Csr`] that carries the transactions is passed to every
//! call, so the caller decides who owns the connection.
use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use etherbone_protocol::relay::DebugRegister;

use crate::{
    csr::Csr,
    error::{BusError, DebugBusError},
    transport::Transport,
};

/// A debug bus bridge.
pub trait DebugAccess<T: Transport> {
    fn debug_read(
        &mut self,
        csr: &mut Csr<T>,
        register: DebugRegister,
    ) -> Result<u32, DebugBusError>;

    fn debug_write(
        &mut self,
        csr: &mut Csr<T>,
        register: DebugRegister,
        value: u32,
    ) -> Result<(), DebugBusError>;

    /// Reads the debug register at `offset` (0 for `CORE`, 4 for `DATA`).
    fn debug_read_offset(&mut self, csr: &mut Csr<T>, offset: u32) -> Result<u32, DebugBusError> {
        let register = register_at(offset)?;
        self.debug_read(csr, register)
    }

    fn debug_write_offset(
        &mut self,
        csr: &mut Csr<T>,
        offset: u32,
        value: u32,
    ) -> Result<(), DebugBusError> {
        let register = register_at(offset)?;
        self.debug_write(csr, register, value)
    }
}

fn register_at(offset: u32) -> Result<DebugRegister, DebugBusError> {
    DebugRegister::try_from(offset).map_err(|_| DebugBusError::InvalidRegister(offset))
}

#[derive(Debug, Clone)]
pub struct DebugBusConfig {
    /// How long to wait for the handshake to complete. `None` waits forever.
    pub poll_timeout: Option<Duration>,
}

impl Default for DebugBusConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Some(Duration::from_secs(1)),
        }
    }
}

/// Bus addresses of the counter-synchronized bridge.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CounterSyncMap {
    pub core: u32,
    pub data: u32,
    pub sync_trigger: u32,
    pub packet_counter: u32,
}

/// Bus addresses of the command/response bridge.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CommandMap {
    pub control_valid: u32,
    pub payload_write: u32,
    pub payload_address: u32,
    pub payload_data: u32,
    pub control_ready: u32,
    pub response_data: u32,
}

/// The packet counter did not advance by exactly one between two debug transactions.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ConsistencyWarning {
    pub previous: u32,
    pub current: u32,
}

impl ConsistencyWarning {
    pub fn check(previous: u32, current: u32) -> Option<ConsistencyWarning> {
        (current.wrapping_sub(previous) != 1).then_some(ConsistencyWarning { previous, current })
    }
}

impl Display for ConsistencyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dropped packet: counter went from {} to {} (delta {})",
            self.previous,
            self.current,
            self.current.wrapping_sub(self.previous)
        )
    }
}

/// Counter-synchronized debug bus bridge.
///
/// Holds the last observed packet counter value.
#[derive(Debug)]
pub struct DebugBus {
    map: CounterSyncMap,
    config: DebugBusConfig,
    last_counter: u32,
    warnings: u64,
}

impl DebugBus {
    /// Seeds the counter state with one read of the packet counter.
    pub fn connect<T: Transport>(
        csr: &mut Csr<T>,
        map: CounterSyncMap,
        config: DebugBusConfig,
    ) -> Result<DebugBus, BusError> {
        let last_counter = csr.read32(map.packet_counter)?;
        log::debug!("Debug bus packet counter starts at {}", last_counter);
        Ok(DebugBus {
            map,
            config,
            last_counter,
            warnings: 0,
        })
    }

    pub fn last_counter(&self) -> u32 {
        self.last_counter
    }

    /// Number of consistency warnings raised so far.
    pub fn consistency_warnings(&self) -> u64 {
        self.warnings
    }

    fn backing_register(&self, register: DebugRegister) -> u32 {
        match register {
            DebugRegister::Core => self.map.core,
            DebugRegister::Data => self.map.data,
        }
    }

    /// Value written to the sync trigger to latch `register` into its backing register.
    fn trigger_code(register: DebugRegister) -> u8 {
        register.offset() as u8
    }

    fn record_counter(&mut self, current: u32) {
        if let Some(warning) = ConsistencyWarning::check(self.last_counter, current) {
            log::warn!("{}", warning);
            self.warnings += 1;
        }
        self.last_counter = current;
    }

    fn wait_for_counter<T: Transport>(
        &self,
        csr: &mut Csr<T>,
        initial: u32,
    ) -> Result<u32, DebugBusError> {
        let start = Instant::now();
        let mut polls = 0u32;
        loop {
            let counter = csr.read32(self.map.packet_counter)?;
            polls += 1;
            if counter != initial {
                log::trace!("Debug bus handshake completed after {} polls", polls);
                return Ok(counter);
            }
            if let Some(timeout) = self.config.poll_timeout
                && start.elapsed() >= timeout
            {
                log::error!(
                    "Debug bus counter stuck at {} after {} polls",
                    initial,
                    polls
                );
                return Err(DebugBusError::Timeout(start.elapsed()));
            }
        }
    }
}

impl<T: Transport> DebugAccess<T> for DebugBus {
    fn debug_read(
        &mut self,
        csr: &mut Csr<T>,
        register: DebugRegister,
    ) -> Result<u32, DebugBusError> {
        let initial = csr.read32(self.map.packet_counter)?;
        csr.write8(self.map.sync_trigger, Self::trigger_code(register))?;
        let counter = self.wait_for_counter(csr, initial)?;
        let value = csr.read32(self.backing_register(register))?;
        self.record_counter(counter);
        log::debug!("Debug read {:?} = {:08x}", register, value);
        Ok(value)
    }

    fn debug_write(
        &mut self,
        csr: &mut Csr<T>,
        register: DebugRegister,
        value: u32,
    ) -> Result<(), DebugBusError> {
        log::debug!("Debug write {:?} = {:08x}", register, value);
        csr.write32(self.backing_register(register), value)?;
        let counter = csr.read32(self.map.packet_counter)?;
        self.record_counter(counter);
        Ok(())
    }
}

/// Command/response debug bus bridge.
#[derive(Debug)]
pub struct CommandDebugBus {
    map: CommandMap,
    config: DebugBusConfig,
}

impl CommandDebugBus {
    pub fn new(map: CommandMap, config: DebugBusConfig) -> CommandDebugBus {
        CommandDebugBus { map, config }
    }

    fn issue<T: Transport>(
        &self,
        csr: &mut Csr<T>,
        register: DebugRegister,
        write: bool,
        value: u32,
    ) -> Result<(), BusError> {
        csr.write8(self.map.control_valid, 0)?;
        csr.write8(self.map.payload_write, u8::from(write))?;
        csr.write8(self.map.payload_address, register.offset() as u8)?;
        csr.write32(self.map.payload_data, value)?;
        // Flush the posted payload writes.
        csr.read32(self.map.payload_data)?;
        csr.write8(self.map.control_valid, 1)
    }
}

impl<T: Transport> DebugAccess<T> for CommandDebugBus {
    fn debug_read(
        &mut self,
        csr: &mut Csr<T>,
        register: DebugRegister,
    ) -> Result<u32, DebugBusError> {
        self.issue(csr, register, false, 0)?;
        let start = Instant::now();
        while csr.read8(self.map.control_ready)? & 1 == 0 {
            if let Some(timeout) = self.config.poll_timeout
                && start.elapsed() >= timeout
            {
                return Err(DebugBusError::Timeout(start.elapsed()));
            }
        }
        let value = csr.read32(self.map.response_data)?;
        log::debug!("Debug read {:?} = {:08x}", register, value);
        Ok(value)
    }

    fn debug_write(
        &mut self,
        csr: &mut Csr<T>,
        register: DebugRegister,
        value: u32,
    ) -> Result<(), DebugBusError> {
        log::debug!("Debug write {:?} = {:08x}", register, value);
        self.issue(csr, register, true, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{bus::Bus, csr::CsrWidth, testing::MemoryTransport};
    use etherbone_protocol::packet::Transaction;

    const MAP: CounterSyncMap = CounterSyncMap {
        core: 0x100,
        data: 0x110,
        sync_trigger: 0x120,
        packet_counter: 0x124,
    };

    /// Steps the packet counter on every debug transaction. The `n`-th transaction steps it
    /// by `step(n)`.
    fn target(
        initial_counter: u32,
        mut step: impl FnMut(u32) -> u32 + 'static,
    ) -> MemoryTransport {
        let mut transactions = 0u32;
        let mut transport = MemoryTransport::with_hook(move |transaction, memory| {
            if let Transaction::Write { address, .. } = *transaction
                && (address == MAP.core || address == MAP.data || address == MAP.sync_trigger)
            {
                transactions += 1;
                let counter = memory.entry(MAP.packet_counter).or_insert(0);
                *counter = counter.wrapping_add(step(transactions));
            }
        });
        transport
            .memory_mut()
            .insert(MAP.packet_counter, initial_counter);
        transport
    }

    fn connect(transport: MemoryTransport) -> (Csr<MemoryTransport>, DebugBus) {
        let mut csr = Csr::new(Bus::new(transport), CsrWidth::Word);
        let bus = DebugBus::connect(&mut csr, MAP, DebugBusConfig::default()).unwrap();
        (csr, bus)
    }

    #[test]
    fn seeds_counter_on_connect() {
        let (csr, bus) = connect(target(41, |_| 1));
        assert_eq!(bus.last_counter(), 41);
        assert_eq!(
            csr.bus().transport().transactions(),
            &[Transaction::Read {
                address: MAP.packet_counter
            }]
        );
    }

    #[test]
    fn steady_counter_raises_no_warning() {
        let (mut csr, mut bus) = connect(target(0xffff_fffd, |_| 1));
        for i in 0..4 {
            bus.debug_write(&mut csr, DebugRegister::Data, i).unwrap();
            csr.bus_mut()
                .transport_mut()
                .memory_mut()
                .insert(MAP.core, 0x1000 + i);
            assert_eq!(
                bus.debug_read(&mut csr, DebugRegister::Core).unwrap(),
                0x1000 + i
            );
        }
        assert_eq!(bus.consistency_warnings(), 0);
        assert_eq!(bus.last_counter(), 0xffff_fffd_u32.wrapping_add(8));
    }

    #[test]
    fn skipped_counter_raises_one_warning() {
        let (mut csr, mut bus) = connect(target(10, |n| if n == 3 { 2 } else { 1 }));
        for i in 0..5 {
            bus.debug_write(&mut csr, DebugRegister::Core, i).unwrap();
        }
        assert_eq!(bus.consistency_warnings(), 1);
        assert_eq!(bus.last_counter(), 16);
        assert_eq!(csr.bus().transport().memory().get(&MAP.core), Some(&4));
    }

    #[test]
    fn write_goes_to_backing_register() {
        let (mut csr, mut bus) = connect(target(0, |_| 1));
        bus.debug_write(&mut csr, DebugRegister::Data, 0xcafe_f00d)
            .unwrap();
        assert_eq!(
            &csr.bus().transport().transactions()[1..],
            &[
                Transaction::Write {
                    address: MAP.data,
                    value: 0xcafe_f00d
                },
                Transaction::Read {
                    address: MAP.packet_counter
                },
            ]
        );
    }

    #[test]
    fn read_triggers_sync_and_waits_for_counter() {
        let mut polls = 0u32;
        let mut transport = MemoryTransport::with_hook(move |transaction, memory| {
            // The counter only moves on the third poll after the trigger.
            match *transaction {
                Transaction::Write { address, .. } if address == MAP.sync_trigger => polls = 0,
                Transaction::Read { address } if address == MAP.packet_counter => {
                    polls += 1;
                    if polls == 3 {
                        memory.insert(MAP.packet_counter, 1);
                    }
                }
                _ => {}
            }
        });
        transport.memory_mut().insert(MAP.data, 0x1234_5678);
        // Seed read counts as poll 1, the initial read of debug_read as poll 2.
        let (mut csr, mut bus) = connect(transport);
        let value = bus.debug_read(&mut csr, DebugRegister::Data).unwrap();
        assert_eq!(value, 0x1234_5678);
        assert_eq!(bus.consistency_warnings(), 0);

        let transactions = csr.bus().transport().transactions();
        assert!(transactions.contains(&Transaction::Write {
            address: MAP.sync_trigger,
            value: 4
        }));
        assert_eq!(
            transactions.last(),
            Some(&Transaction::Read { address: MAP.data })
        );
    }

    #[test]
    fn stuck_counter_times_out() {
        let mut csr = Csr::new(Bus::new(MemoryTransport::default()), CsrWidth::Word);
        let config = DebugBusConfig {
            poll_timeout: Some(Duration::from_millis(20)),
        };
        let mut bus = DebugBus::connect(&mut csr, MAP, config).unwrap();
        match bus.debug_read(&mut csr, DebugRegister::Core) {
            Err(DebugBusError::Timeout(waited)) => assert!(waited >= Duration::from_millis(20)),
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[test]
    fn byte_native_bus() {
        // Counter least significant byte sits in the last of its four subregisters.
        let counter_low = MAP.packet_counter + 12;
        let transport = MemoryTransport::with_hook(move |transaction, memory| {
            if let Transaction::Write { address, .. } = *transaction
                && (address == MAP.core || address == MAP.sync_trigger)
            {
                *memory.entry(counter_low).or_insert(0) += 1;
            }
        });
        let mut csr = Csr::new(Bus::new(transport), CsrWidth::Byte);
        let mut bus = DebugBus::connect(&mut csr, MAP, DebugBusConfig::default()).unwrap();
        bus.debug_write(&mut csr, DebugRegister::Core, 0x0102_0304)
            .unwrap();
        assert_eq!(bus.consistency_warnings(), 0);
        assert_eq!(bus.last_counter(), 1);
        assert_eq!(csr.read32(MAP.core).unwrap(), 0x0102_0304);

        assert_eq!(bus.debug_read(&mut csr, DebugRegister::Core).unwrap(), 0x0102_0304);
        assert_eq!(bus.last_counter(), 2);
        assert!(csr.bus().transport().transactions().contains(&Transaction::Write {
            address: MAP.sync_trigger,
            value: 0
        }));
    }

    #[test]
    fn offsets_select_registers() {
        let (mut csr, mut bus) = connect(target(0, |_| 1));
        bus.debug_write_offset(&mut csr, 4, 0x55).unwrap();
        assert_eq!(csr.bus().transport().memory().get(&MAP.data), Some(&0x55));
        let sent = csr.bus().transport().sent_packets();
        assert!(matches!(
            bus.debug_read_offset(&mut csr, 8),
            Err(DebugBusError::InvalidRegister(8))
        ));
        assert!(matches!(
            bus.debug_write_offset(&mut csr, 2, 0),
            Err(DebugBusError::InvalidRegister(2))
        ));
        assert_eq!(csr.bus().transport().sent_packets(), sent);
    }

    #[test]
    fn consistency_check_wraps() {
        assert_eq!(ConsistencyWarning::check(u32::MAX, 0), None);
        assert_eq!(
            ConsistencyWarning::check(5, 5),
            Some(ConsistencyWarning {
                previous: 5,
                current: 5
            })
        );
    }

    const COMMAND_MAP: CommandMap = CommandMap {
        control_valid: 0x200,
        payload_write: 0x204,
        payload_address: 0x208,
        payload_data: 0x20c,
        control_ready: 0x210,
        response_data: 0x214,
    };
    const CPU_REGISTERS: u32 = 0x1000;

    fn command_target() -> MemoryTransport {
        MemoryTransport::with_hook(|transaction, memory| {
            if let Transaction::Write { address, value: 1 } = *transaction
                && address == COMMAND_MAP.control_valid
            {
                let target = CPU_REGISTERS + memory[&COMMAND_MAP.payload_address];
                if memory[&COMMAND_MAP.payload_write] == 1 {
                    let data = memory[&COMMAND_MAP.payload_data];
                    memory.insert(target, data);
                } else {
                    let data = memory.get(&target).copied().unwrap_or(0);
                    memory.insert(COMMAND_MAP.response_data, data);
                    memory.insert(COMMAND_MAP.control_ready, 1);
                }
            }
        })
    }

    #[test]
    fn command_bus_roundtrip() {
        let mut csr = Csr::new(Bus::new(command_target()), CsrWidth::Word);
        let mut bus = CommandDebugBus::new(COMMAND_MAP, DebugBusConfig::default());
        bus.debug_write(&mut csr, DebugRegister::Data, 0xabcd_0123)
            .unwrap();
        assert_eq!(
            csr.bus().transport().memory().get(&(CPU_REGISTERS + 4)),
            Some(&0xabcd_0123)
        );
        assert_eq!(
            bus.debug_read(&mut csr, DebugRegister::Data).unwrap(),
            0xabcd_0123
        );
    }

    #[test]
    fn command_bus_times_out_without_ready() {
        let mut csr = Csr::new(Bus::new(MemoryTransport::default()), CsrWidth::Word);
        let mut bus = CommandDebugBus::new(
            COMMAND_MAP,
            DebugBusConfig {
                poll_timeout: Some(Duration::from_millis(10)),
            },
        );
        assert!(matches!(
            bus.debug_read(&mut csr, DebugRegister::Core),
            Err(DebugBusError::Timeout(_))
        ));
    }
}
