//! # VexRiscv Etherbone Bridge
//!
//! Command line front end for SoCs whose Wishbone bus is reachable over Etherbone.
//!
//! ## Overview
//!
//! - `relay`: runs the debug relay, so that a debugger (e.g. OpenOCD's VexRiscv target)
//!   can reach the CPU debug interface and the bus.
//! - `devmem`: reads a register, or writes one and reads it back.
//! - `probe`: checks that an Etherbone device answers.
//! - `temperature`: reads the XADC die temperature.
//!
//! Register names are resolved from the `csr.csv` the SoC build produces.
pub mod backends;

use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use clap_num::maybe_hex;
use env_logger::Env;
use etherbone_client::{
    Bus, CommandDebugBus, Connection, Csr, CsrMap, CsrWidth, DebugAccess, DebugBus,
    DebugBusConfig, Protocol, Transport, TransportConfig, csr_map::parse_u32,
};
use etherbone_protocol::relay::DebugWindow;
use etherbone_server::server::Builder;

use crate::backends::etherbone::EtherboneBackend;

const DEFAULT_COUNTER_PREFIX: &str = "vexriscv_debug";
const DEFAULT_COMMAND_PREFIX: &str = "cpu_or_bridge";
const XADC_TEMPERATURE: &str = "xadc_temperature";

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum TransportKind {
    Udp,
    Tcp,
}

impl From<TransportKind> for Protocol {
    fn from(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Udp => Protocol::Udp,
            TransportKind::Tcp => Protocol::Tcp,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum DebugProtocol {
    /// Backing registers, sync trigger and packet counter
    Counter,
    /// cmd_valid / cmd_ready handshake
    Command,
}

#[derive(clap::Args, Eq, PartialEq, Clone, Debug)]
struct RelayArgs {
    #[arg(short, long, default_value = "127.0.0.1")]
    ip: IpAddr,

    #[arg(short, long, default_value = "7893")]
    port: u16,

    #[arg(long, default_value = "0xf00f0000", value_parser = maybe_hex::<u32>)]
    debug_base: u32,

    #[arg(long, value_enum, default_value = "counter")]
    debug_protocol: DebugProtocol,

    #[arg(long, help = "Name prefix of the debug bus registers in the CSR map")]
    prefix: Option<String>,

    #[arg(
        long,
        help = "Debug handshake timeout in milliseconds, 0 waits forever",
        default_value = "1000"
    )]
    poll_timeout_ms: u64,
}

#[derive(Parser, Eq, PartialEq, Clone, Debug)]
enum Command {
    /// Relay debugger connections to the CPU debug interface
    Relay(RelayArgs),
    /// Read a register, or write it and read it back
    Devmem {
        #[arg(help = "Address or register name from the CSR map")]
        address: String,

        #[arg(value_parser = maybe_hex::<u32>)]
        value: Option<u32>,
    },
    /// Send an Etherbone probe
    Probe,
    /// Read the XADC die temperature
    Temperature {
        #[arg(long, value_parser = maybe_hex::<u32>)]
        address: Option<u32>,
    },
}

#[derive(Parser, Debug)]
#[command(about = "Etherbone bridge to VexRiscv SoCs", long_about=None)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    target: String,

    #[arg(short, long, default_value = "1234")]
    port: u16,

    #[arg(long, value_enum, default_value = "udp")]
    protocol: TransportKind,

    #[arg(long, help = "Local UDP port for replies, defaults to the remote port")]
    local_port: Option<u16>,

    #[arg(long, default_value = "8", value_parser = parse_csr_width)]
    csr_width: CsrWidth,

    #[arg(long)]
    csr_csv: Option<PathBuf>,

    #[arg(
        long,
        help = "Socket timeout in milliseconds, 0 waits forever",
        default_value = "1000"
    )]
    timeout_ms: u64,

    #[clap(subcommand)]
    command: Command,
}

fn parse_csr_width(value: &str) -> Result<CsrWidth, String> {
    let bits: u32 = value.parse().map_err(|e| format!("{}", e))?;
    CsrWidth::from_bits(bits).ok_or_else(|| format!("unsupported CSR width {}, use 8 or 32", bits))
}

/// `0` disables a timeout.
fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Resolves a numeric address or a register name.
fn resolve_address(map: Option<&CsrMap>, name: &str) -> Result<u32, Box<dyn Error>> {
    if let Ok(address) = parse_u32(name) {
        return Ok(address);
    }
    match map {
        Some(map) => Ok(map.require(name)?),
        None => Err(format!("{} is not a number and no CSR map was given", name).into()),
    }
}

/// XADC temperature transfer function.
fn xadc_celsius(raw: u16) -> f64 {
    f64::from(raw) * 503.975 / 4096.0 - 273.15
}

/// Peeks or pokes one native 32-bit word, regardless of the CSR width.
fn devmem<T: Transport>(
    bus: &mut Bus<T>,
    address: u32,
    value: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    match value {
        Some(value) => {
            let old = bus.read(address)?;
            bus.write(address, value)?;
            let new = bus.read(address)?;
            println!(
                "0x{:08x} 0x{:08x} -> 0x{:08x} (wanted: 0x{:08x})",
                address, old, new, value
            );
        }
        None => println!("0x{:08x}: 0x{:08x}", address, bus.read(address)?),
    }
    Ok(())
}

fn relay(
    mut csr: Csr<Connection>,
    map: Option<&CsrMap>,
    args: RelayArgs,
) -> Result<(), Box<dyn Error>> {
    let RelayArgs {
        ip,
        port,
        debug_base,
        debug_protocol,
        prefix,
        poll_timeout_ms,
    } = args;
    let map = map.ok_or("The relay needs the register map, pass --csr-csv")?;
    let config = DebugBusConfig {
        poll_timeout: timeout_from_ms(poll_timeout_ms),
    };
    log::debug!("Debug bus config: {:?}", config);

    let debug: Box<dyn DebugAccess<Connection>> = match debug_protocol {
        DebugProtocol::Counter => {
            let prefix = prefix.as_deref().unwrap_or(DEFAULT_COUNTER_PREFIX);
            let registers = map.counter_sync_map(prefix)?;
            log::info!("Using counter-synchronized debug bus {:x?}", registers);
            Box::new(DebugBus::connect(&mut csr, registers, config)?)
        }
        DebugProtocol::Command => {
            let prefix = prefix.as_deref().unwrap_or(DEFAULT_COMMAND_PREFIX);
            let registers = map.command_map(prefix)?;
            log::info!("Using command debug bus {:x?}", registers);
            Box::new(CommandDebugBus::new(registers, config))
        }
    };

    if debug_base != DebugWindow::DEFAULT_BASE {
        log::info!("Debug window moved to {:08x}", debug_base);
    }
    let addr = SocketAddr::new(ip, port);
    log::info!("Binding to address: {}", addr);
    let mut server = Builder::new()
        .debug_window_base(debug_base)
        .build(EtherboneBackend::new(csr, debug));
    server.listen(addr)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::debug!("Parsed arguments: {:?}", args);

    let map = match &args.csr_csv {
        Some(path) => Some(CsrMap::from_path(path)?),
        None => None,
    };

    let transport = TransportConfig {
        protocol: args.protocol.into(),
        local_port: args.local_port,
        timeout: timeout_from_ms(args.timeout_ms),
    };
    log::info!("Connecting to Etherbone bridge @ {}:{}", args.target, args.port);
    let connection = Connection::connect(&args.target, args.port, &transport)?;
    log::debug!(
        "Bus traffic {} <-> {}",
        connection.local_addr()?,
        connection.peer_addr()
    );
    let mut csr = Csr::new(Bus::new(connection), args.csr_width);

    match args.command {
        Command::Probe => {
            csr.bus_mut().probe()?;
            println!("{}:{} is an Etherbone device", args.target, args.port);
        }
        Command::Devmem { address, value } => {
            let address = resolve_address(map.as_ref(), &address)?;
            devmem(csr.bus_mut(), address, value)?;
        }
        Command::Temperature { address } => {
            let address = match address {
                Some(address) => address,
                None => resolve_address(map.as_ref(), XADC_TEMPERATURE)?,
            };
            let raw = csr.read16(address)?;
            println!("Temperature: {:.2} (0x{:04x})", xadc_celsius(raw), raw);
        }
        Command::Relay(relay_args) => relay(csr, map.as_ref(), relay_args)?,
    }
    Ok(())
}
