use std::{net::TcpListener, thread};

use etherbone_client::{
    Bus, Connection, Csr, CsrWidth, DebugAccess, DebugBus, DebugBusConfig, TransportConfig,
    debug_bus::CounterSyncMap,
};
use etherbone_protocol::relay::{DebugRegister, DebugWindow, RelayRequest, Width};
use etherbone_protocol::tokio_codec::RelayClientCodec;
use etherbone_server::{RelayBackend, server::Builder};
use etherbone_tests::{Memory, UdpDevice};
use futures::{SinkExt, StreamExt};
use tokio_util::codec::Framed;

const DEBUG_MAP: CounterSyncMap = CounterSyncMap {
    core: 0xe000_f000,
    data: 0xe000_f004,
    sync_trigger: 0xe000_f008,
    packet_counter: 0xe000_f00c,
};

/// Bus and debug bus of a UDP device.
struct DeviceBackend {
    csr: Csr<Connection>,
    debug: DebugBus,
}

impl RelayBackend for DeviceBackend {
    fn read(&mut self, width: Width, address: u32) -> u32 {
        self.csr.read(width, address).unwrap_or(u32::MAX)
    }

    fn write(&mut self, width: Width, address: u32, value: u32) {
        self.csr.write(width, address, value).unwrap();
    }

    fn debug_read(&mut self, offset: u32) -> u32 {
        self.debug
            .debug_read_offset(&mut self.csr, offset)
            .unwrap_or(u32::MAX)
    }

    fn debug_write(&mut self, offset: u32, value: u32) {
        self.debug
            .debug_write_offset(&mut self.csr, offset, value)
            .unwrap();
    }
}

fn backend(device: &UdpDevice) -> DeviceBackend {
    let config = TransportConfig {
        local_port: Some(0),
        ..TransportConfig::default()
    };
    let connection = Connection::connect("127.0.0.1", device.port(), &config).unwrap();
    let mut csr = Csr::new(Bus::new(connection), CsrWidth::Word);
    let debug = DebugBus::connect(&mut csr, DEBUG_MAP, DebugBusConfig::default()).unwrap();
    DeviceBackend { csr, debug }
}

#[tokio::test(flavor = "multi_thread")]
async fn debugger_session_through_relay() {
    let device = UdpDevice::spawn(Memory::with_debug_bus(DEBUG_MAP)).unwrap();
    device
        .memory()
        .set_cpu_register(DebugRegister::Core, 0x0001_0000);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut server = Builder::new().build(backend(&device));
    let relay = thread::spawn(move || {
        let (mut tcp, _) = listener.accept().unwrap();
        server.handle_session(&mut tcp).unwrap();
        server
    });

    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let mut client = Framed::new(stream, RelayClientCodec);
    let base = DebugWindow::DEFAULT_BASE;

    client
        .send(RelayRequest::read(Width::Bits32, base))
        .await
        .unwrap();
    assert_eq!(client.next().await.unwrap().unwrap(), 0x0001_0000);

    client
        .send(RelayRequest::write(Width::Bits32, base + 4, 0x1234_5678))
        .await
        .unwrap();
    client
        .send(RelayRequest::read(Width::Bits32, base + 4))
        .await
        .unwrap();
    assert_eq!(client.next().await.unwrap().unwrap(), 0x1234_5678);

    client
        .send(RelayRequest::write(Width::Bits32, 0x1000_0000, 0xcafe_babe))
        .await
        .unwrap();
    client
        .send(RelayRequest::read(Width::Bits16, 0x1000_0000))
        .await
        .unwrap();
    assert_eq!(client.next().await.unwrap().unwrap(), 0xbabe);

    drop(client);
    let server = relay.join().unwrap();
    assert_eq!(server.backend().debug.consistency_warnings(), 0);
    assert_eq!(server.backend().debug.last_counter(), 3);

    let memory = device.memory();
    assert_eq!(memory.cpu_register(DebugRegister::Data), Some(0x1234_5678));
    assert_eq!(memory.word(0x1000_0000), 0xcafe_babe);
    // Plain accesses never reach the CPU registers.
    assert_eq!(memory.cpu_register(DebugRegister::Core), Some(0x0001_0000));
}
