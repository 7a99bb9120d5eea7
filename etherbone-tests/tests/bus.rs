use etherbone_client::{
    Bus, Connection, Csr, CsrWidth, DebugAccess, DebugBus, DebugBusConfig, Protocol,
    TransportConfig, debug_bus::CounterSyncMap,
};
use etherbone_protocol::relay::DebugRegister;
use etherbone_tests::{Memory, TcpDevice, UdpDevice};

const DEBUG_MAP: CounterSyncMap = CounterSyncMap {
    core: 0xe000_f000,
    data: 0xe000_f004,
    sync_trigger: 0xe000_f008,
    packet_counter: 0xe000_f00c,
};

fn udp_config() -> TransportConfig {
    TransportConfig {
        local_port: Some(0),
        ..TransportConfig::default()
    }
}

fn connect_udp(device: &UdpDevice, width: CsrWidth) -> Csr<Connection> {
    let connection = Connection::connect("127.0.0.1", device.port(), &udp_config()).unwrap();
    Csr::new(Bus::new(connection), width)
}

#[test]
fn udp_write_then_read() {
    let device = UdpDevice::spawn(Memory::default()).unwrap();
    let mut csr = connect_udp(&device, CsrWidth::Word);
    csr.write32(0x1000_0000, 0x1234_5678).unwrap();
    assert_eq!(csr.read32(0x1000_0000).unwrap(), 0x1234_5678);
    assert_eq!(device.memory().word(0x1000_0000), 0x1234_5678);
}

#[test]
fn udp_byte_native_subregisters() {
    let device = UdpDevice::spawn(Memory::default()).unwrap();
    let mut csr = connect_udp(&device, CsrWidth::Byte);
    csr.write32(0x1000_0000, 0x1234_5678).unwrap();
    assert_eq!(csr.read32(0x1000_0000).unwrap(), 0x1234_5678);

    let memory = device.memory();
    assert_eq!(memory.word(0x1000_0000), 0x12);
    assert_eq!(memory.word(0x1000_0004), 0x34);
    assert_eq!(memory.word(0x1000_0008), 0x56);
    assert_eq!(memory.word(0x1000_000c), 0x78);
}

#[test]
fn udp_probe() {
    let device = UdpDevice::spawn(Memory::default()).unwrap();
    let mut csr = connect_udp(&device, CsrWidth::Word);
    csr.bus_mut().probe().unwrap();
}

#[test]
fn udp_debug_bus() {
    let device = UdpDevice::spawn(Memory::with_debug_bus(DEBUG_MAP)).unwrap();
    let mut csr = connect_udp(&device, CsrWidth::Word);
    let mut debug = DebugBus::connect(&mut csr, DEBUG_MAP, DebugBusConfig::default()).unwrap();

    device
        .memory()
        .set_cpu_register(DebugRegister::Core, 0x0000_0101);
    assert_eq!(
        debug.debug_read(&mut csr, DebugRegister::Core).unwrap(),
        0x0000_0101
    );
    debug
        .debug_write(&mut csr, DebugRegister::Data, 0xdead_beef)
        .unwrap();
    assert_eq!(
        device.memory().cpu_register(DebugRegister::Data),
        Some(0xdead_beef)
    );
    assert_eq!(debug.consistency_warnings(), 0);

    device.memory().drop_next_debug_packet();
    debug
        .debug_write(&mut csr, DebugRegister::Data, 1)
        .unwrap();
    assert_eq!(debug.consistency_warnings(), 1);
    assert_eq!(debug.last_counter(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_write_then_read() {
    let device = TcpDevice::spawn(Memory::default()).await.unwrap();
    let port = device.port();
    let value = tokio::task::spawn_blocking(move || {
        let config = TransportConfig {
            protocol: Protocol::Tcp,
            ..TransportConfig::default()
        };
        let connection = Connection::connect("127.0.0.1", port, &config).unwrap();
        let mut csr = Csr::new(Bus::new(connection), CsrWidth::Word);
        csr.bus_mut().probe().unwrap();
        csr.write32(0x1000_0000, 0x1234_5678).unwrap();
        csr.write64(0x2000_0000, 0x0123_4567_89ab_cdef).unwrap();
        assert_eq!(csr.read64(0x2000_0000).unwrap(), 0x0123_4567_89ab_cdef);
        csr.read32(0x1000_0000).unwrap()
    })
    .await
    .unwrap();
    assert_eq!(value, 0x1234_5678);
    assert_eq!(device.memory().word(0x2000_0000), 0x0123_4567);
    device.finish().await.unwrap();
}
