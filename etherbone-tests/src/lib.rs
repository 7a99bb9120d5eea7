//! Loopback stand-ins for Etherbone hardware, used by the integration tests.
//!
//! [`UdpDevice`] answers datagrams from a std thread. [`TcpDevice`] serves one stream
//! connection from a tokio task through [`EtherboneCodec`]. Both are backed by a [`Memory`].
use std::{
    collections::HashMap,
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use etherbone_client::CounterSyncMap;
use etherbone_protocol::{
    packet::{self, Transaction},
    relay::DebugRegister,
    tokio_codec::{EtherboneCodec, Frame},
};
use futures::{SinkExt, StreamExt};
use tokio_util::codec::Framed;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A word-addressed bus. Unwritten words read as zero.
///
/// With [`Memory::with_debug_bus`] the bus also models a counter-synchronized debug bridge
/// in front of the CPU registers `CORE` and `DATA`.
#[derive(Debug, Default)]
pub struct Memory {
    words: HashMap<u32, u32>,
    debug: Option<DebugModel>,
}

#[derive(Debug)]
struct DebugModel {
    map: CounterSyncMap,
    cpu: [u32; 2],
    skip_next: bool,
}

fn cpu_index(register: DebugRegister) -> usize {
    (register.offset() / 4) as usize
}

impl Memory {
    pub fn with_debug_bus(map: CounterSyncMap) -> Memory {
        Memory {
            words: HashMap::new(),
            debug: Some(DebugModel {
                map,
                cpu: [0; 2],
                skip_next: false,
            }),
        }
    }

    pub fn word(&self, address: u32) -> u32 {
        self.words.get(&address).copied().unwrap_or(0)
    }

    pub fn set_word(&mut self, address: u32, value: u32) {
        self.words.insert(address, value);
    }

    pub fn cpu_register(&self, register: DebugRegister) -> Option<u32> {
        self.debug.as_ref().map(|d| d.cpu[cpu_index(register)])
    }

    pub fn set_cpu_register(&mut self, register: DebugRegister, value: u32) {
        if let Some(debug) = self.debug.as_mut() {
            debug.cpu[cpu_index(register)] = value;
        }
    }

    /// The packet counter skips one value on the next debug transaction.
    pub fn drop_next_debug_packet(&mut self) {
        if let Some(debug) = self.debug.as_mut() {
            debug.skip_next = true;
        }
    }

    /// Applies one transaction and returns the reply value of a read.
    pub fn serve(&mut self, transaction: Transaction) -> Option<u32> {
        match transaction {
            Transaction::Read { address } => Some(self.word(address)),
            Transaction::Write { address, value } => {
                self.words.insert(address, value);
                self.debug_transaction(address, value);
                None
            }
        }
    }

    fn debug_transaction(&mut self, address: u32, value: u32) {
        let Some(debug) = self.debug.as_mut() else {
            return;
        };
        let map = debug.map;
        if address == map.core {
            debug.cpu[cpu_index(DebugRegister::Core)] = value;
        } else if address == map.data {
            debug.cpu[cpu_index(DebugRegister::Data)] = value;
        } else if address == map.sync_trigger {
            let (backing, register) = match value {
                0 => (map.core, DebugRegister::Core),
                _ => (map.data, DebugRegister::Data),
            };
            self.words.insert(backing, debug.cpu[cpu_index(register)]);
        } else {
            return;
        }
        let step = if std::mem::take(&mut debug.skip_next) {
            2
        } else {
            1
        };
        let counter = self.words.entry(map.packet_counter).or_insert(0);
        *counter = counter.wrapping_add(step);
    }
}

fn lock(memory: &Mutex<Memory>) -> MutexGuard<'_, Memory> {
    memory.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An Etherbone device on a loopback UDP port.
pub struct UdpDevice {
    addr: SocketAddr,
    memory: Arc<Mutex<Memory>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<io::Result<()>>>,
}

impl UdpDevice {
    pub fn spawn(memory: Memory) -> io::Result<UdpDevice> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let addr = socket.local_addr()?;
        let memory = Arc::new(Mutex::new(memory));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let memory = Arc::clone(&memory);
            let stop = Arc::clone(&stop);
            thread::spawn(move || serve_datagrams(socket, memory, stop))
        };
        Ok(UdpDevice {
            addr,
            memory,
            stop,
            handle: Some(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn memory(&self) -> MutexGuard<'_, Memory> {
        lock(&self.memory)
    }
}

impl Drop for UdpDevice {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve_datagrams(
    socket: UdpSocket,
    memory: Arc<Mutex<Memory>>,
    stop: Arc<AtomicBool>,
) -> io::Result<()> {
    let mut buf = [0u8; 64];
    while !stop.load(Ordering::Relaxed) {
        let (count, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                continue;
            }
            Err(e) => return Err(e),
        };
        let bytes = &buf[..count];
        if packet::is_probe(bytes) {
            socket.send_to(&packet::encode_probe_reply(), peer)?;
            continue;
        }
        // Malformed packets are dropped, like real hardware does.
        let Ok(transaction) = Transaction::from_bytes(bytes) else {
            continue;
        };
        let reply = lock(&memory).serve(transaction);
        if let Some(value) = reply {
            socket.send_to(&packet::encode_reply(value), peer)?;
        }
    }
    Ok(())
}

/// An Etherbone device that accepts one TCP connection.
pub struct TcpDevice {
    addr: SocketAddr,
    memory: Arc<Mutex<Memory>>,
    task: tokio::task::JoinHandle<io::Result<()>>,
}

impl TcpDevice {
    pub async fn spawn(memory: Memory) -> io::Result<TcpDevice> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let memory = Arc::new(Mutex::new(memory));
        let task = {
            let memory = Arc::clone(&memory);
            tokio::spawn(async move {
                let (stream, _) = listener.accept().await?;
                serve_stream(stream, memory).await
            })
        };
        Ok(TcpDevice { addr, memory, task })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn memory(&self) -> MutexGuard<'_, Memory> {
        lock(&self.memory)
    }

    /// Waits until the client has disconnected.
    pub async fn finish(self) -> io::Result<()> {
        self.task.await.map_err(io::Error::other)?
    }
}

async fn serve_stream(stream: tokio::net::TcpStream, memory: Arc<Mutex<Memory>>) -> io::Result<()> {
    let mut framed = Framed::new(stream, EtherboneCodec);
    while let Some(frame) = framed.next().await {
        match frame? {
            Frame::Probe => framed.send(Frame::ProbeReply).await?,
            Frame::ProbeReply => {}
            Frame::Transaction(transaction) => {
                let reply = lock(&memory).serve(transaction);
                if let Some(value) = reply {
                    let reply = Transaction::Write { address: 0, value };
                    framed.send(Frame::Transaction(reply)).await?;
                }
            }
        }
    }
    Ok(())
}
