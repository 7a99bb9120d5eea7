use std::{
    io::{self, ErrorKind, Read, Write},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::RelayBackend;
use etherbone_protocol::relay::{self, DebugWindow, Operation, REQUEST_LEN, RelayRequest, Width};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub debug_window: DebugWindow,
    /// Socket read and write timeout. `None` keeps idle clients connected forever.
    pub read_write_timeout: Option<Duration>,
}

#[derive(Debug)]
pub struct Server<B: RelayBackend> {
    backend: B,
    config: Config,
}

/// Builder to create a [Server] instance and modify configuration options
///
/// # Example
///
/// ```ignore
/// use etherbone_server::server::Builder;
/// use std::time::Duration;
///
/// let server = Builder::new()
///     .debug_window_base(0xf00f_0000)
///     .rw_timeout(Duration::from_secs(20))
///     .build(my_backend);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the first address of the 8-byte debug window.
    pub fn debug_window_base(mut self, base: u32) -> Self {
        self.config.debug_window = DebugWindow::new(base);
        self
    }

    /// Set the TCP read and write timeout
    pub fn rw_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_write_timeout = Some(timeout);
        self
    }

    /// Build and return the server
    pub fn build<B: RelayBackend>(self, backend: B) -> Server<B> {
        Server::new(backend, self.config)
    }
}

impl<B: RelayBackend> Server<B> {
    pub fn new(backend: B, config: Config) -> Server<B> {
        Server { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn listen(&mut self, addr: impl ToSocketAddrs) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr)?;
        log::info!(
            "Relay server listening on {} (debug window at {:08x})",
            listener.local_addr()?,
            self.config.debug_window.base()
        );
        self.serve(listener);
        Ok(())
    }

    /// Serves clients from `listener` one after the other. Never returns.
    pub fn serve(&mut self, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(tcp) => {
                    if let Ok(addr) = tcp.peer_addr() {
                        log::info!("New client connection from {}", addr);
                    }
                    if let Err(e) = self.handle_client(tcp) {
                        log::error!("Client error: {}", e);
                    }
                }
                Err(e) => log::error!("Connection error: {}", e),
            }
        }
    }

    fn handle_client(&mut self, mut tcp: TcpStream) -> io::Result<()> {
        tcp.set_read_timeout(self.config.read_write_timeout)?;
        tcp.set_write_timeout(self.config.read_write_timeout)?;
        tcp.set_nodelay(true)?;
        self.handle_session(&mut tcp)
    }

    /// Processes requests from `stream` until the client disconnects.
    pub fn handle_session<S: Read + Write>(&mut self, stream: &mut S) -> io::Result<()> {
        let mut buf = [0u8; REQUEST_LEN];
        loop {
            let count = match stream.read(&mut buf) {
                Ok(0) => {
                    log::info!("Client disconnected");
                    break;
                }
                Ok(count) => count,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock =>
                {
                    log::error!("Client read timeout, closing connection");
                    break;
                }
                Err(err)
                    if err.kind() == ErrorKind::ConnectionAborted
                        || err.kind() == ErrorKind::ConnectionReset =>
                {
                    break;
                } // Client disconnected
                Err(err) => return Err(err),
            };
            if count != REQUEST_LEN {
                log::warn!(
                    "Ignoring request of {} bytes, expected {}",
                    count,
                    REQUEST_LEN
                );
                continue;
            }
            let request = match RelayRequest::from_bytes(&buf) {
                Ok(request) => request,
                Err(e) => {
                    log::error!("Dropping request {:02x?}: {}", buf, e);
                    continue;
                }
            };
            if let Some(value) = self.process_request(request) {
                stream.write_all(&relay::encode_reply(value))?;
            }
        }
        Ok(())
    }

    /// Forwards one request to the backend and returns the reply value, if any.
    fn process_request(&mut self, request: RelayRequest) -> Option<u32> {
        let RelayRequest {
            operation,
            width,
            address,
            data,
        } = request;
        if let Some(offset) = self.config.debug_window.offset(address) {
            return self.process_debug_request(operation, width, offset, data);
        }
        match operation {
            Operation::Read => {
                let value = self.backend.read(width, address) & width.mask();
                log::debug!("Read{} @ {:08x} = {:08x}", width.bits(), address, value);
                Some(value)
            }
            Operation::Write => {
                log::debug!("Write{} @ {:08x} <- {:08x}", width.bits(), address, data);
                self.backend.write(width, address, data & width.mask());
                None
            }
        }
    }

    fn process_debug_request(
        &mut self,
        operation: Operation,
        width: Width,
        offset: u32,
        data: u32,
    ) -> Option<u32> {
        if width != Width::Bits32 {
            log::error!(
                "Dropping {}-bit access to debug register at offset {}, only 32 bit is supported",
                width.bits(),
                offset
            );
            return None;
        }
        match operation {
            Operation::Read => {
                let value = self.backend.debug_read(offset);
                log::debug!("Debug read @ {} = {:08x}", offset, value);
                Some(value)
            }
            Operation::Write => {
                log::debug!("Debug write @ {} <- {:08x}", offset, data);
                self.backend.debug_write(offset, data);
                None
            }
        }
    }
}
