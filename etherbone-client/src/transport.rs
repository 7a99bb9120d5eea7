use std::{
    io::{self, Read, Write},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    time::Duration,
};

use etherbone_protocol::packet::PACKET_LEN;

use crate::error::ConnectionError;

/// A channel that carries encoded Etherbone packets to the bus and replies back.
///
/// Callers always pair a [`Transport::send`] of a read with exactly one
/// [`Transport::recv`]. There is no pipelining and no retransmission at this layer.
pub trait Transport {
    /// Send one encoded packet.
    fn send(&mut self, packet: &[u8]) -> io::Result<()>;

    /// Block until one reply arrives and return its size in bytes. Replies larger than `buf`
    /// may be truncated.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Which IP protocol carries the packets.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Protocol {
    /// One packet per datagram. Common for FPGA hardware designs.
    #[default]
    Udp,
    /// A persistent stream, for bridges behind a full network stack.
    Tcp,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub protocol: Protocol,
    /// Local UDP port replies are received on. Defaults to the remote port, since
    /// most hardware answers to a fixed port. `Some(0)` picks an ephemeral port.
    pub local_port: Option<u16>,
    /// Socket read and write timeout. `None` blocks forever.
    pub timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Udp,
            local_port: None,
            timeout: Some(Duration::from_secs(1)),
        }
    }
}

enum Channel {
    Datagram(UdpSocket),
    Stream(TcpStream),
}

/// An open connection to an Etherbone bridge. Dropping it closes all sockets.
pub struct Connection {
    channel: Channel,
    peer: SocketAddr,
}

impl Connection {
    pub const DEFAULT_PORT: u16 = 1234;

    pub fn connect(
        host: &str,
        port: u16,
        config: &TransportConfig,
    ) -> Result<Connection, ConnectionError> {
        let peer = resolve(host, port)?;
        log::debug!("Resolved {}:{} to {}", host, port, peer);

        let channel = match config.protocol {
            Protocol::Udp => {
                let local_port = config.local_port.unwrap_or(port);
                let local = if peer.is_ipv4() {
                    SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), local_port)
                } else {
                    SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), local_port)
                };
                let socket = UdpSocket::bind(local)?;
                socket.set_read_timeout(config.timeout)?;
                socket.set_write_timeout(config.timeout)?;
                log::info!(
                    "Sending Etherbone datagrams to {}, receiving on {}",
                    peer,
                    socket.local_addr()?
                );
                Channel::Datagram(socket)
            }
            Protocol::Tcp => {
                let stream = match config.timeout {
                    Some(timeout) => TcpStream::connect_timeout(&peer, timeout)?,
                    None => TcpStream::connect(peer)?,
                };
                stream.set_nodelay(true)?;
                stream.set_read_timeout(config.timeout)?;
                stream.set_write_timeout(config.timeout)?;
                log::info!("Connected Etherbone stream to {}", peer);
                Channel::Stream(stream)
            }
        };

        Ok(Connection { channel, peer })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Local address replies arrive on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match &self.channel {
            Channel::Datagram(socket) => socket.local_addr(),
            Channel::Stream(stream) => stream.local_addr(),
        }
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConnectionError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| ConnectionError::Resolve {
            host: host.to_string(),
            reason: e.to_string(),
        })?;
    addrs.next().ok_or_else(|| ConnectionError::Resolve {
        host: host.to_string(),
        reason: "no addresses found".to_string(),
    })
}

impl Transport for Connection {
    fn send(&mut self, packet: &[u8]) -> io::Result<()> {
        log::trace!("Send to {}: {:02x?}", self.peer, packet);
        match &mut self.channel {
            Channel::Datagram(socket) => {
                socket.send_to(packet, self.peer)?;
            }
            Channel::Stream(stream) => stream.write_all(packet)?,
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = match &mut self.channel {
            Channel::Datagram(socket) => loop {
                let (count, from) = socket.recv_from(buf)?;
                if from == self.peer {
                    break count;
                }
                log::warn!("Ignoring {} byte datagram from {}", count, from);
            },
            Channel::Stream(stream) => {
                // Streams carry no packet boundaries. A reply fills `buf` up to one packet.
                let len = buf.len().min(PACKET_LEN);
                stream.read_exact(&mut buf[..len])?;
                len
            }
        };
        log::trace!("Received from {}: {:02x?}", self.peer, &buf[..count]);
        Ok(count)
    }
}
