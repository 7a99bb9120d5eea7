//! In-memory bus used by the unit tests.
use std::collections::{HashMap, VecDeque};
use std::io;

use etherbone_protocol::packet::{self, Transaction};

use crate::transport::Transport;

type Hook = Box<dyn FnMut(&Transaction, &mut HashMap<u32, u32>)>;

/// Answers reads with whatever was last written to the same address (zero if nothing was).
#[derive(Default)]
pub struct MemoryTransport {
    memory: HashMap<u32, u32>,
    pending: VecDeque<Vec<u8>>,
    transactions: Vec<Transaction>,
    sent: usize,
    received: usize,
    truncate_next: Option<usize>,
    hook: Option<Hook>,
}

impl MemoryTransport {
    /// Runs `hook` on every transaction before it is served.
    pub fn with_hook(hook: impl FnMut(&Transaction, &mut HashMap<u32, u32>) + 'static) -> Self {
        MemoryTransport {
            hook: Some(Box::new(hook)),
            ..MemoryTransport::default()
        }
    }

    pub fn truncate_next_reply(&mut self, len: usize) {
        self.truncate_next = Some(len);
    }

    pub fn sent_packets(&self) -> usize {
        self.sent
    }

    pub fn received_packets(&self) -> usize {
        self.received
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn memory(&self) -> &HashMap<u32, u32> {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut HashMap<u32, u32> {
        &mut self.memory
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sent += 1;
        if packet::is_probe(bytes) {
            self.pending.push_back(packet::encode_probe_reply().to_vec());
            return Ok(());
        }
        let transaction = Transaction::from_bytes(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.transactions.push(transaction);
        if let Some(hook) = self.hook.as_mut() {
            hook(&transaction, &mut self.memory);
        }
        match transaction {
            Transaction::Read { address } => {
                let value = self.memory.get(&address).copied().unwrap_or(0);
                let mut reply = packet::encode_reply(value).to_vec();
                if let Some(len) = self.truncate_next.take() {
                    reply.truncate(len);
                }
                self.pending.push_back(reply);
            }
            Transaction::Write { address, value } => {
                self.memory.insert(address, value);
            }
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let reply = self
            .pending
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "no reply pending"))?;
        self.received += 1;
        buf[..reply.len()].copy_from_slice(&reply);
        Ok(reply.len())
    }
}
