//! [`tokio_util::codec`] framing for stream transports.
//!
//! Enabled with the `tokio` feature.
use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::packet::{self, HEADER_LEN, PACKET_LEN, Transaction};
use crate::relay::{self, REPLY_LEN, RelayRequest};

/// A unit on an Etherbone stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Frame {
    Probe,
    ProbeReply,
    Transaction(Transaction),
}

/// Frames Etherbone packets on a byte stream, e.g. a TCP connection to a bridge.
#[derive(Debug, Default, Clone, Copy)]
pub struct EtherboneCodec;

impl Decoder for EtherboneCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        if packet::is_probe(&src[..HEADER_LEN]) {
            src.advance(HEADER_LEN);
            return Ok(Some(Frame::Probe));
        }
        if packet::is_probe_reply(&src[..HEADER_LEN]) {
            src.advance(HEADER_LEN);
            return Ok(Some(Frame::ProbeReply));
        }
        if src.len() < PACKET_LEN {
            src.reserve(PACKET_LEN - src.len());
            return Ok(None);
        }
        let frame = src.split_to(PACKET_LEN);
        let transaction = Transaction::from_bytes(&frame)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(Frame::Transaction(transaction)))
    }
}

impl Encoder<Frame> for EtherboneCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Frame::Probe => dst.put_slice(&packet::encode_probe()),
            Frame::ProbeReply => dst.put_slice(&packet::encode_probe_reply()),
            Frame::Transaction(transaction) => dst.put_slice(&transaction.to_bytes()),
        }
        Ok(())
    }
}

/// Client side of the relay protocol: sends requests, receives read replies.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelayClientCodec;

impl Decoder for RelayClientCodec {
    type Item = u32;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < REPLY_LEN {
            return Ok(None);
        }
        let mut reply = [0u8; REPLY_LEN];
        src.copy_to_slice(&mut reply);
        Ok(Some(relay::decode_reply(reply)))
    }
}

impl Encoder<RelayRequest> for RelayClientCodec {
    type Error = io::Error;

    fn encode(&mut self, item: RelayRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&item.to_bytes());
        Ok(())
    }
}
