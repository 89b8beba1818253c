#![allow(missing_docs)]

use bytes::Bytes;

#[derive(Debug)]
pub enum UdpTxMessage {
    Packet(Bytes),
}
