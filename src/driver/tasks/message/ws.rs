#![allow(missing_docs)]

use crate::model::Payload;

#[derive(Debug)]
pub enum WsMessage {
    Send(Payload),
    SetSsrc(u32),
    Speaking(bool),
}
