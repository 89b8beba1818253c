#![allow(missing_docs)]

use crate::{
    driver::{connection::error::Error, Config},
    events::EventData,
    id::ChannelId,
    ConnectionInfo,
};
use flume::Sender;

#[derive(Debug)]
pub enum CoreMessage {
    ConnectWithResult(ConnectionInfo, Sender<Result<(), Error>>),
    Close(Sender<()>),
    Leave,
    UpdateState(String, Option<ChannelId>),
    UpdateServer(String, String),
    Speaking(bool),
    AddEvent(EventData),
    RemoveGlobalEvents,
    SetConfig(Config),
}
