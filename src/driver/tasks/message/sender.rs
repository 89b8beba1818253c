#![allow(missing_docs)]

use flume::Sender;

#[derive(Debug)]
pub enum SenderMessage {
    /// Send one silent frame, then signal once it has been handed to the socket.
    Silence(Sender<()>),
}
