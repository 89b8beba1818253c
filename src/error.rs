//! Driver and connection error handling.

pub use crate::{
    driver::{
        connection::error::{Error as ConnectionError, Result as ConnectionResult},
        tasks::error::{Error as TaskError, Recipient},
        CryptoError,
    },
    ws::Error as WsError,
};
pub use serde_json::Error as JsonError;
