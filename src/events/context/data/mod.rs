//! Types containing the main body of an [`EventContext`].
//!
//! [`EventContext`]: super::EventContext
mod connect;
mod disconnect;

pub use self::{connect::*, disconnect::*};
