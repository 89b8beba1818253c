use super::context_data::*;
use crate::{
    id::{ChannelId, GuildId},
    ConnectionInfo,
};

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct InternalConnect {
    pub channel_id: Option<ChannelId>,
    pub guild_id: GuildId,
    pub server: String,
    pub session_id: String,
    pub ssrc: u32,
}

impl InternalConnect {
    pub(crate) fn new(info: &ConnectionInfo, ssrc: u32) -> Self {
        Self {
            channel_id: info.channel_id,
            guild_id: info.guild_id,
            server: info.endpoint.clone(),
            session_id: info.session_id.clone(),
            ssrc,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InternalDisconnect {
    pub kind: DisconnectKind,
    pub reason: Option<DisconnectReason>,
    pub channel_id: Option<ChannelId>,
    pub guild_id: GuildId,
    pub session_id: String,
}

impl InternalDisconnect {
    pub(crate) fn new(
        info: &ConnectionInfo,
        kind: DisconnectKind,
        reason: Option<DisconnectReason>,
    ) -> Self {
        Self {
            kind,
            reason,
            channel_id: info.channel_id,
            guild_id: info.guild_id,
            session_id: info.session_id.clone(),
        }
    }
}

impl<'a> From<&'a InternalConnect> for ConnectData<'a> {
    fn from(val: &'a InternalConnect) -> Self {
        Self {
            channel_id: val.channel_id,
            guild_id: val.guild_id,
            server: &val.server,
            session_id: &val.session_id,
            ssrc: val.ssrc,
        }
    }
}

impl<'a> From<&'a InternalDisconnect> for DisconnectData<'a> {
    fn from(val: &'a InternalDisconnect) -> Self {
        Self {
            kind: val.kind,
            reason: val.reason,
            channel_id: val.channel_id,
            guild_id: val.guild_id,
            session_id: &val.session_id,
        }
    }
}
