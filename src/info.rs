use crate::id::{ChannelId, GuildId, UserId};
use std::fmt;

/// Parameters and information needed to start communicating with Discord's voice servers.
///
/// These are gathered by the main gateway client (from its voice state and voice
/// server updates) and handed over whole; the driver never mutates them except
/// through [`Driver::update_state`] and [`Driver::update_server`].
///
/// [`Driver::update_state`]: crate::Driver::update_state
/// [`Driver::update_server`]: crate::Driver::update_server
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct ConnectionInfo {
    /// ID of the voice channel being joined.
    ///
    /// A connection attempt without a channel is rejected.
    pub channel_id: Option<ChannelId>,
    /// URL of the voice websocket gateway server assigned to this call.
    pub endpoint: String,
    /// ID of the target voice channel's parent guild.
    pub guild_id: GuildId,
    /// Unique string describing this session for validation/authentication purposes.
    pub session_id: String,
    /// Ephemeral secret used to validate the above session.
    pub token: String,
    /// UserID of this bot.
    pub user_id: UserId,
}

impl ConnectionInfo {
    /// Applies a voice state update, returning whether the live session must be
    /// re-established.
    pub(crate) fn apply_state_update(&mut self, session_id: String, channel_id: ChannelId) -> bool {
        let should_reconn = self.session_id != session_id || self.channel_id != Some(channel_id);

        self.session_id = session_id;
        self.channel_id = Some(channel_id);

        should_reconn
    }

    /// Applies a voice server update, returning whether the live session must be
    /// re-established.
    pub(crate) fn apply_server_update(&mut self, endpoint: String, token: String) -> bool {
        let should_reconn = self.endpoint != endpoint || self.token != token;

        self.endpoint = endpoint;
        self.token = token;

        should_reconn
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("channel_id", &self.channel_id)
            .field("endpoint", &self.endpoint)
            .field("guild_id", &self.guild_id)
            .field("session_id", &self.session_id)
            .field("token", &"<secret>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::num::NonZeroU64;

    pub(crate) fn info_for(endpoint: &str) -> ConnectionInfo {
        ConnectionInfo {
            channel_id: Some(ChannelId::from(NonZeroU64::new(3).unwrap())),
            endpoint: endpoint.into(),
            guild_id: GuildId::from(NonZeroU64::new(1).unwrap()),
            session_id: "session".into(),
            token: "token".into(),
            user_id: UserId::from(NonZeroU64::new(2).unwrap()),
        }
    }

    #[test]
    fn token_is_redacted() {
        let out = format!("{:?}", info_for("voice.example"));
        assert!(out.contains("<secret>"));
        assert!(!out.contains("\"token\""));
    }

    #[test]
    fn unchanged_updates_do_not_reconnect() {
        let mut info = info_for("voice.example");
        let channel = info.channel_id.unwrap();

        assert!(!info.apply_state_update("session".into(), channel));
        assert!(!info.apply_server_update("voice.example".into(), "token".into()));
        assert!(info.apply_server_update("voice2.example".into(), "token".into()));
        assert!(info.apply_state_update(
            "session".into(),
            ChannelId::from(NonZeroU64::new(9).unwrap())
        ));
    }
}
