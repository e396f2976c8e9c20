//! The narrow seam to the chat platform.
//!
//! The core only ever needs six operations: send/edit/delete a message,
//! fetch a bounded slice of recent history, resolve a display name and
//! whisper an ephemeral acknowledgment. Everything else (connection,
//! components, auth) lives behind the implementation.

use std::fmt;

use crate::render::Document;
use crate::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the reconciler needs to know about a message in a channel's history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageView {
    pub id: MessageId,
    pub from_bot: bool,
    pub title: Option<String>,
}

/// Which interactive controls a panel message carries. The gateway turns
/// this into the platform's component layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Controls {
    /// Language select plus the chamber/room/ticket claim flow.
    RoomPanel { floor: String },
    /// Language select, floor claim button, yellow boss and mineral buttons.
    OverviewPanel { floor: String },
}

#[derive(Debug)]
pub enum GatewayError {
    /// The named channel does not exist (setup reports these per channel).
    ChannelNotFound(String),
    /// Transient platform failure; retry happens on the next trigger.
    Transient(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::ChannelNotFound(c) => write!(f, "channel not found: {c}"),
            GatewayError::Transient(s) => write!(f, "gateway error: {s}"),
        }
    }
}

impl std::error::Error for GatewayError {}

#[allow(async_fn_in_trait)]
pub trait Gateway {
    async fn send_panel(
        &mut self,
        channel: &str,
        doc: &Document,
        controls: &Controls,
    ) -> Result<MessageId, GatewayError>;

    async fn edit_panel(
        &mut self,
        channel: &str,
        id: MessageId,
        doc: &Document,
        controls: &Controls,
    ) -> Result<(), GatewayError>;

    async fn delete_message(&mut self, channel: &str, id: MessageId) -> Result<(), GatewayError>;

    /// Most-recent-first, at most `limit` entries.
    async fn recent_history(
        &mut self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<MessageView>, GatewayError>;

    async fn resolve_display_name(&mut self, user: UserId) -> Result<String, GatewayError>;

    async fn send_ephemeral(&mut self, user: UserId, text: &str) -> Result<(), GatewayError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording in-memory gateway for reconciler and handler tests.

    use std::collections::{HashMap, HashSet};

    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Call {
        Send(String),
        Edit(String, u64),
        Delete(String, u64),
        History(String),
        Resolve(u64),
        Ephemeral(u64, String),
    }

    #[derive(Clone, Debug)]
    pub struct StoredMsg {
        pub id: MessageId,
        pub from_bot: bool,
        pub title: Option<String>,
        pub doc: Option<Document>,
    }

    #[derive(Debug, Default)]
    pub struct FakeGateway {
        next_id: u64,
        /// Oldest-first per channel; history is served reversed.
        pub channels: HashMap<String, Vec<StoredMsg>>,
        pub names: HashMap<u64, String>,
        pub ephemerals: Vec<(UserId, String)>,
        pub calls: Vec<Call>,
        pub missing_channels: HashSet<String>,
        pub failing_channels: HashSet<String>,
        pub undeletable: HashSet<u64>,
    }

    impl FakeGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed_message(&mut self, channel: &str, from_bot: bool, title: Option<&str>) -> MessageId {
            self.next_id += 1;
            let id = MessageId(self.next_id);
            self.channels.entry(channel.to_string()).or_default().push(StoredMsg {
                id,
                from_bot,
                title: title.map(str::to_string),
                doc: None,
            });
            id
        }

        pub fn channel(&self, channel: &str) -> &[StoredMsg] {
            self.channels.get(channel).map(Vec::as_slice).unwrap_or(&[])
        }

        pub fn count<F: Fn(&Call) -> bool>(&self, f: F) -> usize {
            self.calls.iter().filter(|c| f(c)).count()
        }

        fn check_channel(&self, channel: &str) -> Result<(), GatewayError> {
            if self.missing_channels.contains(channel) {
                return Err(GatewayError::ChannelNotFound(channel.to_string()));
            }
            if self.failing_channels.contains(channel) {
                return Err(GatewayError::Transient("injected failure".to_string()));
            }
            Ok(())
        }
    }

    impl Gateway for FakeGateway {
        async fn send_panel(
            &mut self,
            channel: &str,
            doc: &Document,
            _controls: &Controls,
        ) -> Result<MessageId, GatewayError> {
            self.calls.push(Call::Send(channel.to_string()));
            self.check_channel(channel)?;
            self.next_id += 1;
            let id = MessageId(self.next_id);
            self.channels.entry(channel.to_string()).or_default().push(StoredMsg {
                id,
                from_bot: true,
                title: Some(doc.title.clone()),
                doc: Some(doc.clone()),
            });
            Ok(id)
        }

        async fn edit_panel(
            &mut self,
            channel: &str,
            id: MessageId,
            doc: &Document,
            _controls: &Controls,
        ) -> Result<(), GatewayError> {
            self.calls.push(Call::Edit(channel.to_string(), id.0));
            self.check_channel(channel)?;
            let msgs = self
                .channels
                .get_mut(channel)
                .ok_or_else(|| GatewayError::Transient("no such channel".to_string()))?;
            let msg = msgs
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| GatewayError::Transient("no such message".to_string()))?;
            msg.title = Some(doc.title.clone());
            msg.doc = Some(doc.clone());
            Ok(())
        }

        async fn delete_message(
            &mut self,
            channel: &str,
            id: MessageId,
        ) -> Result<(), GatewayError> {
            self.calls.push(Call::Delete(channel.to_string(), id.0));
            self.check_channel(channel)?;
            if self.undeletable.contains(&id.0) {
                return Err(GatewayError::Transient("delete refused".to_string()));
            }
            if let Some(msgs) = self.channels.get_mut(channel) {
                msgs.retain(|m| m.id != id);
            }
            Ok(())
        }

        async fn recent_history(
            &mut self,
            channel: &str,
            limit: usize,
        ) -> Result<Vec<MessageView>, GatewayError> {
            self.calls.push(Call::History(channel.to_string()));
            self.check_channel(channel)?;
            let msgs = self.channel(channel);
            Ok(msgs
                .iter()
                .rev()
                .take(limit)
                .map(|m| MessageView {
                    id: m.id,
                    from_bot: m.from_bot,
                    title: m.title.clone(),
                })
                .collect())
        }

        async fn resolve_display_name(&mut self, user: UserId) -> Result<String, GatewayError> {
            self.calls.push(Call::Resolve(user.0));
            self.names
                .get(&user.0)
                .cloned()
                .ok_or_else(|| GatewayError::Transient("unknown user".to_string()))
        }

        async fn send_ephemeral(&mut self, user: UserId, text: &str) -> Result<(), GatewayError> {
            self.calls.push(Call::Ephemeral(user.0, text.to_string()));
            self.ephemerals.push((user, text.to_string()));
            Ok(())
        }
    }
}
