//! Typed gateway events.
//!
//! Instead of matching on raw `(op, t, serde_json::Value)` tuples everywhere,
//! the gateway module deserialises dispatch payloads into this enum so the
//! state cache can pattern-match on strongly-typed data.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::types::*;

// ---------------------------------------------------------------------------
// The top-level event enum
// ---------------------------------------------------------------------------

/// A fully-parsed event coming off the Discord gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// We've successfully identified, the session is ready.
    Ready(Box<ReadyEvent>),
    /// A resumed session replays missed events; nothing to cache.
    Resumed,

    GuildCreate(Box<Guild>),
    GuildDelete(UnavailableGuild),
    GuildMemberAdd(GuildMember),
    GuildMemberRemove(GuildMemberRemove),
    GuildMemberUpdate(GuildMember),
    GuildBanAdd(GuildBan),
    GuildBanRemove(GuildBan),

    ChannelCreate(Channel),
    ChannelUpdate(Channel),
    ChannelDelete(Channel),
    ChannelPinsUpdate(ChannelPinsUpdate),
    ChannelRecipientAdd(ChannelRecipient),
    ChannelRecipientRemove(ChannelRecipient),
    TypingStart(TypingStart),

    MessageCreate(Box<Message>),
    MessageUpdate(RawMessageUpdate),
    MessageDelete(MessageDelete),
    MessageDeleteBulk(MessageDeleteBulk),

    ReactionAdd(ReactionEvent),
    ReactionRemove(ReactionEvent),
    ReactionRemoveAll(ReactionRemoveAll),
    ReactionRemoveEmoji(ReactionRemoveEmoji),

    PresenceUpdate(PresenceUpdate),
    UserUpdate(User),
    VoiceStateUpdate(VoiceState),

    RelationshipAdd(Relationship),
    RelationshipUpdate(Relationship),
    RelationshipRemove(RelationshipRemove),
    FriendSuggestionCreate(FriendSuggestion),
    FriendSuggestionDelete(FriendSuggestionDelete),

    CallCreate(Call),
    CallUpdate(Call),
    CallDelete(CallDelete),

    /// Heartbeat ACK from the gateway (op 11).
    HeartbeatAck,

    /// The gateway is asking us to heartbeat immediately (op 1).
    HeartbeatRequest,

    /// Gateway told us to reconnect (op 7).
    Reconnect,

    /// Session has been invalidated (op 9). The inner bool indicates whether
    /// the session is resumable (`true`) or we must re-identify (`false`).
    InvalidSession(bool),

    /// An event we received but don't have a typed variant for.
    /// Carries the event name and raw JSON so callers can still inspect it.
    Unknown {
        event_name: Option<String>,
        op: u8,
        data: Option<serde_json::Value>,
    },
}

// ---------------------------------------------------------------------------
// Parsing from a raw GatewayPayload
// ---------------------------------------------------------------------------

impl GatewayEvent {
    /// Try to convert a raw [`GatewayPayload`] into a typed event.
    ///
    /// This never fails: unrecognised or malformed events become
    /// [`GatewayEvent::Unknown`].
    pub fn from_payload(payload: GatewayPayload) -> Self {
        match payload.op {
            // ----- Op 0: DISPATCH -----
            0 => Self::parse_dispatch(payload.t.as_deref(), payload.d),

            // ----- Op 1: Heartbeat request -----
            1 => GatewayEvent::HeartbeatRequest,

            // ----- Op 7: Reconnect -----
            7 => GatewayEvent::Reconnect,

            // ----- Op 9: Invalid Session -----
            9 => {
                let resumable = payload
                    .d
                    .as_ref()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                GatewayEvent::InvalidSession(resumable)
            }

            // ----- Op 11: Heartbeat ACK -----
            11 => GatewayEvent::HeartbeatAck,

            // ----- Anything else -----
            _ => GatewayEvent::Unknown {
                event_name: payload.t,
                op: payload.op,
                data: payload.d,
            },
        }
    }

    /// Parse an op-0 DISPATCH event by its `t` name.
    fn parse_dispatch(event_name: Option<&str>, data: Option<serde_json::Value>) -> Self {
        let Some(name) = event_name else {
            return GatewayEvent::Unknown {
                event_name: None,
                op: 0,
                data,
            };
        };

        if name == "RESUMED" {
            return GatewayEvent::Resumed;
        }

        let Some(d) = data else {
            return GatewayEvent::Unknown {
                event_name: Some(name.to_string()),
                op: 0,
                data: None,
            };
        };

        match name {
            "READY" => typed(name, d, |r| GatewayEvent::Ready(Box::new(r))),

            "GUILD_CREATE" => typed(name, d, |g| GatewayEvent::GuildCreate(Box::new(g))),
            "GUILD_DELETE" => typed(name, d, GatewayEvent::GuildDelete),
            "GUILD_MEMBER_ADD" => typed(name, d, GatewayEvent::GuildMemberAdd),
            "GUILD_MEMBER_REMOVE" => typed(name, d, GatewayEvent::GuildMemberRemove),
            "GUILD_MEMBER_UPDATE" => typed(name, d, GatewayEvent::GuildMemberUpdate),
            "GUILD_BAN_ADD" => typed(name, d, GatewayEvent::GuildBanAdd),
            "GUILD_BAN_REMOVE" => typed(name, d, GatewayEvent::GuildBanRemove),

            "CHANNEL_CREATE" => typed(name, d, GatewayEvent::ChannelCreate),
            "CHANNEL_UPDATE" => typed(name, d, GatewayEvent::ChannelUpdate),
            "CHANNEL_DELETE" => typed(name, d, GatewayEvent::ChannelDelete),
            "CHANNEL_PINS_UPDATE" => typed(name, d, GatewayEvent::ChannelPinsUpdate),
            "CHANNEL_RECIPIENT_ADD" => typed(name, d, GatewayEvent::ChannelRecipientAdd),
            "CHANNEL_RECIPIENT_REMOVE" => typed(name, d, GatewayEvent::ChannelRecipientRemove),
            "TYPING_START" => typed(name, d, GatewayEvent::TypingStart),

            "MESSAGE_CREATE" => typed(name, d, |m| GatewayEvent::MessageCreate(Box::new(m))),
            "MESSAGE_UPDATE" => parse_message_update(d),
            "MESSAGE_DELETE" => typed(name, d, GatewayEvent::MessageDelete),
            "MESSAGE_DELETE_BULK" => typed(name, d, GatewayEvent::MessageDeleteBulk),

            "MESSAGE_REACTION_ADD" => typed(name, d, GatewayEvent::ReactionAdd),
            "MESSAGE_REACTION_REMOVE" => typed(name, d, GatewayEvent::ReactionRemove),
            "MESSAGE_REACTION_REMOVE_ALL" => typed(name, d, GatewayEvent::ReactionRemoveAll),
            "MESSAGE_REACTION_REMOVE_EMOJI" => {
                typed(name, d, GatewayEvent::ReactionRemoveEmoji)
            }

            "PRESENCE_UPDATE" => typed(name, d, GatewayEvent::PresenceUpdate),
            "USER_UPDATE" => typed(name, d, GatewayEvent::UserUpdate),
            "VOICE_STATE_UPDATE" => typed(name, d, GatewayEvent::VoiceStateUpdate),

            "RELATIONSHIP_ADD" => typed(name, d, GatewayEvent::RelationshipAdd),
            "RELATIONSHIP_UPDATE" => typed(name, d, GatewayEvent::RelationshipUpdate),
            "RELATIONSHIP_REMOVE" => typed(name, d, GatewayEvent::RelationshipRemove),
            "FRIEND_SUGGESTION_CREATE" => typed(name, d, GatewayEvent::FriendSuggestionCreate),
            "FRIEND_SUGGESTION_DELETE" => typed(name, d, GatewayEvent::FriendSuggestionDelete),

            "CALL_CREATE" => typed(name, d, GatewayEvent::CallCreate),
            "CALL_UPDATE" => typed(name, d, GatewayEvent::CallUpdate),
            "CALL_DELETE" => typed(name, d, GatewayEvent::CallDelete),

            // ---- Events we don't log ----
            _ => GatewayEvent::Unknown {
                event_name: Some(name.to_string()),
                op: 0,
                data: Some(d),
            },
        }
    }

    /// The dispatch name for logging, e.g. `MESSAGE_CREATE`.
    pub fn name(&self) -> &str {
        match self {
            GatewayEvent::Ready(_) => "READY",
            GatewayEvent::Resumed => "RESUMED",
            GatewayEvent::GuildCreate(_) => "GUILD_CREATE",
            GatewayEvent::GuildDelete(_) => "GUILD_DELETE",
            GatewayEvent::GuildMemberAdd(_) => "GUILD_MEMBER_ADD",
            GatewayEvent::GuildMemberRemove(_) => "GUILD_MEMBER_REMOVE",
            GatewayEvent::GuildMemberUpdate(_) => "GUILD_MEMBER_UPDATE",
            GatewayEvent::GuildBanAdd(_) => "GUILD_BAN_ADD",
            GatewayEvent::GuildBanRemove(_) => "GUILD_BAN_REMOVE",
            GatewayEvent::ChannelCreate(_) => "CHANNEL_CREATE",
            GatewayEvent::ChannelUpdate(_) => "CHANNEL_UPDATE",
            GatewayEvent::ChannelDelete(_) => "CHANNEL_DELETE",
            GatewayEvent::ChannelPinsUpdate(_) => "CHANNEL_PINS_UPDATE",
            GatewayEvent::ChannelRecipientAdd(_) => "CHANNEL_RECIPIENT_ADD",
            GatewayEvent::ChannelRecipientRemove(_) => "CHANNEL_RECIPIENT_REMOVE",
            GatewayEvent::TypingStart(_) => "TYPING_START",
            GatewayEvent::MessageCreate(_) => "MESSAGE_CREATE",
            GatewayEvent::MessageUpdate(_) => "MESSAGE_UPDATE",
            GatewayEvent::MessageDelete(_) => "MESSAGE_DELETE",
            GatewayEvent::MessageDeleteBulk(_) => "MESSAGE_DELETE_BULK",
            GatewayEvent::ReactionAdd(_) => "MESSAGE_REACTION_ADD",
            GatewayEvent::ReactionRemove(_) => "MESSAGE_REACTION_REMOVE",
            GatewayEvent::ReactionRemoveAll(_) => "MESSAGE_REACTION_REMOVE_ALL",
            GatewayEvent::ReactionRemoveEmoji(_) => "MESSAGE_REACTION_REMOVE_EMOJI",
            GatewayEvent::PresenceUpdate(_) => "PRESENCE_UPDATE",
            GatewayEvent::UserUpdate(_) => "USER_UPDATE",
            GatewayEvent::VoiceStateUpdate(_) => "VOICE_STATE_UPDATE",
            GatewayEvent::RelationshipAdd(_) => "RELATIONSHIP_ADD",
            GatewayEvent::RelationshipUpdate(_) => "RELATIONSHIP_UPDATE",
            GatewayEvent::RelationshipRemove(_) => "RELATIONSHIP_REMOVE",
            GatewayEvent::FriendSuggestionCreate(_) => "FRIEND_SUGGESTION_CREATE",
            GatewayEvent::FriendSuggestionDelete(_) => "FRIEND_SUGGESTION_DELETE",
            GatewayEvent::CallCreate(_) => "CALL_CREATE",
            GatewayEvent::CallUpdate(_) => "CALL_UPDATE",
            GatewayEvent::CallDelete(_) => "CALL_DELETE",
            GatewayEvent::HeartbeatAck => "HEARTBEAT_ACK",
            GatewayEvent::HeartbeatRequest => "HEARTBEAT",
            GatewayEvent::Reconnect => "RECONNECT",
            GatewayEvent::InvalidSession(_) => "INVALID_SESSION",
            GatewayEvent::Unknown { event_name, .. } => {
                event_name.as_deref().unwrap_or("UNKNOWN")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Deserialise `d` into `T` and wrap it, falling back to `Unknown` with a
/// warning when the payload doesn't match.
fn typed<T, F>(name: &str, d: serde_json::Value, wrap: F) -> GatewayEvent
where
    T: DeserializeOwned,
    F: FnOnce(T) -> GatewayEvent,
{
    match serde_json::from_value::<T>(d.clone()) {
        Ok(value) => wrap(value),
        Err(e) => {
            warn!(event = name, error = %e, "failed to parse dispatch payload");
            GatewayEvent::Unknown {
                event_name: Some(name.to_string()),
                op: 0,
                data: Some(d),
            }
        }
    }
}

/// MESSAGE_UPDATE payloads are partial, so keep the raw object around for
/// merging into cached messages.
fn parse_message_update(d: serde_json::Value) -> GatewayEvent {
    let field = |key: &str| d.get(key).and_then(|v| v.as_str()).map(str::to_string);

    match (field("id"), field("channel_id")) {
        (Some(id), Some(channel_id)) => GatewayEvent::MessageUpdate(RawMessageUpdate {
            id,
            channel_id,
            guild_id: field("guild_id"),
            data: d,
        }),
        _ => {
            warn!(event = "MESSAGE_UPDATE", "payload missing id or channel_id");
            GatewayEvent::Unknown {
                event_name: Some("MESSAGE_UPDATE".to_string()),
                op: 0,
                data: Some(d),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatch(name: &str, d: serde_json::Value) -> GatewayEvent {
        GatewayEvent::from_payload(GatewayPayload {
            op: 0,
            d: Some(d),
            s: Some(1),
            t: Some(name.to_string()),
        })
    }

    #[test]
    fn op_codes_map_to_control_events() {
        let hb = GatewayEvent::from_payload(GatewayPayload {
            op: 1,
            d: None,
            s: None,
            t: None,
        });
        assert!(matches!(hb, GatewayEvent::HeartbeatRequest));

        let invalid = GatewayEvent::from_payload(GatewayPayload {
            op: 9,
            d: Some(json!(true)),
            s: None,
            t: None,
        });
        assert!(matches!(invalid, GatewayEvent::InvalidSession(true)));

        let ack = GatewayEvent::from_payload(GatewayPayload {
            op: 11,
            d: None,
            s: None,
            t: None,
        });
        assert!(matches!(ack, GatewayEvent::HeartbeatAck));
    }

    #[test]
    fn message_create_is_typed() {
        let event = dispatch(
            "MESSAGE_CREATE",
            json!({
                "id": "1",
                "channel_id": "2",
                "author": { "id": "3", "username": "alice" },
                "content": "hello",
                "timestamp": "2024-01-01T00:00:00+00:00"
            }),
        );
        match event {
            GatewayEvent::MessageCreate(msg) => assert_eq!(msg.content, "hello"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn message_update_keeps_partial_payload() {
        let event = dispatch(
            "MESSAGE_UPDATE",
            json!({ "id": "1", "channel_id": "2", "content": "edited" }),
        );
        match event {
            GatewayEvent::MessageUpdate(raw) => {
                assert_eq!(raw.id, "1");
                assert_eq!(raw.channel_id, "2");
                assert_eq!(raw.data["content"], "edited");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn message_update_without_ids_is_unknown() {
        let event = dispatch("MESSAGE_UPDATE", json!({ "content": "edited" }));
        assert!(matches!(event, GatewayEvent::Unknown { .. }));
    }

    #[test]
    fn malformed_payload_becomes_unknown() {
        let event = dispatch("CHANNEL_CREATE", json!({ "name": "no id" }));
        match event {
            GatewayEvent::Unknown { event_name, data, .. } => {
                assert_eq!(event_name.as_deref(), Some("CHANNEL_CREATE"));
                assert!(data.is_some());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn relationship_and_call_events_are_typed() {
        let rel = dispatch(
            "RELATIONSHIP_ADD",
            json!({ "id": "5", "type": 1, "user": { "id": "5", "username": "bob" } }),
        );
        assert!(matches!(rel, GatewayEvent::RelationshipAdd(_)));

        let call = dispatch(
            "CALL_CREATE",
            json!({ "channel_id": "9", "message_id": "10", "region": "us-east", "ringing": ["5"] }),
        );
        assert!(matches!(call, GatewayEvent::CallCreate(_)));
        assert_eq!(call.name(), "CALL_CREATE");
    }

    #[test]
    fn resumed_needs_no_payload() {
        let event = GatewayEvent::from_payload(GatewayPayload {
            op: 0,
            d: None,
            s: Some(4),
            t: Some("RESUMED".to_string()),
        });
        assert!(matches!(event, GatewayEvent::Resumed));
    }

    #[test]
    fn unlogged_dispatch_keeps_its_name() {
        let event = dispatch("GUILD_ROLE_CREATE", json!({ "guild_id": "1" }));
        assert_eq!(event.name(), "GUILD_ROLE_CREATE");
    }
}
