//! Client-side cache that turns wire events into handler events.
//!
//! Gateway dispatches only carry the new state of an object. To hand
//! handlers a before/after pair we keep the last seen version of everything
//! that can be updated, plus a bounded window of recent messages.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{TimeZone, Utc};
use tracing::debug;

use crate::events::GatewayEvent;
use crate::handler::Event;
use crate::types::*;

/// Presences and voice states are scoped per guild (or `""` for DMs).
type ScopedKey = (Snowflake, Snowflake);

fn scoped(guild_id: Option<&str>, user_id: &str) -> ScopedKey {
    (guild_id.unwrap_or_default().to_string(), user_id.to_string())
}

// ---------------------------------------------------------------------------
// Message cache
// ---------------------------------------------------------------------------

/// FIFO of recent messages. The oldest message is evicted first once
/// `capacity` is exceeded.
#[derive(Debug)]
struct MessageCache {
    capacity: usize,
    order: VecDeque<Snowflake>,
    by_id: HashMap<Snowflake, Message>,
}

impl MessageCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(1024)),
            by_id: HashMap::new(),
        }
    }

    fn insert(&mut self, message: Message) {
        if self.capacity == 0 {
            return;
        }
        if self.by_id.insert(message.id.clone(), message.clone()).is_none() {
            self.order.push_back(message.id);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.by_id.remove(&oldest);
            }
        }
    }

    fn get(&self, id: &str) -> Option<&Message> {
        self.by_id.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.by_id.get_mut(id)
    }

    fn remove(&mut self, id: &str) -> Option<Message> {
        let message = self.by_id.remove(id)?;
        self.order.retain(|cached| cached != id);
        Some(message)
    }

    fn len(&self) -> usize {
        self.by_id.len()
    }
}

/// Overlay a partial MESSAGE_UPDATE payload onto a cached message.
fn merge_message(before: &Message, partial: &serde_json::Value) -> Option<Message> {
    let mut value = serde_json::to_value(before).ok()?;
    if let (Some(target), Some(update)) = (value.as_object_mut(), partial.as_object()) {
        for (key, field) in update {
            target.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value).ok()
}

// ---------------------------------------------------------------------------
// ClientState
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ClientState {
    user: Option<User>,
    users: HashMap<Snowflake, User>,
    guilds: HashMap<Snowflake, Guild>,
    /// Guilds announced in READY that haven't arrived via GUILD_CREATE yet.
    pending_guilds: HashSet<Snowflake>,
    channels: HashMap<Snowflake, Channel>,
    members: HashMap<ScopedKey, GuildMember>,
    presences: HashMap<ScopedKey, PresenceUpdate>,
    voice_states: HashMap<ScopedKey, VoiceState>,
    relationships: HashMap<Snowflake, Relationship>,
    suggestions: HashMap<Snowflake, User>,
    calls: HashMap<Snowflake, Call>,
    messages: MessageCache,
}

impl ClientState {
    pub fn new(message_cache: usize) -> Self {
        Self {
            user: None,
            users: HashMap::new(),
            guilds: HashMap::new(),
            pending_guilds: HashSet::new(),
            channels: HashMap::new(),
            members: HashMap::new(),
            presences: HashMap::new(),
            voice_states: HashMap::new(),
            relationships: HashMap::new(),
            suggestions: HashMap::new(),
            calls: HashMap::new(),
            messages: MessageCache::new(message_cache),
        }
    }

    /// The logged-in account, once READY has been seen.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn guild(&self, id: &str) -> Option<&Guild> {
        self.guilds.get(id)
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn cached_messages(&self) -> usize {
        self.messages.len()
    }

    /// Apply one wire event. Raw events come before the cooked events
    /// derived from the same dispatch.
    pub fn process(&mut self, event: GatewayEvent) -> Vec<Event> {
        let mut out = Vec::new();
        match event {
            GatewayEvent::Ready(ready) => self.on_ready(*ready),

            // ----- Guilds -----
            GatewayEvent::GuildCreate(guild) => {
                let announced = self.pending_guilds.remove(&guild.id);
                let guild = self.cache_guild(*guild);
                if !announced {
                    out.push(Event::GuildJoin(guild));
                }
            }
            GatewayEvent::GuildDelete(stub) => {
                if stub.unavailable {
                    self.pending_guilds.insert(stub.id);
                } else if let Some(guild) = self.forget_guild(&stub.id) {
                    out.push(Event::GuildRemove(guild));
                } else {
                    debug!(guild_id = %stub.id, "left uncached guild");
                }
            }
            GatewayEvent::GuildMemberAdd(member) => {
                self.cache_member(&member);
                out.push(Event::MemberJoin(member));
            }
            GatewayEvent::GuildMemberRemove(payload) => {
                let key = scoped(Some(payload.guild_id.as_str()), &payload.user.id);
                let member = self
                    .members
                    .remove(&key)
                    .unwrap_or_else(|| GuildMember::from_user(payload.user, payload.guild_id));
                out.push(Event::MemberRemove(member));
            }
            GatewayEvent::GuildMemberUpdate(after) => {
                if let Some(before) = self.cache_member(&after) {
                    out.push(Event::MemberUpdate { before, after });
                }
            }
            GatewayEvent::GuildBanAdd(ban) => match self.guilds.get(&ban.guild_id) {
                Some(guild) => out.push(Event::MemberBan {
                    guild: guild.clone(),
                    user: ban.user,
                }),
                None => debug!(guild_id = %ban.guild_id, "ban in uncached guild"),
            },
            GatewayEvent::GuildBanRemove(ban) => match self.guilds.get(&ban.guild_id) {
                Some(guild) => out.push(Event::MemberUnban {
                    guild: guild.clone(),
                    user: ban.user,
                }),
                None => debug!(guild_id = %ban.guild_id, "unban in uncached guild"),
            },

            // ----- Channels -----
            GatewayEvent::ChannelCreate(channel) => {
                self.cache_channel(channel.clone());
                out.push(if channel.is_private() {
                    Event::PrivateChannelCreate(channel)
                } else {
                    Event::GuildChannelCreate(channel)
                });
            }
            GatewayEvent::ChannelUpdate(after) => {
                match self.cache_channel(after.clone()) {
                    Some(before) if after.is_private() => {
                        out.push(Event::PrivateChannelUpdate { before, after })
                    }
                    Some(before) => out.push(Event::GuildChannelUpdate { before, after }),
                    None => debug!(channel_id = %after.id, "cached previously unseen channel"),
                }
            }
            GatewayEvent::ChannelDelete(channel) => {
                let channel = self.channels.remove(&channel.id).unwrap_or(channel);
                out.push(if channel.is_private() {
                    Event::PrivateChannelDelete(channel)
                } else {
                    Event::GuildChannelDelete(channel)
                });
            }
            GatewayEvent::ChannelPinsUpdate(pins) => match self.channels.get_mut(&pins.channel_id) {
                Some(channel) => {
                    channel.last_pin_timestamp = pins.last_pin_timestamp.clone();
                    let channel = channel.clone();
                    let last_pin = pins.last_pin_timestamp;
                    out.push(if channel.is_private() {
                        Event::PrivateChannelPinsUpdate { channel, last_pin }
                    } else {
                        Event::GuildChannelPinsUpdate { channel, last_pin }
                    });
                }
                None => debug!(channel_id = %pins.channel_id, "pins update for uncached channel"),
            },
            GatewayEvent::ChannelRecipientAdd(payload) => {
                self.users.insert(payload.user.id.clone(), payload.user.clone());
                match self.channels.get_mut(&payload.channel_id) {
                    Some(channel) => {
                        if !channel.recipients.iter().any(|u| u.id == payload.user.id) {
                            channel.recipients.push(payload.user.clone());
                        }
                        out.push(Event::GroupJoin {
                            channel: channel.clone(),
                            user: payload.user,
                        });
                    }
                    None => debug!(channel_id = %payload.channel_id, "recipient added to uncached group"),
                }
            }
            GatewayEvent::ChannelRecipientRemove(payload) => {
                match self.channels.get_mut(&payload.channel_id) {
                    Some(channel) => {
                        channel.recipients.retain(|u| u.id != payload.user.id);
                        out.push(Event::GroupRemove {
                            channel: channel.clone(),
                            user: payload.user,
                        });
                    }
                    None => debug!(channel_id = %payload.channel_id, "recipient removed from uncached group"),
                }
            }
            GatewayEvent::TypingStart(typing) => {
                let user = typing
                    .member
                    .as_ref()
                    .and_then(|m| m.user.clone())
                    .or_else(|| self.resolve_user(&typing.user_id));
                let channel = self.channels.get(&typing.channel_id).cloned();
                let when = Utc.timestamp_opt(typing.timestamp, 0).single();
                match (channel, user, when) {
                    (Some(channel), Some(user), Some(when)) => {
                        out.push(Event::Typing { channel, user, when })
                    }
                    _ => debug!(
                        channel_id = %typing.channel_id,
                        user_id = %typing.user_id,
                        "typing event could not be resolved"
                    ),
                }
            }

            // ----- Messages -----
            GatewayEvent::MessageCreate(message) => {
                let message = *message;
                self.users
                    .insert(message.author.id.clone(), message.author.clone());
                if let Some(channel) = self.channels.get_mut(&message.channel_id) {
                    channel.last_message_id = Some(message.id.clone());
                }
                self.messages.insert(message.clone());
                out.push(Event::Message(message));
            }
            GatewayEvent::MessageUpdate(raw) => {
                out.push(Event::RawMessageEdit(raw.clone()));
                if let Some(before) = self.messages.get(&raw.id).cloned() {
                    match merge_message(&before, &raw.data) {
                        Some(after) => {
                            self.messages.insert(after.clone());
                            out.push(Event::MessageEdit { before, after });
                        }
                        None => debug!(message_id = %raw.id, "message update did not merge"),
                    }
                }
            }
            GatewayEvent::MessageDelete(payload) => {
                let cached = self.messages.remove(&payload.id);
                out.push(Event::RawMessageDelete(payload));
                if let Some(message) = cached {
                    out.push(Event::MessageDelete(message));
                }
            }
            GatewayEvent::MessageDeleteBulk(payload) => {
                let found: Vec<Message> = payload
                    .ids
                    .iter()
                    .filter_map(|id| self.messages.remove(id))
                    .collect();
                if found.is_empty() {
                    debug!(count = payload.ids.len(), "bulk delete of uncached messages");
                } else {
                    out.push(Event::BulkMessageDelete(found));
                }
            }

            // ----- Reactions -----
            GatewayEvent::ReactionAdd(payload) => self.on_reaction_add(payload, &mut out),
            GatewayEvent::ReactionRemove(payload) => self.on_reaction_remove(payload, &mut out),
            GatewayEvent::ReactionRemoveAll(payload) => {
                let cleared = self.messages.get_mut(&payload.message_id).map(|message| {
                    let old = std::mem::take(&mut message.reactions);
                    let reactions = old
                        .iter()
                        .map(|r| Reaction::from_message(message, r))
                        .collect::<Vec<_>>();
                    (message.clone(), reactions)
                });
                out.push(Event::RawReactionClear(payload));
                if let Some((message, reactions)) = cleared {
                    out.push(Event::ReactionClear { message, reactions });
                }
            }
            GatewayEvent::ReactionRemoveEmoji(payload) => {
                let cleared = self.messages.get_mut(&payload.message_id).and_then(|message| {
                    let index = message
                        .reactions
                        .iter()
                        .position(|r| r.emoji == payload.emoji)?;
                    let removed = message.reactions.remove(index);
                    Some(Reaction::from_message(message, &removed))
                });
                out.push(Event::RawReactionClearEmoji(payload));
                if let Some(reaction) = cleared {
                    out.push(Event::ReactionClearEmoji(reaction));
                }
            }

            // ----- Presence, users, voice -----
            GatewayEvent::PresenceUpdate(after) => {
                let key = scoped(after.guild_id.as_deref(), &after.user.id);
                let before = self.presences.insert(key, after.clone());
                out.push(Event::PresenceUpdate { before, after });
            }
            GatewayEvent::UserUpdate(after) => {
                self.users.insert(after.id.clone(), after.clone());
                if let Some(before) = self.user.replace(after.clone()) {
                    out.push(Event::UserUpdate { before, after });
                }
            }
            GatewayEvent::VoiceStateUpdate(after) => {
                if let Some(member) = &after.member {
                    self.cache_member(member);
                }
                let user = after
                    .member
                    .as_ref()
                    .and_then(|m| m.user.clone())
                    .or_else(|| self.resolve_user(&after.user_id));
                let key = scoped(after.guild_id.as_deref(), &after.user_id);
                let before = if after.channel_id.is_some() {
                    self.voice_states.insert(key, after.clone())
                } else {
                    self.voice_states.remove(&key)
                };
                match user {
                    Some(user) => out.push(Event::VoiceStateUpdate {
                        user,
                        before,
                        after,
                    }),
                    None => debug!(user_id = %after.user_id, "voice state for unknown user"),
                }
            }

            // ----- Relationships -----
            GatewayEvent::RelationshipAdd(mut relationship) => {
                self.fill_relationship_user(&mut relationship);
                match self
                    .relationships
                    .insert(relationship.id.clone(), relationship.clone())
                {
                    Some(before) => out.push(Event::RelationshipUpdate {
                        before,
                        after: relationship,
                    }),
                    None => out.push(Event::RelationshipAdd(relationship)),
                }
            }
            GatewayEvent::RelationshipUpdate(mut after) => {
                if after.user.is_none() {
                    after.user = self
                        .relationships
                        .get(&after.id)
                        .and_then(|r| r.user.clone());
                }
                self.fill_relationship_user(&mut after);
                match self.relationships.insert(after.id.clone(), after.clone()) {
                    Some(before) => out.push(Event::RelationshipUpdate { before, after }),
                    None => debug!(user_id = %after.id, "cached previously unseen relationship"),
                }
            }
            GatewayEvent::RelationshipRemove(payload) => {
                let removed = self.relationships.remove(&payload.id).unwrap_or_else(|| {
                    Relationship {
                        user: self.users.get(&payload.id).cloned(),
                        id: payload.id,
                        kind: payload.kind,
                        nickname: None,
                        since: None,
                    }
                });
                out.push(Event::RelationshipRemove(removed));
            }
            GatewayEvent::FriendSuggestionCreate(suggestion) => {
                let user = suggestion.suggested_user;
                self.users.insert(user.id.clone(), user.clone());
                self.suggestions.insert(user.id.clone(), user.clone());
                out.push(Event::FriendSuggestionAdd(user));
            }
            GatewayEvent::FriendSuggestionDelete(payload) => {
                let user = self
                    .suggestions
                    .remove(&payload.suggested_user_id)
                    .or_else(|| self.users.get(&payload.suggested_user_id).cloned());
                match user {
                    Some(user) => out.push(Event::FriendSuggestionRemove(user)),
                    None => debug!(
                        user_id = %payload.suggested_user_id,
                        "removed suggestion for unknown user"
                    ),
                }
            }

            // ----- Calls -----
            GatewayEvent::CallCreate(call) => {
                self.calls.insert(call.channel_id.clone(), call.clone());
                out.push(Event::CallCreate(call));
            }
            GatewayEvent::CallUpdate(call) => {
                let before = self.calls.insert(call.channel_id.clone(), call.clone());
                out.push(Event::CallUpdate { call, before });
            }
            GatewayEvent::CallDelete(payload) => {
                self.calls.remove(&payload.channel_id);
            }

            GatewayEvent::Resumed
            | GatewayEvent::HeartbeatAck
            | GatewayEvent::HeartbeatRequest
            | GatewayEvent::Reconnect
            | GatewayEvent::InvalidSession(_)
            | GatewayEvent::Unknown { .. } => {}
        }
        out
    }

    // -- Helpers ------------------------------------------------------------

    fn on_ready(&mut self, ready: ReadyEvent) {
        self.users.insert(ready.user.id.clone(), ready.user.clone());
        self.user = Some(ready.user);
        for user in ready.users {
            self.users.insert(user.id.clone(), user);
        }
        for channel in ready.private_channels {
            self.cache_channel(channel);
        }
        for mut relationship in ready.relationships {
            self.fill_relationship_user(&mut relationship);
            self.relationships
                .insert(relationship.id.clone(), relationship);
        }
        for guild in ready.guilds {
            match guild {
                ReadyGuild::Available(guild) => {
                    self.cache_guild(*guild);
                }
                ReadyGuild::Unavailable(stub) => {
                    self.pending_guilds.insert(stub.id);
                }
            }
        }
        debug!(
            guilds = self.guilds.len(),
            pending = self.pending_guilds.len(),
            channels = self.channels.len(),
            "state seeded from READY"
        );
    }

    /// Cache a guild and its nested objects, returning the guild without
    /// them.
    fn cache_guild(&mut self, mut guild: Guild) -> Guild {
        for mut channel in guild.channels.drain(..) {
            channel.guild_id.get_or_insert_with(|| guild.id.clone());
            self.cache_channel(channel);
        }
        for mut member in guild.members.drain(..) {
            member.guild_id.get_or_insert_with(|| guild.id.clone());
            self.cache_member(&member);
        }
        for mut state in guild.voice_states.drain(..) {
            state.guild_id.get_or_insert_with(|| guild.id.clone());
            let key = scoped(state.guild_id.as_deref(), &state.user_id);
            self.voice_states.insert(key, state);
        }
        self.guilds.insert(guild.id.clone(), guild.clone());
        guild
    }

    fn forget_guild(&mut self, guild_id: &str) -> Option<Guild> {
        let guild = self.guilds.remove(guild_id)?;
        self.channels
            .retain(|_, c| c.guild_id.as_deref() != Some(guild_id));
        self.members.retain(|(gid, _), _| gid != guild_id);
        self.voice_states.retain(|(gid, _), _| gid != guild_id);
        self.presences.retain(|(gid, _), _| gid != guild_id);
        Some(guild)
    }

    fn cache_channel(&mut self, channel: Channel) -> Option<Channel> {
        for user in &channel.recipients {
            self.users.insert(user.id.clone(), user.clone());
        }
        self.channels.insert(channel.id.clone(), channel)
    }

    /// Returns the previously cached member, if any.
    fn cache_member(&mut self, member: &GuildMember) -> Option<GuildMember> {
        let user = member.user.as_ref()?;
        self.users.insert(user.id.clone(), user.clone());
        let key = scoped(member.guild_id.as_deref(), &user.id);
        self.members.insert(key, member.clone())
    }

    fn resolve_user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).cloned()
    }

    fn fill_relationship_user(&mut self, relationship: &mut Relationship) {
        match &relationship.user {
            Some(user) => {
                self.users.insert(user.id.clone(), user.clone());
            }
            None => relationship.user = self.resolve_user(&relationship.id),
        }
    }

    fn on_reaction_add(&mut self, payload: ReactionEvent, out: &mut Vec<Event>) {
        let user = payload
            .member
            .as_ref()
            .and_then(|m| m.user.clone())
            .or_else(|| self.resolve_user(&payload.user_id));
        let is_me = self.user.as_ref().is_some_and(|u| u.id == payload.user_id);

        let reaction = self.messages.get_mut(&payload.message_id).map(|message| {
            let index = match message
                .reactions
                .iter()
                .position(|r| r.emoji == payload.emoji)
            {
                Some(index) => {
                    let existing = &mut message.reactions[index];
                    existing.count += 1;
                    existing.me |= is_me;
                    index
                }
                None => {
                    message.reactions.push(MessageReaction {
                        count: 1,
                        me: is_me,
                        emoji: payload.emoji.clone(),
                    });
                    message.reactions.len() - 1
                }
            };
            Reaction::from_message(message, &message.reactions[index])
        });

        out.push(Event::RawReactionAdd(payload));
        match (reaction, user) {
            (Some(reaction), Some(user)) => out.push(Event::ReactionAdd { reaction, user }),
            (Some(_), None) => debug!("reaction added by unknown user"),
            (None, _) => {}
        }
    }

    fn on_reaction_remove(&mut self, payload: ReactionEvent, out: &mut Vec<Event>) {
        let user = self.resolve_user(&payload.user_id);
        let is_me = self.user.as_ref().is_some_and(|u| u.id == payload.user_id);

        let reaction = self.messages.get_mut(&payload.message_id).and_then(|message| {
            let index = message
                .reactions
                .iter()
                .position(|r| r.emoji == payload.emoji)?;
            let existing = &mut message.reactions[index];
            existing.count = existing.count.saturating_sub(1);
            if is_me {
                existing.me = false;
            }
            let reaction = Reaction::from_message(message, &message.reactions[index]);
            if message.reactions[index].count == 0 {
                message.reactions.remove(index);
            }
            Some(reaction)
        });

        match (reaction, user) {
            (Some(reaction), Some(user)) => out.push(Event::ReactionRemove { reaction, user }),
            (Some(_), None) => debug!(user_id = %payload.user_id, "reaction removed by unknown user"),
            (None, _) => {}
        }
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MESSAGE_CACHE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::*;
    use serde_json::json;

    fn ready(me: User) -> GatewayEvent {
        GatewayEvent::Ready(Box::new(ReadyEvent {
            v: 9,
            user: me,
            session_id: "s".into(),
            resume_gateway_url: "wss://gateway.discord.gg".into(),
            guilds: vec![ReadyGuild::Unavailable(UnavailableGuild {
                id: "100".into(),
                unavailable: true,
            })],
            application: None,
            private_channels: vec![group_channel("20", vec![user("2", "bob")])],
            relationships: vec![Relationship {
                id: "2".into(),
                kind: RelationshipType::Friend,
                user: None,
                nickname: None,
                since: None,
            }],
            users: vec![user("2", "bob")],
        }))
    }

    fn seeded() -> ClientState {
        let mut state = ClientState::new(10);
        assert!(state.process(ready(user("1", "me"))).is_empty());
        state
    }

    fn create(message: Message) -> GatewayEvent {
        GatewayEvent::MessageCreate(Box::new(message))
    }

    fn reaction_event(user_id: &str, message_id: &str, emoji: &str) -> ReactionEvent {
        ReactionEvent {
            user_id: user_id.into(),
            channel_id: "20".into(),
            message_id: message_id.into(),
            guild_id: None,
            member: None,
            emoji: unicode_emoji(emoji),
        }
    }

    fn names(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(Event::name).collect()
    }

    // -- READY & guilds -----------------------------------------------------

    #[test]
    fn ready_seeds_user_channels_and_relationships() {
        let mut state = seeded();
        assert_eq!(state.user().unwrap().id, "1");
        assert!(state.channel("20").is_some());

        let removed = state.process(GatewayEvent::RelationshipRemove(RelationshipRemove {
            id: "2".into(),
            kind: RelationshipType::Friend,
        }));
        match &removed[..] {
            [Event::RelationshipRemove(r)] => {
                assert_eq!(r.user.as_ref().unwrap().username, "bob")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn guild_create_joins_only_unannounced_guilds() {
        let mut state = seeded();
        let announced = state.process(GatewayEvent::GuildCreate(Box::new(guild("100", "a"))));
        assert!(announced.is_empty());

        let mut fresh = guild("200", "b");
        fresh.channels.push(guild_channel("201", "200", "general"));
        let joined = state.process(GatewayEvent::GuildCreate(Box::new(fresh)));
        match &joined[..] {
            [Event::GuildJoin(g)] => {
                assert_eq!(g.id, "200");
                assert!(g.channels.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(state.channel("201").is_some());
    }

    #[test]
    fn unknown_channel_type_does_not_lose_the_guild() {
        let mut state = seeded();
        let event = GatewayEvent::from_payload(crate::types::GatewayPayload {
            op: 0,
            s: Some(2),
            t: Some("GUILD_CREATE".into()),
            d: Some(json!({
                "id": "300",
                "name": "c",
                "channels": [
                    { "id": "301", "type": 0, "guild_id": "300", "name": "general" },
                    { "id": "302", "type": 99, "guild_id": "300", "name": "future" },
                ],
            })),
        });

        assert_eq!(names(&state.process(event)), vec!["on_guild_join"]);
        assert!(state.channel("301").is_some());
        assert_eq!(state.channel("302").unwrap().kind, ChannelType::Other(99));
    }

    #[test]
    fn guild_delete_removes_guild_and_channels() {
        let mut state = seeded();
        let mut g = guild("200", "b");
        g.channels.push(guild_channel("201", "200", "general"));
        state.process(GatewayEvent::GuildCreate(Box::new(g)));

        let out = state.process(GatewayEvent::GuildDelete(UnavailableGuild {
            id: "200".into(),
            unavailable: false,
        }));
        assert_eq!(names(&out), vec!["on_guild_remove"]);
        assert!(state.channel("201").is_none());
        assert!(state.guild("200").is_none());
    }

    #[test]
    fn outage_does_not_count_as_leaving() {
        let mut state = seeded();
        state.process(GatewayEvent::GuildCreate(Box::new(guild("200", "b"))));
        let out = state.process(GatewayEvent::GuildDelete(UnavailableGuild {
            id: "200".into(),
            unavailable: true,
        }));
        assert!(out.is_empty());
        // Coming back after an outage is not a join.
        let back = state.process(GatewayEvent::GuildCreate(Box::new(guild("200", "b"))));
        assert!(back.is_empty());
    }

    #[test]
    fn bans_need_a_cached_guild() {
        let mut state = seeded();
        let ban = GuildBan {
            guild_id: "300".into(),
            user: user("3", "eve"),
        };
        assert!(state.process(GatewayEvent::GuildBanAdd(ban.clone())).is_empty());

        state.process(GatewayEvent::GuildCreate(Box::new(guild("300", "c"))));
        let out = state.process(GatewayEvent::GuildBanAdd(ban));
        assert_eq!(names(&out), vec!["on_member_ban"]);
    }

    // -- Members ------------------------------------------------------------

    #[test]
    fn member_update_pairs_with_cached_member() {
        let mut state = seeded();
        let before = member(user("3", "eve"), "300");
        // First sighting is cached silently.
        assert!(state
            .process(GatewayEvent::GuildMemberUpdate(before.clone()))
            .is_empty());

        let mut after = before.clone();
        after.nick = Some("evie".into());
        let out = state.process(GatewayEvent::GuildMemberUpdate(after.clone()));
        assert_eq!(out, vec![Event::MemberUpdate { before, after }]);
    }

    #[test]
    fn member_remove_prefers_cached_member() {
        let mut state = seeded();
        let mut joined = member(user("3", "eve"), "300");
        joined.nick = Some("evie".into());
        state.process(GatewayEvent::GuildMemberAdd(joined.clone()));

        let out = state.process(GatewayEvent::GuildMemberRemove(GuildMemberRemove {
            guild_id: "300".into(),
            user: user("3", "eve"),
        }));
        assert_eq!(out, vec![Event::MemberRemove(joined)]);
    }

    // -- Channels -----------------------------------------------------------

    #[test]
    fn channel_events_split_by_privacy() {
        let mut state = seeded();
        let out = state.process(GatewayEvent::ChannelCreate(guild_channel("5", "100", "a")));
        assert_eq!(names(&out), vec!["on_guild_channel_create"]);

        let mut renamed = guild_channel("5", "100", "b");
        renamed.topic = Some("t".into());
        let out = state.process(GatewayEvent::ChannelUpdate(renamed));
        match &out[..] {
            [Event::GuildChannelUpdate { before, after }] => {
                assert_eq!(before.name.as_deref(), Some("a"));
                assert_eq!(after.name.as_deref(), Some("b"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let out = state.process(GatewayEvent::ChannelDelete(group_channel("20", vec![])));
        assert_eq!(names(&out), vec!["on_private_channel_delete"]);
    }

    #[test]
    fn pins_update_records_timestamp() {
        let mut state = seeded();
        let out = state.process(GatewayEvent::ChannelPinsUpdate(ChannelPinsUpdate {
            guild_id: None,
            channel_id: "20".into(),
            last_pin_timestamp: Some("2024-01-01T00:00:00+00:00".into()),
        }));
        assert_eq!(names(&out), vec!["on_private_channel_pins_update"]);
        assert!(state.channel("20").unwrap().last_pin_timestamp.is_some());

        let missing = state.process(GatewayEvent::ChannelPinsUpdate(ChannelPinsUpdate {
            guild_id: None,
            channel_id: "404".into(),
            last_pin_timestamp: None,
        }));
        assert!(missing.is_empty());
    }

    #[test]
    fn recipients_are_tracked() {
        let mut state = seeded();
        let carol = user("4", "carol");
        let out = state.process(GatewayEvent::ChannelRecipientAdd(ChannelRecipient {
            channel_id: "20".into(),
            user: carol.clone(),
        }));
        assert_eq!(names(&out), vec!["on_group_join"]);
        assert_eq!(state.channel("20").unwrap().recipients.len(), 2);

        state.process(GatewayEvent::ChannelRecipientRemove(ChannelRecipient {
            channel_id: "20".into(),
            user: carol,
        }));
        assert_eq!(state.channel("20").unwrap().recipients.len(), 1);
    }

    #[test]
    fn typing_resolves_user_and_time() {
        let mut state = seeded();
        let out = state.process(GatewayEvent::TypingStart(TypingStart {
            channel_id: "20".into(),
            guild_id: None,
            user_id: "2".into(),
            timestamp: 1_700_000_000,
            member: None,
        }));
        match &out[..] {
            [Event::Typing { user, when, .. }] => {
                assert_eq!(user.username, "bob");
                assert_eq!(when.timestamp(), 1_700_000_000);
            }
            other => panic!("unexpected {:?}", other),
        }

        let unknown = state.process(GatewayEvent::TypingStart(TypingStart {
            channel_id: "20".into(),
            guild_id: None,
            user_id: "999".into(),
            timestamp: 1_700_000_000,
            member: None,
        }));
        assert!(unknown.is_empty());
    }

    // -- Messages -----------------------------------------------------------

    #[test]
    fn edit_merges_partial_payload() {
        let mut state = seeded();
        state.process(create(message("10", "20", user("2", "bob"), "hello")));

        let out = state.process(GatewayEvent::MessageUpdate(RawMessageUpdate {
            id: "10".into(),
            channel_id: "20".into(),
            guild_id: None,
            data: json!({"id": "10", "channel_id": "20", "content": "hello!"}),
        }));
        assert_eq!(names(&out), vec!["on_raw_message_edit", "on_message_edit"]);
        match &out[1] {
            Event::MessageEdit { before, after } => {
                assert_eq!(before.content, "hello");
                assert_eq!(after.content, "hello!");
                assert_eq!(after.author, before.author);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(state.message("10").unwrap().content, "hello!");
    }

    #[test]
    fn uncached_edit_and_delete_only_fire_raw_events() {
        let mut state = seeded();
        let edit = state.process(GatewayEvent::MessageUpdate(RawMessageUpdate {
            id: "77".into(),
            channel_id: "20".into(),
            guild_id: None,
            data: json!({"id": "77", "channel_id": "20"}),
        }));
        assert_eq!(names(&edit), vec!["on_raw_message_edit"]);

        let delete = state.process(GatewayEvent::MessageDelete(MessageDelete {
            id: "77".into(),
            channel_id: "20".into(),
            guild_id: None,
        }));
        assert_eq!(names(&delete), vec!["on_raw_message_delete"]);
    }

    #[test]
    fn delete_of_cached_message_fires_raw_then_cooked() {
        let mut state = seeded();
        state.process(create(message("10", "20", user("2", "bob"), "bye")));
        let out = state.process(GatewayEvent::MessageDelete(MessageDelete {
            id: "10".into(),
            channel_id: "20".into(),
            guild_id: None,
        }));
        assert_eq!(names(&out), vec!["on_raw_message_delete", "on_message_delete"]);
        assert_eq!(state.cached_messages(), 0);
    }

    #[test]
    fn bulk_delete_collects_cached_messages() {
        let mut state = seeded();
        for id in ["10", "11", "12"] {
            state.process(create(message(id, "20", user("2", "bob"), id)));
        }
        let out = state.process(GatewayEvent::MessageDeleteBulk(MessageDeleteBulk {
            ids: vec!["10".into(), "12".into(), "99".into()],
            channel_id: "20".into(),
            guild_id: None,
        }));
        match &out[..] {
            [Event::BulkMessageDelete(messages)] => assert_eq!(messages.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(state.cached_messages(), 1);
    }

    #[test]
    fn message_cache_evicts_oldest_first() {
        let mut state = ClientState::new(2);
        for id in ["1", "2", "3"] {
            state.process(create(message(id, "20", user("2", "bob"), id)));
        }
        assert_eq!(state.cached_messages(), 2);
        assert!(state.message("1").is_none());
        assert!(state.message("3").is_some());
    }

    #[test]
    fn zero_capacity_caches_nothing() {
        let mut state = ClientState::new(0);
        let out = state.process(create(message("1", "20", user("2", "bob"), "x")));
        assert_eq!(names(&out), vec!["on_message"]);
        assert_eq!(state.cached_messages(), 0);
    }

    // -- Reactions ----------------------------------------------------------

    #[test]
    fn reaction_add_and_remove_update_counts() {
        let mut state = seeded();
        state.process(create(message("10", "20", user("2", "bob"), "hi")));

        let out = state.process(GatewayEvent::ReactionAdd(reaction_event("2", "10", "👍")));
        assert_eq!(names(&out), vec!["on_raw_reaction_add", "on_reaction_add"]);
        let out = state.process(GatewayEvent::ReactionAdd(reaction_event("1", "10", "👍")));
        match &out[1] {
            Event::ReactionAdd { reaction, .. } => {
                assert_eq!(reaction.count, 2);
                assert!(reaction.me);
            }
            other => panic!("unexpected {:?}", other),
        }

        let out = state.process(GatewayEvent::ReactionRemove(reaction_event("1", "10", "👍")));
        match &out[..] {
            [Event::ReactionRemove { reaction, user }] => {
                assert_eq!(reaction.count, 1);
                assert!(!reaction.me);
                assert_eq!(user.id, "1");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(state.message("10").unwrap().reactions.len(), 1);
    }

    #[test]
    fn reaction_on_uncached_message_is_raw_only() {
        let mut state = seeded();
        let out = state.process(GatewayEvent::ReactionAdd(reaction_event("2", "404", "🔥")));
        assert_eq!(names(&out), vec!["on_raw_reaction_add"]);
        let out = state.process(GatewayEvent::ReactionRemove(reaction_event("2", "404", "🔥")));
        assert!(out.is_empty());
    }

    #[test]
    fn clearing_reactions_reports_old_reactions() {
        let mut state = seeded();
        state.process(create(message("10", "20", user("2", "bob"), "hi")));
        state.process(GatewayEvent::ReactionAdd(reaction_event("2", "10", "👍")));
        state.process(GatewayEvent::ReactionAdd(reaction_event("2", "10", "🔥")));

        let out = state.process(GatewayEvent::ReactionRemoveEmoji(ReactionRemoveEmoji {
            channel_id: "20".into(),
            message_id: "10".into(),
            guild_id: None,
            emoji: unicode_emoji("🔥"),
        }));
        assert_eq!(
            names(&out),
            vec!["on_raw_reaction_clear_emoji", "on_reaction_clear_emoji"]
        );

        let out = state.process(GatewayEvent::ReactionRemoveAll(ReactionRemoveAll {
            channel_id: "20".into(),
            message_id: "10".into(),
            guild_id: None,
        }));
        match &out[..] {
            [Event::RawReactionClear(_), Event::ReactionClear { message, reactions }] => {
                assert!(message.reactions.is_empty());
                assert_eq!(reactions.len(), 1);
                assert_eq!(reactions[0].emoji, unicode_emoji("👍"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    // -- Presence, voice, relationships, calls -----------------------------

    #[test]
    fn presence_before_is_optional() {
        let mut state = seeded();
        let presence = PresenceUpdate {
            user: PartialUser {
                id: "2".into(),
                username: None,
                avatar: None,
                bot: false,
            },
            guild_id: Some("100".into()),
            status: Some("online".into()),
            activities: Vec::new(),
        };
        let first = state.process(GatewayEvent::PresenceUpdate(presence.clone()));
        assert!(matches!(&first[..], [Event::PresenceUpdate { before: None, .. }]));

        let mut idle = presence;
        idle.status = Some("idle".into());
        let second = state.process(GatewayEvent::PresenceUpdate(idle));
        match &second[..] {
            [Event::PresenceUpdate {
                before: Some(before),
                after,
            }] => {
                assert_eq!(before.status.as_deref(), Some("online"));
                assert_eq!(after.status.as_deref(), Some("idle"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn voice_state_leave_reports_previous_state() {
        let mut state = seeded();
        state.process(GatewayEvent::VoiceStateUpdate(voice_state("2", Some("30"))));
        let out = state.process(GatewayEvent::VoiceStateUpdate(voice_state("2", None)));
        match &out[..] {
            [Event::VoiceStateUpdate {
                user,
                before: Some(before),
                after,
            }] => {
                assert_eq!(user.username, "bob");
                assert_eq!(before.channel_id.as_deref(), Some("30"));
                assert!(after.channel_id.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn relationship_add_for_known_user_is_an_update() {
        let mut state = seeded();
        let out = state.process(GatewayEvent::RelationshipAdd(relationship(
            user("2", "bob"),
            RelationshipType::Blocked,
        )));
        assert_eq!(names(&out), vec!["on_relationship_update"]);

        let out = state.process(GatewayEvent::RelationshipAdd(relationship(
            user("5", "dan"),
            RelationshipType::IncomingRequest,
        )));
        assert_eq!(names(&out), vec!["on_relationship_add"]);
    }

    #[test]
    fn friend_suggestions_round_trip_through_cache() {
        let mut state = seeded();
        state.process(GatewayEvent::FriendSuggestionCreate(FriendSuggestion {
            suggested_user: user("6", "fay"),
            reasons: Vec::new(),
        }));
        let out = state.process(GatewayEvent::FriendSuggestionDelete(FriendSuggestionDelete {
            suggested_user_id: "6".into(),
        }));
        assert_eq!(out, vec![Event::FriendSuggestionRemove(user("6", "fay"))]);
    }

    #[test]
    fn call_update_carries_previous_call() {
        let mut state = seeded();
        let call = Call {
            channel_id: "20".into(),
            message_id: Some("50".into()),
            region: Some("us-east".into()),
            ringing: vec!["2".into()],
            unavailable: false,
        };
        state.process(GatewayEvent::CallCreate(call.clone()));
        let mut answered = call.clone();
        answered.ringing.clear();
        let out = state.process(GatewayEvent::CallUpdate(answered.clone()));
        assert_eq!(
            out,
            vec![Event::CallUpdate {
                call: answered,
                before: Some(call),
            }]
        );
    }

    #[test]
    fn user_update_needs_ready() {
        let mut fresh = ClientState::default();
        assert!(fresh
            .process(GatewayEvent::UserUpdate(user("1", "me")))
            .is_empty());

        let mut state = seeded();
        let out = state.process(GatewayEvent::UserUpdate(user("1", "me2")));
        assert_eq!(names(&out), vec!["on_user_update"]);
        assert_eq!(state.user().unwrap().username, "me2");
    }
}
