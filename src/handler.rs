//! The event interface between the client layer and event consumers.
//!
//! [`ClientState`](crate::state::ClientState) turns wire events into
//! [`Event`]s carrying before/after values; an [`EventHandler`] reacts to them
//! with one method per kind. Handlers that need to look something up go
//! through [`Lookup`] instead of holding a client directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A client-level event, ready to hand to an [`EventHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // Channels
    GuildChannelCreate(Channel),
    GuildChannelUpdate { before: Channel, after: Channel },
    GuildChannelDelete(Channel),
    GuildChannelPinsUpdate { channel: Channel, last_pin: Option<String> },
    PrivateChannelCreate(Channel),
    PrivateChannelUpdate { before: Channel, after: Channel },
    PrivateChannelDelete(Channel),
    PrivateChannelPinsUpdate { channel: Channel, last_pin: Option<String> },
    GroupJoin { channel: Channel, user: User },
    GroupRemove { channel: Channel, user: User },
    Typing { channel: Channel, user: User, when: DateTime<Utc> },

    // Relationships
    RelationshipAdd(Relationship),
    RelationshipRemove(Relationship),
    RelationshipUpdate { before: Relationship, after: Relationship },
    FriendSuggestionAdd(User),
    FriendSuggestionRemove(User),

    // Calls
    CallCreate(Call),
    CallUpdate { call: Call, before: Option<Call> },

    // Guilds
    GuildJoin(Guild),
    GuildRemove(Guild),

    // Members
    MemberJoin(GuildMember),
    MemberRemove(GuildMember),
    MemberUpdate { before: GuildMember, after: GuildMember },
    UserUpdate { before: User, after: User },
    MemberBan { guild: Guild, user: User },
    MemberUnban { guild: Guild, user: User },
    PresenceUpdate { before: Option<PresenceUpdate>, after: PresenceUpdate },

    // Messages
    Message(Message),
    MessageEdit { before: Message, after: Message },
    MessageDelete(Message),
    BulkMessageDelete(Vec<Message>),
    RawMessageEdit(RawMessageUpdate),
    RawMessageDelete(MessageDelete),

    // Reactions
    ReactionAdd { reaction: Reaction, user: User },
    ReactionRemove { reaction: Reaction, user: User },
    ReactionClear { message: Message, reactions: Vec<Reaction> },
    ReactionClearEmoji(Reaction),
    RawReactionAdd(ReactionEvent),
    RawReactionClear(ReactionRemoveAll),
    RawReactionClearEmoji(ReactionRemoveEmoji),

    // Voice
    VoiceStateUpdate { user: User, before: Option<VoiceState>, after: VoiceState },
}

impl Event {
    /// Name of the handler method this event is delivered to.
    pub fn name(&self) -> &'static str {
        match self {
            Event::GuildChannelCreate(_) => "on_guild_channel_create",
            Event::GuildChannelUpdate { .. } => "on_guild_channel_update",
            Event::GuildChannelDelete(_) => "on_guild_channel_delete",
            Event::GuildChannelPinsUpdate { .. } => "on_guild_channel_pins_update",
            Event::PrivateChannelCreate(_) => "on_private_channel_create",
            Event::PrivateChannelUpdate { .. } => "on_private_channel_update",
            Event::PrivateChannelDelete(_) => "on_private_channel_delete",
            Event::PrivateChannelPinsUpdate { .. } => "on_private_channel_pins_update",
            Event::GroupJoin { .. } => "on_group_join",
            Event::GroupRemove { .. } => "on_group_remove",
            Event::Typing { .. } => "on_typing",
            Event::RelationshipAdd(_) => "on_relationship_add",
            Event::RelationshipRemove(_) => "on_relationship_remove",
            Event::RelationshipUpdate { .. } => "on_relationship_update",
            Event::FriendSuggestionAdd(_) => "on_friend_suggestion_add",
            Event::FriendSuggestionRemove(_) => "on_friend_suggestion_remove",
            Event::CallCreate(_) => "on_call_create",
            Event::CallUpdate { .. } => "on_call_update",
            Event::GuildJoin(_) => "on_guild_join",
            Event::GuildRemove(_) => "on_guild_remove",
            Event::MemberJoin(_) => "on_member_join",
            Event::MemberRemove(_) => "on_member_remove",
            Event::MemberUpdate { .. } => "on_member_update",
            Event::UserUpdate { .. } => "on_user_update",
            Event::MemberBan { .. } => "on_member_ban",
            Event::MemberUnban { .. } => "on_member_unban",
            Event::PresenceUpdate { .. } => "on_presence_update",
            Event::Message(_) => "on_message",
            Event::MessageEdit { .. } => "on_message_edit",
            Event::MessageDelete(_) => "on_message_delete",
            Event::BulkMessageDelete(_) => "on_bulk_message_delete",
            Event::RawMessageEdit(_) => "on_raw_message_edit",
            Event::RawMessageDelete(_) => "on_raw_message_delete",
            Event::ReactionAdd { .. } => "on_reaction_add",
            Event::ReactionRemove { .. } => "on_reaction_remove",
            Event::ReactionClear { .. } => "on_reaction_clear",
            Event::ReactionClearEmoji(_) => "on_reaction_clear_emoji",
            Event::RawReactionAdd(_) => "on_raw_reaction_add",
            Event::RawReactionClear(_) => "on_raw_reaction_clear",
            Event::RawReactionClearEmoji(_) => "on_raw_reaction_clear_emoji",
            Event::VoiceStateUpdate { .. } => "on_voice_state_update",
        }
    }

    /// Whether handling this event goes through [`Lookup`] and may suspend.
    pub fn needs_lookup(&self) -> bool {
        matches!(self, Event::RawMessageEdit(_) | Event::RawMessageDelete(_))
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// On-demand fetches a handler may perform.
#[async_trait]
pub trait Lookup: Send + Sync {
    async fn fetch_channel(&self, channel_id: &str) -> Result<Channel>;

    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<Message>;
}

// ---------------------------------------------------------------------------
// EventHandler
// ---------------------------------------------------------------------------

/// One method per [`Event`] kind. Every method defaults to doing nothing.
#[async_trait]
#[allow(unused_variables)]
pub trait EventHandler: Send + Sync {
    async fn on_guild_channel_create(&self, channel: Channel) -> Result<()> {
        Ok(())
    }
    async fn on_guild_channel_update(&self, before: Channel, after: Channel) -> Result<()> {
        Ok(())
    }
    async fn on_guild_channel_delete(&self, channel: Channel) -> Result<()> {
        Ok(())
    }
    async fn on_guild_channel_pins_update(
        &self,
        channel: Channel,
        last_pin: Option<String>,
    ) -> Result<()> {
        Ok(())
    }
    async fn on_private_channel_create(&self, channel: Channel) -> Result<()> {
        Ok(())
    }
    async fn on_private_channel_update(&self, before: Channel, after: Channel) -> Result<()> {
        Ok(())
    }
    async fn on_private_channel_delete(&self, channel: Channel) -> Result<()> {
        Ok(())
    }
    async fn on_private_channel_pins_update(
        &self,
        channel: Channel,
        last_pin: Option<String>,
    ) -> Result<()> {
        Ok(())
    }
    async fn on_group_join(&self, channel: Channel, user: User) -> Result<()> {
        Ok(())
    }
    async fn on_group_remove(&self, channel: Channel, user: User) -> Result<()> {
        Ok(())
    }
    async fn on_typing(&self, channel: Channel, user: User, when: DateTime<Utc>) -> Result<()> {
        Ok(())
    }

    async fn on_relationship_add(&self, relationship: Relationship) -> Result<()> {
        Ok(())
    }
    async fn on_relationship_remove(&self, relationship: Relationship) -> Result<()> {
        Ok(())
    }
    async fn on_relationship_update(
        &self,
        before: Relationship,
        after: Relationship,
    ) -> Result<()> {
        Ok(())
    }
    async fn on_friend_suggestion_add(&self, user: User) -> Result<()> {
        Ok(())
    }
    async fn on_friend_suggestion_remove(&self, user: User) -> Result<()> {
        Ok(())
    }

    async fn on_call_create(&self, call: Call) -> Result<()> {
        Ok(())
    }
    async fn on_call_update(&self, call: Call, before: Option<Call>) -> Result<()> {
        Ok(())
    }

    async fn on_guild_join(&self, guild: Guild) -> Result<()> {
        Ok(())
    }
    async fn on_guild_remove(&self, guild: Guild) -> Result<()> {
        Ok(())
    }

    async fn on_member_join(&self, member: GuildMember) -> Result<()> {
        Ok(())
    }
    async fn on_member_remove(&self, member: GuildMember) -> Result<()> {
        Ok(())
    }
    async fn on_member_update(&self, before: GuildMember, after: GuildMember) -> Result<()> {
        Ok(())
    }
    async fn on_user_update(&self, before: User, after: User) -> Result<()> {
        Ok(())
    }
    async fn on_member_ban(&self, guild: Guild, user: User) -> Result<()> {
        Ok(())
    }
    async fn on_member_unban(&self, guild: Guild, user: User) -> Result<()> {
        Ok(())
    }
    async fn on_presence_update(
        &self,
        before: Option<PresenceUpdate>,
        after: PresenceUpdate,
    ) -> Result<()> {
        Ok(())
    }

    async fn on_message(&self, message: Message) -> Result<()> {
        Ok(())
    }
    async fn on_message_edit(&self, before: Message, after: Message) -> Result<()> {
        Ok(())
    }
    async fn on_message_delete(&self, message: Message) -> Result<()> {
        Ok(())
    }
    async fn on_bulk_message_delete(&self, messages: Vec<Message>) -> Result<()> {
        Ok(())
    }
    async fn on_raw_message_edit(&self, payload: RawMessageUpdate) -> Result<()> {
        Ok(())
    }
    async fn on_raw_message_delete(&self, payload: MessageDelete) -> Result<()> {
        Ok(())
    }

    async fn on_reaction_add(&self, reaction: Reaction, user: User) -> Result<()> {
        Ok(())
    }
    async fn on_reaction_remove(&self, reaction: Reaction, user: User) -> Result<()> {
        Ok(())
    }
    async fn on_reaction_clear(&self, message: Message, reactions: Vec<Reaction>) -> Result<()> {
        Ok(())
    }
    async fn on_reaction_clear_emoji(&self, reaction: Reaction) -> Result<()> {
        Ok(())
    }
    async fn on_raw_reaction_add(&self, payload: ReactionEvent) -> Result<()> {
        Ok(())
    }
    async fn on_raw_reaction_clear(&self, payload: ReactionRemoveAll) -> Result<()> {
        Ok(())
    }
    async fn on_raw_reaction_clear_emoji(&self, payload: ReactionRemoveEmoji) -> Result<()> {
        Ok(())
    }

    async fn on_voice_state_update(
        &self,
        user: User,
        before: Option<VoiceState>,
        after: VoiceState,
    ) -> Result<()> {
        Ok(())
    }

    /// Route an [`Event`] to its method.
    async fn handle(&self, event: Event) -> Result<()> {
        match event {
            Event::GuildChannelCreate(c) => self.on_guild_channel_create(c).await,
            Event::GuildChannelUpdate { before, after } => {
                self.on_guild_channel_update(before, after).await
            }
            Event::GuildChannelDelete(c) => self.on_guild_channel_delete(c).await,
            Event::GuildChannelPinsUpdate { channel, last_pin } => {
                self.on_guild_channel_pins_update(channel, last_pin).await
            }
            Event::PrivateChannelCreate(c) => self.on_private_channel_create(c).await,
            Event::PrivateChannelUpdate { before, after } => {
                self.on_private_channel_update(before, after).await
            }
            Event::PrivateChannelDelete(c) => self.on_private_channel_delete(c).await,
            Event::PrivateChannelPinsUpdate { channel, last_pin } => {
                self.on_private_channel_pins_update(channel, last_pin).await
            }
            Event::GroupJoin { channel, user } => self.on_group_join(channel, user).await,
            Event::GroupRemove { channel, user } => self.on_group_remove(channel, user).await,
            Event::Typing {
                channel,
                user,
                when,
            } => self.on_typing(channel, user, when).await,

            Event::RelationshipAdd(r) => self.on_relationship_add(r).await,
            Event::RelationshipRemove(r) => self.on_relationship_remove(r).await,
            Event::RelationshipUpdate { before, after } => {
                self.on_relationship_update(before, after).await
            }
            Event::FriendSuggestionAdd(u) => self.on_friend_suggestion_add(u).await,
            Event::FriendSuggestionRemove(u) => self.on_friend_suggestion_remove(u).await,

            Event::CallCreate(call) => self.on_call_create(call).await,
            Event::CallUpdate { call, before } => self.on_call_update(call, before).await,

            Event::GuildJoin(g) => self.on_guild_join(g).await,
            Event::GuildRemove(g) => self.on_guild_remove(g).await,

            Event::MemberJoin(m) => self.on_member_join(m).await,
            Event::MemberRemove(m) => self.on_member_remove(m).await,
            Event::MemberUpdate { before, after } => self.on_member_update(before, after).await,
            Event::UserUpdate { before, after } => self.on_user_update(before, after).await,
            Event::MemberBan { guild, user } => self.on_member_ban(guild, user).await,
            Event::MemberUnban { guild, user } => self.on_member_unban(guild, user).await,
            Event::PresenceUpdate { before, after } => {
                self.on_presence_update(before, after).await
            }

            Event::Message(m) => self.on_message(m).await,
            Event::MessageEdit { before, after } => self.on_message_edit(before, after).await,
            Event::MessageDelete(m) => self.on_message_delete(m).await,
            Event::BulkMessageDelete(ms) => self.on_bulk_message_delete(ms).await,
            Event::RawMessageEdit(p) => self.on_raw_message_edit(p).await,
            Event::RawMessageDelete(p) => self.on_raw_message_delete(p).await,

            Event::ReactionAdd { reaction, user } => self.on_reaction_add(reaction, user).await,
            Event::ReactionRemove { reaction, user } => {
                self.on_reaction_remove(reaction, user).await
            }
            Event::ReactionClear { message, reactions } => {
                self.on_reaction_clear(message, reactions).await
            }
            Event::ReactionClearEmoji(r) => self.on_reaction_clear_emoji(r).await,
            Event::RawReactionAdd(p) => self.on_raw_reaction_add(p).await,
            Event::RawReactionClear(p) => self.on_raw_reaction_clear(p).await,
            Event::RawReactionClearEmoji(p) => self.on_raw_reaction_clear_emoji(p).await,

            Event::VoiceStateUpdate {
                user,
                before,
                after,
            } => self.on_voice_state_update(user, before, after).await,
        }
    }
}
