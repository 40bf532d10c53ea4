//! The event logger: one INFO record per handled event.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::handler::{EventHandler, Lookup};
use crate::logging::Logger;
use crate::types::*;

/// `[a, b, c]` using each item's `Display`.
fn bracketed<T: fmt::Display>(items: &[T]) -> String {
    let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

/// Writes a descriptive line for every event it receives.
///
/// `lookup` is only used by the raw edit and delete handlers, which receive
/// ids rather than objects.
#[derive(Debug)]
pub struct EventLogger<L> {
    logger: Logger,
    lookup: L,
}

impl<L: Lookup> EventLogger<L> {
    pub fn new(logger: Logger, lookup: L) -> Self {
        Self { logger, lookup }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

#[async_trait]
impl<L: Lookup> EventHandler for EventLogger<L> {
    // -- Channels -----------------------------------------------------------

    async fn on_guild_channel_create(&self, channel: Channel) -> Result<()> {
        self.logger.info(format_args!("Channel {} was created.", channel));
        Ok(())
    }

    async fn on_guild_channel_update(&self, before: Channel, after: Channel) -> Result<()> {
        self.logger
            .info(format_args!("Channel {} was updated to {}.", before, after));
        Ok(())
    }

    async fn on_guild_channel_delete(&self, channel: Channel) -> Result<()> {
        self.logger.info(format_args!("Channel {} was deleted.", channel));
        Ok(())
    }

    async fn on_guild_channel_pins_update(
        &self,
        channel: Channel,
        last_pin: Option<String>,
    ) -> Result<()> {
        self.logger.info(format_args!(
            "Channel {} pins were changed. The last pin is {}.",
            channel,
            DisplayOpt(&last_pin)
        ));
        Ok(())
    }

    async fn on_private_channel_create(&self, channel: Channel) -> Result<()> {
        self.logger.info(format_args!("Channel {} was created.", channel));
        Ok(())
    }

    async fn on_private_channel_update(&self, before: Channel, after: Channel) -> Result<()> {
        self.logger
            .info(format_args!("Channel {} was updated to {}.", before, after));
        Ok(())
    }

    async fn on_private_channel_delete(&self, channel: Channel) -> Result<()> {
        self.logger.info(format_args!("Channel {} was deleted.", channel));
        Ok(())
    }

    async fn on_private_channel_pins_update(
        &self,
        channel: Channel,
        last_pin: Option<String>,
    ) -> Result<()> {
        self.logger.info(format_args!(
            "Channel {} pins were changed. The last pin is {}.",
            channel,
            DisplayOpt(&last_pin)
        ));
        Ok(())
    }

    async fn on_group_join(&self, channel: Channel, user: User) -> Result<()> {
        self.logger
            .info(format_args!("User {} joined group {}.", user, channel));
        Ok(())
    }

    async fn on_group_remove(&self, channel: Channel, user: User) -> Result<()> {
        self.logger
            .info(format_args!("User {} was removed from group {}.", user, channel));
        Ok(())
    }

    async fn on_typing(&self, channel: Channel, user: User, when: DateTime<Utc>) -> Result<()> {
        self.logger.info(format_args!(
            "User {} is typing in channel {} at {}.",
            user, channel, when
        ));
        Ok(())
    }

    // -- Relationships ------------------------------------------------------

    async fn on_relationship_add(&self, relationship: Relationship) -> Result<()> {
        self.logger
            .info(format_args!("Relationship {} was added.", relationship));
        Ok(())
    }

    async fn on_relationship_remove(&self, relationship: Relationship) -> Result<()> {
        self.logger
            .info(format_args!("Relationship {} was removed.", relationship));
        Ok(())
    }

    async fn on_relationship_update(
        &self,
        before: Relationship,
        after: Relationship,
    ) -> Result<()> {
        self.logger.info(format_args!(
            "Relationship {} was updated to {}.",
            before, after
        ));
        Ok(())
    }

    async fn on_friend_suggestion_add(&self, user: User) -> Result<()> {
        self.logger
            .info(format_args!("User {} was suggested as a friend.", user));
        Ok(())
    }

    async fn on_friend_suggestion_remove(&self, user: User) -> Result<()> {
        self.logger
            .info(format_args!("User {} was removed as a friend suggestion.", user));
        Ok(())
    }

    // -- Calls --------------------------------------------------------------

    async fn on_call_create(&self, call: Call) -> Result<()> {
        self.logger.info(format_args!("Call {} was created.", call));
        Ok(())
    }

    async fn on_call_update(&self, call: Call, before: Option<Call>) -> Result<()> {
        self.logger.info(format_args!(
            "Call {} was updated from {}.",
            call,
            DisplayOpt(&before)
        ));
        Ok(())
    }

    // -- Guilds -------------------------------------------------------------

    async fn on_guild_join(&self, guild: Guild) -> Result<()> {
        self.logger.info(format_args!("Joined guild {}.", guild));
        Ok(())
    }

    async fn on_guild_remove(&self, guild: Guild) -> Result<()> {
        self.logger.info(format_args!("Left guild {}.", guild));
        Ok(())
    }

    // -- Members ------------------------------------------------------------

    async fn on_member_join(&self, member: GuildMember) -> Result<()> {
        self.logger.info(format_args!(
            "Member {} joined {}.",
            member,
            DisplayOpt(&member.guild_id)
        ));
        Ok(())
    }

    async fn on_member_remove(&self, member: GuildMember) -> Result<()> {
        self.logger.info(format_args!("Member {} left.", member));
        Ok(())
    }

    async fn on_member_update(&self, before: GuildMember, after: GuildMember) -> Result<()> {
        self.logger
            .info(format_args!("Member {} was updated to {}.", before, after));
        Ok(())
    }

    async fn on_user_update(&self, before: User, after: User) -> Result<()> {
        self.logger
            .info(format_args!("User {} was updated to {}.", before, after));
        Ok(())
    }

    async fn on_member_ban(&self, guild: Guild, user: User) -> Result<()> {
        self.logger.info(format_args!(
            "Member {} was banned from guild {}.",
            user, guild
        ));
        Ok(())
    }

    async fn on_member_unban(&self, guild: Guild, user: User) -> Result<()> {
        self.logger.info(format_args!(
            "Member {} was unbanned from guild {}.",
            user, guild
        ));
        Ok(())
    }

    async fn on_presence_update(
        &self,
        before: Option<PresenceUpdate>,
        after: PresenceUpdate,
    ) -> Result<()> {
        self.logger.info(format_args!(
            "Presence {} was updated to {}.",
            DisplayOpt(&before),
            after
        ));
        Ok(())
    }

    // -- Messages -----------------------------------------------------------

    async fn on_message(&self, message: Message) -> Result<()> {
        self.logger.info(format_args!(
            "Message {} was sent with content {:?}.",
            message, message.content
        ));
        Ok(())
    }

    async fn on_message_edit(&self, before: Message, after: Message) -> Result<()> {
        self.logger.info(format_args!(
            "Message {} with content {:?} was updated to {} with content {:?}.",
            before, before.content, after, after.content
        ));
        Ok(())
    }

    async fn on_message_delete(&self, message: Message) -> Result<()> {
        self.logger.info(format_args!(
            "Message {} was deleted with content {:?}.",
            message, message.content
        ));
        Ok(())
    }

    async fn on_bulk_message_delete(&self, messages: Vec<Message>) -> Result<()> {
        self.logger.info(format_args!(
            "Messages {} were bulk deleted.",
            bracketed(&messages)
        ));
        Ok(())
    }

    async fn on_raw_message_edit(&self, payload: RawMessageUpdate) -> Result<()> {
        let channel = self.lookup.fetch_channel(&payload.channel_id).await?;
        let message = self.lookup.fetch_message(&channel.id, &payload.id).await?;
        self.logger.info(format_args!(
            "Message {} was updated with content {:?}.",
            message, message.content
        ));
        Ok(())
    }

    async fn on_raw_message_delete(&self, payload: MessageDelete) -> Result<()> {
        let channel = self.lookup.fetch_channel(&payload.channel_id).await?;
        self.logger.info(format_args!(
            "Message {} was deleted from {}.",
            payload.id, channel
        ));
        Ok(())
    }

    // -- Reactions ----------------------------------------------------------

    async fn on_reaction_add(&self, reaction: Reaction, user: User) -> Result<()> {
        self.logger
            .info(format_args!("Reaction {} was added by {}.", reaction, user));
        Ok(())
    }

    async fn on_reaction_remove(&self, reaction: Reaction, user: User) -> Result<()> {
        self.logger
            .info(format_args!("Reaction {} was removed by {}.", reaction, user));
        Ok(())
    }

    async fn on_reaction_clear(&self, message: Message, reactions: Vec<Reaction>) -> Result<()> {
        self.logger.info(format_args!(
            "Reactions {} were cleared from message {}.",
            bracketed(&reactions),
            message
        ));
        Ok(())
    }

    async fn on_reaction_clear_emoji(&self, reaction: Reaction) -> Result<()> {
        self.logger
            .info(format_args!("Reaction {} was cleared.", reaction));
        Ok(())
    }

    async fn on_raw_reaction_add(&self, payload: ReactionEvent) -> Result<()> {
        self.logger.info(format_args!(
            "Reaction {} was added to message {}.",
            payload.emoji, payload.message_id
        ));
        Ok(())
    }

    async fn on_raw_reaction_clear(&self, payload: ReactionRemoveAll) -> Result<()> {
        self.logger.info(format_args!(
            "Reactions were cleared from message {}.",
            payload.message_id
        ));
        Ok(())
    }

    async fn on_raw_reaction_clear_emoji(&self, payload: ReactionRemoveEmoji) -> Result<()> {
        self.logger.info(format_args!(
            "A single reaction was cleared from message {}.",
            payload.message_id
        ));
        Ok(())
    }

    // -- Voice --------------------------------------------------------------

    async fn on_voice_state_update(
        &self,
        user: User,
        before: Option<VoiceState>,
        after: VoiceState,
    ) -> Result<()> {
        self.logger.info(format_args!(
            "Voice state {} was updated to {} for {}.",
            DisplayOpt(&before),
            after,
            user
        ));
        Ok(())
    }
}
