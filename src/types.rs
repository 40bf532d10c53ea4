//! Typed representations of Discord API objects.
//!
//! These mirror the Discord API docs so we can deserialize gateway events and
//! REST responses without touching `serde_json::Value` in the rest of the
//! codebase. Every object that can appear in a log line implements
//! [`fmt::Display`] as a compact `<Type key=value ...>` representation.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Discord IDs are snowflakes transmitted as strings in JSON.
pub type Snowflake = String;

/// Renders `Some(v)` as `v` and `None` as `None`.
pub struct DisplayOpt<'a, T>(pub &'a Option<T>);

impl<T: fmt::Display> fmt::Display for DisplayOpt<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => v.fmt(f),
            None => f.write_str("None"),
        }
    }
}

/// Integer-coded enum that keeps values it doesn't recognise in `Other`
/// instead of failing the whole payload.
macro_rules! wire_enum {
    (pub enum $name:ident { $($variant:ident = $value:literal,)* }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
        #[serde(from = "u8", into = "u8")]
        pub enum $name {
            $($variant,)*
            Other(u8),
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                match value {
                    $($value => $name::$variant,)*
                    other => $name::Other(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                match value {
                    $($name::$variant => $value,)*
                    $name::Other(other) => other,
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Gateway payload (the envelope that wraps every WS message)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayPayload {
    pub op: u8,
    pub d: Option<serde_json::Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

bitflags! {
    /// Gateway intents, only sent when identifying as a bot account.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Intents: u32 {
        const GUILDS = 1 << 0;
        const GUILD_MEMBERS = 1 << 1;
        const GUILD_MODERATION = 1 << 2;
        const GUILD_VOICE_STATES = 1 << 7;
        const GUILD_PRESENCES = 1 << 8;
        const GUILD_MESSAGES = 1 << 9;
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        const GUILD_MESSAGE_TYPING = 1 << 11;
        const DIRECT_MESSAGES = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        const DIRECT_MESSAGE_TYPING = 1 << 14;
        const MESSAGE_CONTENT = 1 << 15;
    }
}

impl Intents {
    /// Everything the event logger listens to.
    pub fn logged_events() -> Self {
        Self::GUILDS
            | Self::GUILD_MEMBERS
            | Self::GUILD_MODERATION
            | Self::GUILD_VOICE_STATES
            | Self::GUILD_PRESENCES
            | Self::GUILD_MESSAGES
            | Self::GUILD_MESSAGE_REACTIONS
            | Self::GUILD_MESSAGE_TYPING
            | Self::DIRECT_MESSAGES
            | Self::DIRECT_MESSAGE_REACTIONS
            | Self::DIRECT_MESSAGE_TYPING
            | Self::MESSAGE_CONTENT
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    pub global_name: Option<String>,
}

impl User {
    /// `Username#Discriminator` or just `Username` for the new username system.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some("0") | None => self.username.clone(),
            Some(disc) => format!("{}#{}", self.username, disc),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<User id={} name={:?} global_name={} bot={}>",
            self.id,
            self.tag(),
            DisplayOpt(&self.global_name),
            self.bot
        )
    }
}

/// Partial user object (e.g. inside PRESENCE_UPDATE).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PartialUser {
    pub id: Snowflake,
    pub username: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

wire_enum! {
    pub enum ChannelType {
        GuildText = 0,
        Dm = 1,
        GuildVoice = 2,
        GroupDm = 3,
        GuildCategory = 4,
        GuildAnnouncement = 5,
        AnnouncementThread = 10,
        PublicThread = 11,
        PrivateThread = 12,
        GuildStageVoice = 13,
        GuildDirectory = 14,
        GuildForum = 15,
        GuildMedia = 16,
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    pub guild_id: Option<Snowflake>,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub position: Option<i32>,
    pub parent_id: Option<Snowflake>,
    #[serde(default)]
    pub nsfw: bool,
    /// DM / group DM participants.
    #[serde(default)]
    pub recipients: Vec<User>,
    pub owner_id: Option<Snowflake>,
    pub last_message_id: Option<Snowflake>,
    pub last_pin_timestamp: Option<String>,
}

impl Channel {
    /// DMs and group DMs carry no guild id.
    pub fn is_private(&self) -> bool {
        self.guild_id.is_none()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Channel id={} name={} type={:?}",
            self.id,
            DisplayOpt(&self.name),
            self.kind
        )?;
        if let Some(guild_id) = &self.guild_id {
            write!(f, " guild_id={}", guild_id)?;
        }
        if !self.recipients.is_empty() {
            let names: Vec<String> = self.recipients.iter().map(User::tag).collect();
            write!(f, " recipients=[{}]", names.join(", "))?;
        }
        f.write_str(">")
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    pub timestamp: String,
    pub edited_timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub mentions: Vec<User>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub reactions: Vec<MessageReaction>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Message id={} channel_id={} type={} author={} pinned={}",
            self.id, self.channel_id, self.kind, self.author, self.pinned
        )?;
        if !self.attachments.is_empty() {
            let names: Vec<&str> = self.attachments.iter().map(|a| a.filename.as_str()).collect();
            write!(f, " attachments=[{}]", names.join(", "))?;
        }
        f.write_str(">")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    pub size: u64,
    pub url: String,
    pub proxy_url: String,
    pub content_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Emoji & reactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Emoji {
    /// `None` for unicode emoji.
    pub id: Option<Snowflake>,
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("_");
        match &self.id {
            Some(id) if self.animated => write!(f, "<a:{}:{}>", name, id),
            Some(id) => write!(f, "<:{}:{}>", name, id),
            None => f.write_str(name),
        }
    }
}

/// Reaction summary embedded in a message object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MessageReaction {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub me: bool,
    pub emoji: Emoji,
}

/// A reaction on a specific cached message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub emoji: Emoji,
    pub count: u32,
    pub me: bool,
    pub message_id: Snowflake,
    pub channel_id: Snowflake,
}

impl Reaction {
    pub fn from_message(message: &Message, reaction: &MessageReaction) -> Self {
        Self {
            emoji: reaction.emoji.clone(),
            count: reaction.count,
            me: reaction.me,
            message_id: message.id.clone(),
            channel_id: message.channel_id.clone(),
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Reaction emoji={} me={} count={} message_id={}>",
            self.emoji, self.me, self.count, self.message_id
        )
    }
}

// ---------------------------------------------------------------------------
// Guild
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: Option<Snowflake>,
    pub member_count: Option<u64>,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub members: Vec<GuildMember>,
    #[serde(default)]
    pub voice_states: Vec<VoiceState>,
}

impl fmt::Display for Guild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Guild id={} name={:?} member_count={}>",
            self.id,
            self.name,
            DisplayOpt(&self.member_count)
        )
    }
}

/// READY lists full guild objects for user accounts and unavailable stubs
/// for bots.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ReadyGuild {
    Available(Box<Guild>),
    Unavailable(UnavailableGuild),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GuildMember {
    pub user: Option<User>,
    /// Present on member add/update dispatches; filled in from context
    /// elsewhere.
    pub guild_id: Option<Snowflake>,
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    pub joined_at: Option<String>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub pending: bool,
}

impl GuildMember {
    /// A bare member record for when only the user is known.
    pub fn from_user(user: User, guild_id: impl Into<Snowflake>) -> Self {
        Self {
            user: Some(user),
            guild_id: Some(guild_id.into()),
            nick: None,
            roles: Vec::new(),
            joined_at: None,
            deaf: false,
            mute: false,
            pending: false,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

impl fmt::Display for GuildMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (id, name) = match &self.user {
            Some(user) => (user.id.as_str(), user.tag()),
            None => ("?", "?".to_string()),
        };
        write!(
            f,
            "<Member id={} name={:?} nick={} guild_id={} roles={}>",
            id,
            name,
            DisplayOpt(&self.nick),
            DisplayOpt(&self.guild_id),
            self.roles.len()
        )
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PresenceUpdate {
    pub user: PartialUser,
    pub guild_id: Option<Snowflake>,
    pub status: Option<String>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl fmt::Display for PresenceUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let activities: Vec<&str> = self.activities.iter().map(|a| a.name.as_str()).collect();
        write!(
            f,
            "<Presence user_id={} status={} guild_id={} activities=[{}]>",
            self.user.id,
            DisplayOpt(&self.status),
            DisplayOpt(&self.guild_id),
            activities.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub url: Option<String>,
    pub state: Option<String>,
    pub details: Option<String>,
}

// ---------------------------------------------------------------------------
// Relationships (user accounts only)
// ---------------------------------------------------------------------------

wire_enum! {
    pub enum RelationshipType {
        None = 0,
        Friend = 1,
        Blocked = 2,
        IncomingRequest = 3,
        OutgoingRequest = 4,
        Implicit = 5,
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Relationship {
    /// The other user's id.
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
    /// Newer READY payloads send `user_id` and a separate `users` list.
    pub user: Option<User>,
    pub nickname: Option<String>,
    pub since: Option<String>,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Relationship id={} type={:?}", self.id, self.kind)?;
        if let Some(user) = &self.user {
            write!(f, " user={}", user)?;
        }
        write!(f, " nickname={}>", DisplayOpt(&self.nickname))
    }
}

/// RELATIONSHIP_REMOVE only carries the id and type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelationshipRemove {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FriendSuggestion {
    pub suggested_user: User,
    #[serde(default)]
    pub reasons: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FriendSuggestionDelete {
    pub suggested_user_id: Snowflake,
}

// ---------------------------------------------------------------------------
// Voice & calls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VoiceState {
    pub guild_id: Option<Snowflake>,
    pub channel_id: Option<Snowflake>,
    pub user_id: Snowflake,
    pub member: Option<GuildMember>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_stream: bool,
    #[serde(default)]
    pub self_video: bool,
    #[serde(default)]
    pub suppress: bool,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<VoiceState channel_id={} self_mute={} self_deaf={} self_stream={} self_video={} mute={} deaf={}>",
            DisplayOpt(&self.channel_id),
            self.self_mute,
            self.self_deaf,
            self.self_stream,
            self.self_video,
            self.mute,
            self.deaf
        )
    }
}

/// A DM or group DM call (CALL_CREATE / CALL_UPDATE).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Call {
    pub channel_id: Snowflake,
    pub message_id: Option<Snowflake>,
    pub region: Option<String>,
    #[serde(default)]
    pub ringing: Vec<Snowflake>,
    #[serde(default)]
    pub unavailable: bool,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Call channel_id={} message_id={} region={} ringing=[{}]>",
            self.channel_id,
            DisplayOpt(&self.message_id),
            DisplayOpt(&self.region),
            self.ringing.join(", ")
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallDelete {
    pub channel_id: Snowflake,
}

// ---------------------------------------------------------------------------
// Raw dispatch payloads
// ---------------------------------------------------------------------------

/// MESSAGE_UPDATE: a partial message; only `id` and `channel_id` are
/// guaranteed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessageUpdate {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    /// The full partial payload, merged into cached messages.
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MessageDelete {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageDeleteBulk {
    pub ids: Vec<Snowflake>,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
}

/// MESSAGE_REACTION_ADD / MESSAGE_REACTION_REMOVE.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReactionEvent {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub member: Option<GuildMember>,
    pub emoji: Emoji,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReactionRemoveAll {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReactionRemoveEmoji {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub emoji: Emoji,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelPinsUpdate {
    pub guild_id: Option<Snowflake>,
    pub channel_id: Snowflake,
    pub last_pin_timestamp: Option<String>,
}

/// CHANNEL_RECIPIENT_ADD / CHANNEL_RECIPIENT_REMOVE (group DMs).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelRecipient {
    pub channel_id: Snowflake,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TypingStart {
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub user_id: Snowflake,
    /// Unix seconds.
    pub timestamp: i64,
    pub member: Option<GuildMember>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuildMemberRemove {
    pub guild_id: Snowflake,
    pub user: User,
}

/// GUILD_BAN_ADD / GUILD_BAN_REMOVE.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuildBan {
    pub guild_id: Snowflake,
    pub user: User,
}

// ---------------------------------------------------------------------------
// READY event payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadyEvent {
    pub v: u8,
    pub user: User,
    pub session_id: String,
    pub resume_gateway_url: String,
    #[serde(default)]
    pub guilds: Vec<ReadyGuild>,
    /// Bot accounts only.
    pub application: Option<ReadyApplication>,
    /// User accounts only.
    #[serde(default)]
    pub private_channels: Vec<Channel>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Users referenced by id elsewhere in the READY payload.
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadyApplication {
    pub id: Snowflake,
    pub flags: Option<u64>,
}

// ---------------------------------------------------------------------------
// Rate-limit info parsed from response headers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RateLimitInfo {
    pub remaining: Option<u32>,
    pub reset_after: Option<f64>,
    pub bucket: Option<String>,
    pub is_global: bool,
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            username: name.to_string(),
            discriminator: Some("0".to_string()),
            avatar: None,
            bot: false,
            global_name: None,
        }
    }

    pub fn guild_channel(id: &str, guild_id: &str, name: &str) -> Channel {
        Channel {
            id: id.to_string(),
            kind: ChannelType::GuildText,
            guild_id: Some(guild_id.to_string()),
            name: Some(name.to_string()),
            topic: None,
            position: Some(0),
            parent_id: None,
            nsfw: false,
            recipients: Vec::new(),
            owner_id: None,
            last_message_id: None,
            last_pin_timestamp: None,
        }
    }

    pub fn group_channel(id: &str, recipients: Vec<User>) -> Channel {
        Channel {
            id: id.to_string(),
            kind: ChannelType::GroupDm,
            guild_id: None,
            name: None,
            topic: None,
            position: None,
            parent_id: None,
            nsfw: false,
            recipients,
            owner_id: None,
            last_message_id: None,
            last_pin_timestamp: None,
        }
    }

    pub fn message(id: &str, channel_id: &str, author: User, content: &str) -> Message {
        Message {
            id: id.to_string(),
            channel_id: channel_id.to_string(),
            guild_id: None,
            author,
            content: content.to_string(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            edited_timestamp: None,
            kind: 0,
            tts: false,
            mention_everyone: false,
            mentions: Vec::new(),
            attachments: Vec::new(),
            pinned: false,
            reactions: Vec::new(),
        }
    }

    pub fn member(user: User, guild_id: &str) -> GuildMember {
        GuildMember::from_user(user, guild_id)
    }

    pub fn guild(id: &str, name: &str) -> Guild {
        Guild {
            id: id.to_string(),
            name: name.to_string(),
            icon: None,
            owner_id: None,
            member_count: Some(2),
            unavailable: false,
            channels: Vec::new(),
            members: Vec::new(),
            voice_states: Vec::new(),
        }
    }

    pub fn unicode_emoji(name: &str) -> Emoji {
        Emoji {
            id: None,
            name: Some(name.to_string()),
            animated: false,
        }
    }

    pub fn voice_state(user_id: &str, channel_id: Option<&str>) -> VoiceState {
        VoiceState {
            guild_id: None,
            channel_id: channel_id.map(str::to_string),
            user_id: user_id.to_string(),
            member: None,
            session_id: None,
            deaf: false,
            mute: false,
            self_deaf: false,
            self_mute: false,
            self_stream: false,
            self_video: false,
            suppress: false,
        }
    }

    pub fn relationship(user: User, kind: RelationshipType) -> Relationship {
        Relationship {
            id: user.id.clone(),
            kind,
            user: Some(user),
            nickname: None,
            since: None,
        }
    }
}
