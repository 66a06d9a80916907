use crate::services::platform::{ChannelId, GuildId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A giveaway, keyed by its announcement message. Kept after it ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Giveaway {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub prize: String,
    pub winner_count: u32,
    pub host_id: UserId,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: BTreeSet<UserId>,
    /// Only ever goes from false to true.
    #[serde(default)]
    pub ended: bool,
    #[serde(default)]
    pub min_invites: i64,
    #[serde(default)]
    pub last_winners: Vec<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryToggle {
    Joined,
    Left,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GiveawayBook {
    pub giveaways: HashMap<MessageId, Giveaway>,
}

impl GiveawayBook {
    pub fn get(&self, message_id: MessageId) -> Option<&Giveaway> {
        self.giveaways.get(&message_id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Giveaway> {
        self.giveaways.values().filter(|g| !g.ended)
    }
}
