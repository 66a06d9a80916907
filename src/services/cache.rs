use crate::services::platform::{GuildId, InviteInfo};
use dashmap::DashMap;
use std::collections::HashMap;

/// Invite code to use count, as last seen for a guild.
pub type InviteUses = HashMap<String, u64>;

/// In-memory invite snapshots, rebuilt from the platform on demand.
/// A missing entry means the next join cannot be attributed.
pub struct InviteSnapshotCache {
    snapshots: DashMap<GuildId, InviteUses>,
}

impl InviteSnapshotCache {
    pub fn new() -> Self {
        Self {
            snapshots: DashMap::new(),
        }
    }

    /// Stores the current invite list and hands back the snapshot it replaced.
    pub fn replace(&self, guild_id: GuildId, invites: &[InviteInfo]) -> Option<InviteUses> {
        let uses = invites
            .iter()
            .map(|invite| (invite.code.clone(), invite.uses))
            .collect();
        self.snapshots.insert(guild_id, uses)
    }

    pub fn forget(&self, guild_id: GuildId) {
        self.snapshots.remove(&guild_id);
    }
}

impl Default for InviteSnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
