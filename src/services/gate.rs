use crate::services::error::{EngineError, EngineResult};
use crate::services::platform::{GuildId, Platform, UserId};
use crate::services::store::StateStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Guilds in which the bot has been suspended by an owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StopFlags {
    pub suspended: BTreeSet<GuildId>,
}

/// Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    Member,
    Staff,
    Administrator,
    Owner,
}

impl Access {
    fn describe(&self) -> &'static str {
        match self {
            Access::Member => "a member",
            Access::Staff => "staff",
            Access::Administrator => "an administrator",
            Access::Owner => "a bot owner",
        }
    }
}

/// Cross-cutting permission checks consulted before every mutating operation.
pub struct AuthorizationGate {
    store: Arc<StateStore>,
    platform: Arc<dyn Platform>,
    owner_ids: HashSet<UserId>,
}

impl AuthorizationGate {
    pub fn new(store: Arc<StateStore>, platform: Arc<dyn Platform>, owner_ids: HashSet<UserId>) -> Self {
        Self {
            store,
            platform,
            owner_ids,
        }
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id)
    }

    /// Resolves the highest access level the user holds in the guild.
    /// Lookup failures degrade to the level established so far.
    pub async fn access_level(&self, guild_id: GuildId, user_id: UserId) -> Access {
        if self.is_owner(user_id) {
            return Access::Owner;
        }

        match self.platform.is_administrator(guild_id, user_id).await {
            Ok(true) => return Access::Administrator,
            Ok(false) => {}
            Err(e) => warn!(
                "Failed to resolve permissions of {} in guild {}: {}",
                user_id, guild_id, e
            ),
        }

        let staff_roles = self
            .store
            .guilds
            .read(|g| g.get(guild_id).map(|s| s.staff_role_ids.clone()).unwrap_or_default())
            .await;
        if staff_roles.is_empty() {
            return Access::Member;
        }

        match self.platform.member_roles(guild_id, user_id).await {
            Ok(roles) if roles.iter().any(|r| staff_roles.contains(r)) => Access::Staff,
            Ok(_) => Access::Member,
            Err(e) => {
                warn!("Failed to fetch roles of {} in guild {}: {}", user_id, guild_id, e);
                Access::Member
            }
        }
    }

    pub async fn is_suspended(&self, guild_id: GuildId) -> bool {
        self.store
            .stop_flags
            .read(|f| f.suspended.contains(&guild_id))
            .await
    }

    /// Rejects actor-initiated mutations in a suspended guild.
    pub async fn ensure_active(&self, guild_id: GuildId) -> EngineResult<()> {
        if self.is_suspended(guild_id).await {
            return Err(EngineError::Suspended);
        }
        Ok(())
    }

    /// Requires the guild to be active and the actor to hold at least `min`.
    pub async fn require(&self, guild_id: GuildId, actor_id: UserId, min: Access) -> EngineResult<Access> {
        self.ensure_active(guild_id).await?;
        self.require_level(guild_id, actor_id, min).await
    }

    async fn require_level(&self, guild_id: GuildId, actor_id: UserId, min: Access) -> EngineResult<Access> {
        let level = self.access_level(guild_id, actor_id).await;
        if level < min {
            return Err(EngineError::Unauthorized(min.describe().to_string()));
        }
        Ok(level)
    }

    pub async fn suspend(&self, guild_id: GuildId, actor_id: UserId) -> EngineResult<bool> {
        self.require_level(guild_id, actor_id, Access::Owner).await?;
        let changed = self
            .store
            .stop_flags
            .update(|f| f.suspended.insert(guild_id))
            .await?;
        info!("Guild {} suspended by {}", guild_id, actor_id);
        Ok(changed)
    }

    pub async fn resume(&self, guild_id: GuildId, actor_id: UserId) -> EngineResult<bool> {
        self.require_level(guild_id, actor_id, Access::Owner).await?;
        let changed = self
            .store
            .stop_flags
            .update(|f| f.suspended.remove(&guild_id))
            .await?;
        info!("Guild {} resumed by {}", guild_id, actor_id);
        Ok(changed)
    }
}
