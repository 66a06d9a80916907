use crate::modules::invite_tracking::stats::{InvitedMember, InviterStats, JoinKind, LedgerBackup};
use crate::services::cache::{InviteSnapshotCache, InviteUses};
use crate::services::error::{EngineError, EngineResult};
use crate::services::gate::{Access, AuthorizationGate};
use crate::services::locks::{KeyedGuard, KeyedLocks};
use crate::services::platform::{GuildId, InviteInfo, OutboundMessage, Platform, PlatformError, UserId};
use crate::services::store::StateStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A join attributed to one invite code by diffing use counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteUsed {
    pub code: String,
    pub creator_id: Option<UserId>,
}

/// Compares the previous snapshot with the current invite list and returns
/// the first invite whose use count strictly increased. Codes missing from
/// the snapshot are compared against zero.
pub fn find_used_invite(previous: &InviteUses, current: &[InviteInfo]) -> Option<InviteUsed> {
    current
        .iter()
        .find(|invite| invite.uses > previous.get(&invite.code).copied().unwrap_or(0))
        .map(|invite| InviteUsed {
            code: invite.code.clone(),
            creator_id: invite.inviter_id,
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Credited {
        inviter_id: UserId,
        code: String,
        kind: JoinKind,
        credited: i64,
    },
    Blacklisted {
        inviter_id: UserId,
        code: String,
    },
    Unknown,
}

/// The attribution ledger service: snapshot diffing plus ledger mutations.
pub struct InviteTracker {
    store: Arc<StateStore>,
    platform: Arc<dyn Platform>,
    gate: Arc<AuthorizationGate>,
    snapshots: InviteSnapshotCache,
    guild_locks: KeyedLocks<GuildId>,
}

impl InviteTracker {
    pub fn new(store: Arc<StateStore>, platform: Arc<dyn Platform>, gate: Arc<AuthorizationGate>) -> Self {
        Self {
            store,
            platform,
            gate,
            snapshots: InviteSnapshotCache::new(),
            guild_locks: KeyedLocks::new(),
        }
    }

    /// Holds off join attribution for the guild until the guard drops.
    pub(crate) async fn lock_guild(&self, guild_id: GuildId) -> KeyedGuard<'_, GuildId> {
        self.guild_locks.lock(guild_id).await
    }

    async fn is_blacklisted(&self, guild_id: GuildId, user_id: UserId) -> bool {
        self.store
            .guilds
            .read(|g| g.is_blacklisted(guild_id, user_id))
            .await
    }

    /// Credited invites, forced to zero for blacklisted inviters.
    pub async fn credit_for(&self, guild_id: GuildId, user_id: UserId) -> i64 {
        let blacklisted = self.is_blacklisted(guild_id, user_id).await;
        self.store
            .ledger
            .read(|l| l.credited(user_id, blacklisted))
            .await
    }

    pub async fn stats(&self, user_id: UserId) -> InviterStats {
        self.store.ledger.read(|l| l.stats(user_id)).await
    }

    pub async fn inviter_of(&self, member_id: UserId) -> Option<UserId> {
        self.store.ledger.read(|l| l.inviter_of(member_id)).await
    }

    /// Members brought in by `inviter_id`, most recent first.
    pub async fn invited_by(&self, inviter_id: UserId) -> Vec<(UserId, InvitedMember)> {
        let mut rows: Vec<(UserId, InvitedMember)> = self
            .store
            .ledger
            .read(|l| {
                l.invited_members
                    .get(&inviter_id)
                    .map(|bucket| bucket.iter().map(|(m, r)| (*m, r.clone())).collect())
                    .unwrap_or_default()
            })
            .await;
        rows.sort_by(|a, b| b.1.joined_at.cmp(&a.1.joined_at));
        rows
    }

    pub async fn leaderboard(&self, guild_id: GuildId, limit: usize) -> Vec<(UserId, i64)> {
        let blacklist = self
            .store
            .guilds
            .read(|g| g.get(guild_id).map(|s| s.invite_blacklist.clone()).unwrap_or_default())
            .await;
        self.store
            .ledger
            .read(|l| l.leaderboard(limit, |u| blacklist.contains(&u)))
            .await
    }

    /// Replaces the cached snapshot with the guild's live invite list.
    pub async fn refresh_snapshot(&self, guild_id: GuildId) -> Result<usize, PlatformError> {
        let _guard = self.guild_locks.lock(guild_id).await;
        match self.platform.fetch_invites(guild_id).await {
            Ok(invites) => {
                self.snapshots.replace(guild_id, &invites);
                debug!("Cached {} invites for guild {}", invites.len(), guild_id);
                Ok(invites.len())
            }
            Err(e) => {
                self.snapshots.forget(guild_id);
                Err(e)
            }
        }
    }

    /// Attributes a member join by diffing the live invite list against the
    /// cached snapshot, then credits the resolved inviter.
    pub async fn handle_member_join(&self, guild_id: GuildId, member_id: UserId) -> EngineResult<JoinOutcome> {
        let _guard = self.guild_locks.lock(guild_id).await;

        let current = match self.platform.fetch_invites(guild_id).await {
            Ok(invites) => invites,
            Err(e) => {
                // The next diff would fold this join in, so start over.
                warn!("Failed to fetch invites for guild {}: {}", guild_id, e);
                self.snapshots.forget(guild_id);
                return Ok(JoinOutcome::Unknown);
            }
        };

        let Some(previous) = self.snapshots.replace(guild_id, &current) else {
            info!(
                "No invite snapshot for guild {}, join of {} is unattributed",
                guild_id, member_id
            );
            return Ok(JoinOutcome::Unknown);
        };

        match find_used_invite(&previous, &current) {
            Some(used) => self.record_join(guild_id, member_id, &used.code, used.creator_id).await,
            None => Ok(JoinOutcome::Unknown),
        }
    }

    /// Credits a join through `used_code`. Manual code owners win over the
    /// platform-reported creator.
    pub async fn record_join(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        used_code: &str,
        creator_id: Option<UserId>,
    ) -> EngineResult<JoinOutcome> {
        let owner = self
            .store
            .ledger
            .read(|l| l.invite_owners.get(used_code).copied())
            .await;
        let Some(inviter_id) = owner.or(creator_id) else {
            return Ok(JoinOutcome::Unknown);
        };

        if self.is_blacklisted(guild_id, inviter_id).await {
            info!(
                "Join of {} via {} not credited: inviter {} is blacklisted",
                member_id, used_code, inviter_id
            );
            return Ok(JoinOutcome::Blacklisted {
                inviter_id,
                code: used_code.to_string(),
            });
        }

        let now = Utc::now();
        let (kind, credited) = self
            .store
            .ledger
            .update(|l| {
                let kind = l.record_join(member_id, inviter_id, Some(used_code), now);
                (kind, l.credited(inviter_id, false))
            })
            .await?;

        info!(
            "Member {} joined guild {} via {} (inviter {}, {:?})",
            member_id, guild_id, used_code, inviter_id, kind
        );

        Ok(JoinOutcome::Credited {
            inviter_id,
            code: used_code.to_string(),
            kind,
            credited,
        })
    }

    pub async fn handle_member_leave(&self, member_id: UserId) -> EngineResult<Option<UserId>> {
        let now = Utc::now();
        let inviter = self.store.ledger.update(|l| l.record_leave(member_id, now)).await?;
        if let Some(inviter_id) = inviter {
            info!("Member {} left, debited inviter {}", member_id, inviter_id);
        }
        Ok(inviter)
    }

    /// Posts the join outcome in the guild's welcome channel, if one is bound.
    pub async fn announce_join(&self, guild_id: GuildId, member_id: UserId, outcome: &JoinOutcome) {
        let channel = self
            .store
            .guilds
            .read(|g| g.get(guild_id).and_then(|s| s.channels.welcome))
            .await;
        let Some(channel_id) = channel else {
            return;
        };

        let content = match outcome {
            JoinOutcome::Credited {
                inviter_id,
                credited,
                ..
            } => format!(
                "👋 <@{}> joined, invited by <@{}> who now has **{}** invites.",
                member_id, inviter_id, credited
            ),
            JoinOutcome::Blacklisted { inviter_id, .. } => format!(
                "👋 <@{}> joined, invited by <@{}> (blacklisted, not credited).",
                member_id, inviter_id
            ),
            JoinOutcome::Unknown => format!(
                "👋 <@{}> joined, but I couldn't figure out who invited them.",
                member_id
            ),
        };

        if let Err(e) = self
            .platform
            .send_message(channel_id, OutboundMessage::text(content))
            .await
        {
            warn!("Failed to post join notice in guild {}: {}", guild_id, e);
        }
    }

    pub async fn adjust_manual(
        &self,
        guild_id: GuildId,
        actor_id: UserId,
        user_id: UserId,
        delta: i64,
    ) -> EngineResult<InviterStats> {
        self.gate.require(guild_id, actor_id, Access::Administrator).await?;
        let stats = self
            .store
            .ledger
            .update(|l| l.adjust_manual(user_id, delta))
            .await?;
        info!("{} adjusted invites of {} by {}", actor_id, user_id, delta);
        Ok(stats)
    }

    pub async fn reset(&self, guild_id: GuildId, actor_id: UserId, user_id: UserId) -> EngineResult<()> {
        self.gate.require(guild_id, actor_id, Access::Administrator).await?;
        self.reset_unchecked(user_id).await
    }

    /// Detaches a user from the ledger without an authorization check.
    pub(crate) async fn reset_unchecked(&self, user_id: UserId) -> EngineResult<()> {
        self.store.ledger.update(|l| l.reset(user_id)).await?;
        info!("Ledger entry of {} reset", user_id);
        Ok(())
    }

    pub async fn reset_all(&self, guild_id: GuildId, actor_id: UserId) -> EngineResult<()> {
        self.gate.require(guild_id, actor_id, Access::Administrator).await?;
        self.store.ledger.update(|l| l.reset_all()).await?;
        info!("Ledger wiped by {}", actor_id);
        Ok(())
    }

    pub async fn bind_code(
        &self,
        guild_id: GuildId,
        actor_id: UserId,
        code: &str,
        user_id: UserId,
    ) -> EngineResult<Option<UserId>> {
        self.gate.require(guild_id, actor_id, Access::Administrator).await?;
        let code = code.trim();
        if code.is_empty() || code.contains(char::is_whitespace) {
            return Err(EngineError::validation("invite code must be a single word"));
        }
        let previous = self.store.ledger.update(|l| l.bind_code(code, user_id)).await?;
        Ok(previous)
    }

    pub async fn unbind_code(&self, guild_id: GuildId, actor_id: UserId, code: &str) -> EngineResult<UserId> {
        self.gate.require(guild_id, actor_id, Access::Administrator).await?;
        self.store
            .ledger
            .update(|l| l.unbind_code(code.trim()))
            .await?
            .ok_or_else(|| EngineError::not_found(format!("binding for `{}`", code.trim())))
    }

    /// Copies the whole ledger into the backup slot.
    pub async fn backup(&self, guild_id: GuildId, actor_id: UserId) -> EngineResult<DateTime<Utc>> {
        self.gate.require(guild_id, actor_id, Access::Administrator).await?;
        let ledger = self.store.ledger.snapshot().await;
        let taken_at = Utc::now();
        self.store
            .ledger_backup
            .update(|b| *b = Some(LedgerBackup { taken_at, ledger }))
            .await?;
        info!("Ledger backup taken by {}", actor_id);
        Ok(taken_at)
    }

    /// Replaces the live ledger with the backup, all or nothing.
    pub async fn restore(&self, guild_id: GuildId, actor_id: UserId) -> EngineResult<DateTime<Utc>> {
        self.gate.require(guild_id, actor_id, Access::Administrator).await?;
        let backup = self
            .store
            .ledger_backup
            .snapshot()
            .await
            .ok_or_else(|| EngineError::not_found("ledger backup"))?;

        self.store.ledger.update(|l| *l = backup.ledger).await?;
        info!("Ledger restored from {} by {}", backup.taken_at, actor_id);
        Ok(backup.taken_at)
    }
}
