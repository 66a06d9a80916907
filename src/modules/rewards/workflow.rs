use crate::modules::config::settings::SettingsService;
use crate::modules::invite_tracking::tracking::InviteTracker;
use crate::services::app_config::RewardConfig;
use crate::services::error::{EngineError, EngineResult};
use crate::services::gate::AuthorizationGate;
use crate::services::platform::{GuildId, UserId};
use crate::services::webhook::{PayoutNotifier, PayoutRequest};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub ok: bool,
    pub invites: i64,
    pub threshold: i64,
}

/// What the claimant submits: where the payout should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimForm {
    pub account: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub invites: i64,
    pub amount: i64,
}

pub struct RewardService {
    tracker: Arc<InviteTracker>,
    settings: Arc<SettingsService>,
    gate: Arc<AuthorizationGate>,
    notifier: Arc<dyn PayoutNotifier>,
    config: RewardConfig,
}

impl RewardService {
    pub fn new(
        tracker: Arc<InviteTracker>,
        settings: Arc<SettingsService>,
        gate: Arc<AuthorizationGate>,
        notifier: Arc<dyn PayoutNotifier>,
        config: RewardConfig,
    ) -> Self {
        Self {
            tracker,
            settings,
            gate,
            notifier,
            config,
        }
    }

    pub fn payout_for(&self, invites: i64) -> i64 {
        invites * self.config.rate
    }

    pub async fn check_eligible(&self, guild_id: GuildId, user_id: UserId) -> Eligibility {
        let invites = self.tracker.credit_for(guild_id, user_id).await;
        Eligibility {
            ok: invites >= self.config.threshold,
            invites,
            threshold: self.config.threshold,
        }
    }

    /// Re-checks eligibility, sends one payout instruction and resets the
    /// claimant's ledger entry only once the webhook acknowledged it.
    pub async fn claim(&self, guild_id: GuildId, user_id: UserId, form: ClaimForm) -> EngineResult<ClaimReceipt> {
        self.gate.ensure_active(guild_id).await?;

        let account = form.account.trim();
        if account.is_empty() {
            return Err(EngineError::validation("payout account must not be empty"));
        }

        // No join may be credited between the check and the reset, or it
        // would be wiped without being paid.
        let _guard = self.tracker.lock_guild(guild_id).await;

        // Invites may have changed since the claim was opened.
        let eligibility = self.check_eligible(guild_id, user_id).await;
        if !eligibility.ok {
            return Err(EngineError::NotEligible {
                have: eligibility.invites,
                need: eligibility.threshold,
            });
        }

        let endpoint = self
            .settings
            .get(guild_id)
            .await?
            .webhook_url
            .ok_or_else(|| EngineError::validation("rewards are not configured on this server (no payout webhook)"))?;

        let request = PayoutRequest {
            guild_id,
            user_id,
            account: account.to_string(),
            note: form.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            invites: eligibility.invites,
            amount: self.payout_for(eligibility.invites),
            requested_at: Utc::now(),
        };

        if let Err(e) = self.notifier.notify(&endpoint, &request).await {
            warn!("Payout for {} in guild {} failed: {}", user_id, guild_id, e);
            return Err(e.into());
        }

        if let Err(e) = self.tracker.reset_unchecked(user_id).await {
            error!(
                "Payout for {} was sent but their ledger entry could not be reset: {}",
                user_id, e
            );
            return Err(e);
        }

        info!(
            "Reward claimed by {} in guild {}: {} invites, amount {}",
            user_id, guild_id, request.invites, request.amount
        );

        Ok(ClaimReceipt {
            invites: request.invites,
            amount: request.amount,
        })
    }
}
