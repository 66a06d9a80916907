use crate::services::platform::{GuildId, PlatformError, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// The payout instruction sent to the guild's webhook.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PayoutRequest {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub account: String,
    pub note: Option<String>,
    pub invites: i64,
    pub amount: i64,
    pub requested_at: DateTime<Utc>,
}

#[async_trait]
pub trait PayoutNotifier: Send + Sync {
    /// Delivers one payout instruction. Only a 2xx acknowledgment is success.
    async fn notify(&self, endpoint: &str, request: &PayoutRequest) -> Result<(), PlatformError>;
}

pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayoutNotifier for WebhookNotifier {
    async fn notify(&self, endpoint: &str, request: &PayoutRequest) -> Result<(), PlatformError> {
        let content = format!(
            "💸 Invite reward claim from <@{}>: **{}** invites → **{}** to `{}`",
            request.user_id, request.invites, request.amount, request.account
        );

        let resp = self
            .client
            .post(endpoint)
            .json(&serde_json::json!({
                "content": content,
                "payout": request,
            }))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| PlatformError(format!("payout webhook unreachable: {e}")))?;

        if resp.status().is_success() {
            info!(
                "Payout webhook accepted claim of user {} in guild {}",
                request.user_id, request.guild_id
            );
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(PlatformError(format!("payout webhook error {status}: {body}")))
        }
    }
}
