use crate::modules::config::settings::SettingsService;
use crate::modules::invite_tracking::tracking::InviteTracker;
use crate::modules::tickets::descriptor::{TicketDescriptor, TicketKind};
use crate::services::app_config::TicketConfig;
use crate::services::error::{EngineError, EngineResult};
use crate::services::gate::{Access, AuthorizationGate};
use crate::services::locks::KeyedLocks;
use crate::services::platform::{
    Button, ChannelId, ChannelSpec, GuildId, MessageId, OutboundMessage, Platform, UserId,
};
use crate::services::timers::TimerSet;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CLOSE_BUTTON_ID: &str = "ticket:close";
pub const OPEN_BUTTON_PREFIX: &str = "ticket:open:";

/// A live ticket channel, parsed from its topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub channel_id: ChannelId,
    pub name: String,
    pub descriptor: TicketDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureSummary {
    pub ticket: Ticket,
    pub closed_by: UserId,
    pub reason: String,
    pub closed_at: DateTime<Utc>,
    pub opener_notified: bool,
}

/// Support/order/sale/reward channels: `open -> closing -> deleted`, plus the
/// staff operation timer that force-closes a ticket.
pub struct TicketService {
    platform: Arc<dyn Platform>,
    gate: Arc<AuthorizationGate>,
    settings: Arc<SettingsService>,
    tracker: Arc<InviteTracker>,
    config: TicketConfig,
    reward_threshold: i64,
    open_locks: KeyedLocks<(GuildId, UserId)>,
    closing: Arc<DashSet<ChannelId>>,
    deletions: TimerSet<ChannelId>,
    operations: TimerSet<ChannelId>,
}

impl TicketService {
    pub fn new(
        platform: Arc<dyn Platform>,
        gate: Arc<AuthorizationGate>,
        settings: Arc<SettingsService>,
        tracker: Arc<InviteTracker>,
        config: TicketConfig,
        reward_threshold: i64,
    ) -> Self {
        Self {
            platform,
            gate,
            settings,
            tracker,
            config,
            reward_threshold,
            open_locks: KeyedLocks::new(),
            closing: Arc::new(DashSet::new()),
            deletions: TimerSet::new(),
            operations: TimerSet::new(),
        }
    }

    pub fn min_invites(&self, kind: TicketKind) -> i64 {
        match kind {
            TicketKind::Reward => self.reward_threshold,
            _ => 0,
        }
    }

    pub fn is_closing(&self, channel_id: ChannelId) -> bool {
        self.closing.contains(&channel_id)
    }

    pub async fn tickets_in(&self, guild_id: GuildId) -> EngineResult<Vec<Ticket>> {
        let channels = self.platform.list_channels(guild_id).await?;
        Ok(channels
            .into_iter()
            .filter_map(|c| {
                let descriptor = TicketDescriptor::parse(c.topic.as_deref()?)?;
                Some(Ticket {
                    channel_id: c.id,
                    name: c.name,
                    descriptor,
                })
            })
            .collect())
    }

    pub async fn ticket(&self, guild_id: GuildId, channel_id: ChannelId) -> EngineResult<Ticket> {
        self.tickets_in(guild_id)
            .await?
            .into_iter()
            .find(|t| t.channel_id == channel_id)
            .ok_or_else(|| EngineError::not_found("ticket in this channel"))
    }

    /// Posts the panel members use to open tickets.
    pub async fn post_panel(&self, guild_id: GuildId, channel_id: ChannelId, actor_id: UserId) -> EngineResult<MessageId> {
        self.gate.require(guild_id, actor_id, Access::Staff).await?;

        let mut message = OutboundMessage::text(
            "🎫 **Need help?** Pick a ticket type below and a private channel will be opened for you.",
        );
        for kind in TicketKind::ALL {
            message = message.with_button(Button::new(
                format!("{}{}", OPEN_BUTTON_PREFIX, kind.id()),
                kind.label(),
            ));
        }

        Ok(self.platform.send_message(channel_id, message).await?)
    }

    /// `none -> open`. One open ticket per opener; reward tickets are gated
    /// behind the invite threshold.
    pub async fn open(&self, guild_id: GuildId, opener_id: UserId, kind: TicketKind) -> EngineResult<Ticket> {
        self.gate.ensure_active(guild_id).await?;
        let _guard = self.open_locks.lock((guild_id, opener_id)).await;

        if let Some(existing) = self
            .tickets_in(guild_id)
            .await?
            .into_iter()
            .find(|t| t.descriptor.opener_id == opener_id && !self.is_closing(t.channel_id))
        {
            return Err(EngineError::TicketAlreadyOpen {
                channel_id: existing.channel_id,
            });
        }

        let need = self.min_invites(kind);
        if need > 0 {
            let have = self.tracker.credit_for(guild_id, opener_id).await;
            if have < need {
                return Err(EngineError::NotEligible { have, need });
            }
        }

        let settings = self.settings.get(guild_id).await?;
        let descriptor = TicketDescriptor {
            opener_id,
            created_at: Utc::now(),
            kind,
        };
        let name = format!("{}-{}", kind.id(), opener_id);

        let channel_id = self
            .platform
            .create_channel(
                guild_id,
                ChannelSpec {
                    name: name.clone(),
                    category_id: self.config.categories.get(&kind).copied(),
                    topic: descriptor.encode(),
                    member_ids: vec![opener_id],
                    role_ids: settings.staff_role_ids.iter().copied().collect(),
                },
            )
            .await?;

        let greeting = OutboundMessage::text(format!(
            "Welcome <@{}>! Staff will be with you shortly. Describe your {} request here.",
            opener_id,
            kind.id()
        ))
        .with_button(Button::new(CLOSE_BUTTON_ID, "🔒 Close"));
        if let Err(e) = self.platform.send_message(channel_id, greeting).await {
            warn!("Failed to greet in ticket {}: {}", channel_id, e);
        }

        info!("Ticket {} ({}) opened by {} in guild {}", channel_id, kind, opener_id, guild_id);

        Ok(Ticket {
            channel_id,
            name,
            descriptor,
        })
    }

    /// `open -> closing`, then `deleted` after the grace delay. Notifying the
    /// opener and posting the notice are best-effort.
    pub async fn close(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        actor_id: UserId,
        reason: &str,
    ) -> EngineResult<ClosureSummary> {
        self.gate.ensure_active(guild_id).await?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("a reason is required to close a ticket"));
        }

        let ticket = self.ticket(guild_id, channel_id).await?;
        if self.is_closing(channel_id) {
            return Err(EngineError::Conflict("this ticket is already closing".into()));
        }

        if ticket.descriptor.opener_id != actor_id
            && self.gate.access_level(guild_id, actor_id).await < Access::Staff
        {
            return Err(EngineError::Unauthorized("the ticket opener or staff".into()));
        }

        if !self.closing.insert(channel_id) {
            return Err(EngineError::Conflict("this ticket is already closing".into()));
        }
        self.operations.cancel(&channel_id);

        let closed_at = Utc::now();
        let feedback = self.settings.get(guild_id).await?.channels.feedback;

        let mut summary = format!(
            "🎫 Your ticket **{}** ({}) was closed by <@{}>.\n**Reason:** {}\n**Opened:** <t:{}:f>\n**Closed:** <t:{}:f>",
            ticket.name,
            ticket.descriptor.kind.label(),
            actor_id,
            reason,
            ticket.descriptor.created_at.timestamp(),
            closed_at.timestamp(),
        );
        if let Some(feedback_id) = feedback {
            summary.push_str(&format!(
                "\nWe'd love to hear how it went, leave your feedback in <#{}>.",
                feedback_id
            ));
        }

        let opener_notified = match self
            .platform
            .direct_message(ticket.descriptor.opener_id, summary)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                debug!("Could not DM opener of ticket {}: {}", channel_id, e);
                false
            }
        };

        let grace = self.config.close_grace;
        let notice = OutboundMessage::text(format!(
            "🔒 Ticket closed by <@{}>: {}\nThis channel will be deleted in {} seconds.",
            actor_id,
            reason,
            grace.as_secs()
        ));
        if let Err(e) = self.platform.send_message(channel_id, notice).await {
            warn!("Failed to post closing notice in {}: {}", channel_id, e);
        }

        self.schedule_deletion(channel_id, grace);
        info!("Ticket {} closed by {}: {}", channel_id, actor_id, reason);

        Ok(ClosureSummary {
            ticket,
            closed_by: actor_id,
            reason: reason.to_string(),
            closed_at,
            opener_notified,
        })
    }

    fn schedule_deletion(&self, channel_id: ChannelId, delay: Duration) {
        let platform = self.platform.clone();
        let closing = self.closing.clone();
        self.deletions.arm(channel_id, delay, async move {
            // The channel may already be gone.
            if let Err(e) = platform.delete_channel(channel_id).await {
                debug!("Deleting ticket channel {} failed: {}", channel_id, e);
            } else {
                info!("Ticket channel {} deleted", channel_id);
            }
            closing.remove(&channel_id);
        });
    }

    /// Grants the customer role to the opener, nudges them towards the
    /// feedback channel and force-closes the ticket after `duration`.
    /// Returns true when an earlier timer on this channel was replaced.
    pub async fn start_operation(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        actor_id: UserId,
        duration: Duration,
    ) -> EngineResult<bool> {
        self.gate.require(guild_id, actor_id, Access::Staff).await?;

        let ticket = self.ticket(guild_id, channel_id).await?;
        if self.is_closing(channel_id) {
            return Err(EngineError::Conflict("this ticket is already closing".into()));
        }

        let settings = self.settings.get(guild_id).await?;
        let role_id = settings
            .customer_role_id
            .ok_or_else(|| EngineError::validation("no customer role is configured"))?;

        let opener_id = ticket.descriptor.opener_id;
        if let Err(e) = self.platform.add_role(guild_id, opener_id, role_id).await {
            warn!("Failed to grant customer role to {}: {}", opener_id, e);
        }

        if let Some(feedback_id) = settings.channels.feedback {
            let nudge = OutboundMessage::text(format!(
                "✅ <@{}>, thanks for your purchase! Please leave a review in <#{}>.",
                opener_id, feedback_id
            ));
            if let Err(e) = self.platform.send_message(channel_id, nudge).await {
                warn!("Failed to post feedback nudge in {}: {}", channel_id, e);
            }
        }

        let replaced = self.operations.is_armed(&channel_id);
        let platform = self.platform.clone();
        let closing = self.closing.clone();
        self.operations.arm(channel_id, duration, async move {
            if !closing.insert(channel_id) {
                return;
            }
            if let Err(e) = platform.delete_channel(channel_id).await {
                debug!("Operation timer could not delete ticket {}: {}", channel_id, e);
            } else {
                info!("Operation timer deleted ticket {}", channel_id);
            }
            closing.remove(&channel_id);
        });

        info!(
            "Operation timer of {:?} started on ticket {} by {}",
            duration, channel_id, actor_id
        );
        Ok(replaced)
    }

    /// Returns false when no operation timer was pending on the channel.
    pub async fn cancel_operation(&self, guild_id: GuildId, channel_id: ChannelId, actor_id: UserId) -> EngineResult<bool> {
        self.gate.require(guild_id, actor_id, Access::Staff).await?;
        let cancelled = self.operations.cancel(&channel_id);
        if cancelled {
            info!("Operation timer on {} cancelled by {}", channel_id, actor_id);
        }
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::config::settings::ChannelKind;
    use crate::services::testing::Harness;

    const GUILD: GuildId = 1;
    const ADMIN: UserId = 50;
    const STAFF: UserId = 60;
    const STAFF_ROLE: u64 = 900;
    const OPENER: UserId = 7;

    async fn harness() -> Harness {
        let h = Harness::new().await;
        h.platform.make_admin(GUILD, ADMIN);
        h.platform.give_roles(GUILD, STAFF, &[STAFF_ROLE]);
        h.settings.add_staff_role(GUILD, ADMIN, STAFF_ROLE).await.unwrap();
        h
    }

    #[tokio::test]
    async fn opening_creates_private_channel_with_descriptor() {
        let h = harness().await;

        let ticket = h.tickets.open(GUILD, OPENER, TicketKind::Support).await.unwrap();
        let spec = h.platform.created_spec(ticket.channel_id).unwrap();

        assert_eq!(spec.member_ids, vec![OPENER]);
        assert_eq!(spec.role_ids, vec![STAFF_ROLE]);
        let descriptor = TicketDescriptor::parse(&spec.topic).unwrap();
        assert_eq!(descriptor.opener_id, OPENER);
        assert_eq!(descriptor.kind, TicketKind::Support);
    }

    #[tokio::test]
    async fn second_ticket_is_rejected_with_existing_reference() {
        let h = harness().await;
        let first = h.tickets.open(GUILD, OPENER, TicketKind::Order).await.unwrap();

        match h.tickets.open(GUILD, OPENER, TicketKind::Sale).await {
            Err(EngineError::TicketAlreadyOpen { channel_id }) => {
                assert_eq!(channel_id, first.channel_id)
            }
            other => panic!("expected TicketAlreadyOpen, got {:?}", other),
        }
        assert_eq!(h.tickets.tickets_in(GUILD).await.unwrap().len(), 1);

        // Someone else can still open one.
        h.tickets.open(GUILD, 8, TicketKind::Sale).await.unwrap();
    }

    #[tokio::test]
    async fn reward_ticket_requires_threshold() {
        let h = harness().await;
        h.tracker.adjust_manual(GUILD, ADMIN, OPENER, 4).await.unwrap();

        assert!(matches!(
            h.tickets.open(GUILD, OPENER, TicketKind::Reward).await,
            Err(EngineError::NotEligible { have: 4, need: 5 })
        ));

        h.tracker.adjust_manual(GUILD, ADMIN, OPENER, 1).await.unwrap();
        h.tickets.open(GUILD, OPENER, TicketKind::Reward).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn close_notifies_and_deletes_after_grace() {
        let h = harness().await;
        h.settings
            .set_channel(GUILD, ADMIN, ChannelKind::Feedback, Some(444))
            .await
            .unwrap();
        let ticket = h.tickets.open(GUILD, OPENER, TicketKind::Support).await.unwrap();

        let summary = h
            .tickets
            .close(GUILD, ticket.channel_id, STAFF, "resolved")
            .await
            .unwrap();
        assert!(summary.opener_notified);

        let dms = h.platform.dms_to(OPENER);
        assert_eq!(dms.len(), 1);
        assert!(dms[0].contains("resolved"));
        assert!(dms[0].contains("<#444>"));
        assert!(h.tickets.is_closing(ticket.channel_id));

        // A second close during the grace delay is a conflict.
        assert!(matches!(
            h.tickets.close(GUILD, ticket.channel_id, OPENER, "again").await,
            Err(EngineError::Conflict(_))
        ));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(h.platform.channel(ticket.channel_id).is_none());
        assert!(!h.tickets.is_closing(ticket.channel_id));
    }

    #[tokio::test(start_paused = true)]
    async fn close_proceeds_when_dm_fails() {
        let h = harness().await;
        h.platform.fail_dms(true);
        let ticket = h.tickets.open(GUILD, OPENER, TicketKind::Support).await.unwrap();

        let summary = h
            .tickets
            .close(GUILD, ticket.channel_id, OPENER, "done")
            .await
            .unwrap();
        assert!(!summary.opener_notified);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(h.platform.channel(ticket.channel_id).is_none());
    }

    #[tokio::test]
    async fn close_requires_reason_and_authority() {
        let h = harness().await;
        let ticket = h.tickets.open(GUILD, OPENER, TicketKind::Support).await.unwrap();

        assert!(matches!(
            h.tickets.close(GUILD, ticket.channel_id, OPENER, "   ").await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            h.tickets.close(GUILD, ticket.channel_id, 99, "spam").await,
            Err(EngineError::Unauthorized(_))
        ));
        assert!(matches!(
            h.tickets.close(GUILD, 12345, STAFF, "nope").await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn operation_timer_grants_role_and_replaces_previous() {
        let h = harness().await;
        h.settings.set_customer_role(GUILD, ADMIN, Some(321)).await.unwrap();
        let ticket = h.tickets.open(GUILD, OPENER, TicketKind::Order).await.unwrap();

        assert!(!h
            .tickets
            .start_operation(GUILD, ticket.channel_id, STAFF, Duration::from_secs(60))
            .await
            .unwrap());
        assert!(h.platform.has_role(GUILD, OPENER, 321));

        assert!(h
            .tickets
            .start_operation(GUILD, ticket.channel_id, STAFF, Duration::from_secs(600))
            .await
            .unwrap());

        // The first timer would have fired by now.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(h.platform.channel(ticket.channel_id).is_some());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(h.platform.channel(ticket.channel_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_reports_missing_timer() {
        let h = harness().await;
        h.settings.set_customer_role(GUILD, ADMIN, Some(321)).await.unwrap();
        let ticket = h.tickets.open(GUILD, OPENER, TicketKind::Order).await.unwrap();

        assert!(!h.tickets.cancel_operation(GUILD, ticket.channel_id, STAFF).await.unwrap());

        h.tickets
            .start_operation(GUILD, ticket.channel_id, STAFF, Duration::from_secs(30))
            .await
            .unwrap();
        assert!(h.tickets.cancel_operation(GUILD, ticket.channel_id, STAFF).await.unwrap());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(h.platform.channel(ticket.channel_id).is_some());
    }

    #[tokio::test]
    async fn operation_needs_staff_and_customer_role() {
        let h = harness().await;
        let ticket = h.tickets.open(GUILD, OPENER, TicketKind::Order).await.unwrap();

        assert!(matches!(
            h.tickets
                .start_operation(GUILD, ticket.channel_id, OPENER, Duration::from_secs(5))
                .await,
            Err(EngineError::Unauthorized(_))
        ));
        assert!(matches!(
            h.tickets
                .start_operation(GUILD, ticket.channel_id, STAFF, Duration::from_secs(5))
                .await,
            Err(EngineError::Validation(_))
        ));
    }
}
