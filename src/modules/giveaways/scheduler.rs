use crate::modules::giveaways::model::{EntryToggle, Giveaway};
use crate::modules::giveaways::selection::pick_winners;
use crate::modules::invite_tracking::tracking::InviteTracker;
use crate::services::error::{EngineError, EngineResult};
use crate::services::gate::{Access, AuthorizationGate};
use crate::services::platform::{Button, ChannelId, GuildId, MessageId, OutboundMessage, Platform, UserId};
use crate::services::store::StateStore;
use crate::services::timers::{MAX_TIMER, TimerSet, sleep_capped};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

pub const ENTER_BUTTON_ID: &str = "giveaway:enter";

/// Parameters of a new giveaway.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub channel_id: ChannelId,
    pub duration: Duration,
    pub winner_count: u32,
    pub prize: String,
    pub min_invites: i64,
}

pub struct GiveawayService {
    store: Arc<StateStore>,
    platform: Arc<dyn Platform>,
    gate: Arc<AuthorizationGate>,
    tracker: Arc<InviteTracker>,
    timers: TimerSet<MessageId>,
    timer_cap: Duration,
    rng: Mutex<StdRng>,
}

impl GiveawayService {
    pub fn new(
        store: Arc<StateStore>,
        platform: Arc<dyn Platform>,
        gate: Arc<AuthorizationGate>,
        tracker: Arc<InviteTracker>,
    ) -> Self {
        Self {
            store,
            platform,
            gate,
            tracker,
            timers: TimerSet::new(),
            timer_cap: MAX_TIMER,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Longest single wait a completion timer arms before re-evaluating.
    pub fn with_timer_cap(mut self, cap: Duration) -> Self {
        self.timer_cap = cap;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    fn draw(&self, entries: &[UserId], count: usize) -> Vec<UserId> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        pick_winners(entries, count, &mut *rng)
    }

    pub async fn get(&self, message_id: MessageId) -> Option<Giveaway> {
        self.store.giveaways.read(|b| b.get(message_id).cloned()).await
    }

    async fn require(&self, message_id: MessageId) -> EngineResult<Giveaway> {
        self.get(message_id)
            .await
            .ok_or_else(|| EngineError::not_found("giveaway"))
    }

    pub async fn list_active(&self, guild_id: GuildId) -> Vec<Giveaway> {
        let mut active: Vec<Giveaway> = self
            .store
            .giveaways
            .read(|b| b.active().filter(|g| g.guild_id == guild_id).cloned().collect())
            .await;
        active.sort_by_key(|g| g.ends_at);
        active
    }

    pub async fn launch(
        self: &Arc<Self>,
        guild_id: GuildId,
        host_id: UserId,
        request: LaunchRequest,
    ) -> EngineResult<Giveaway> {
        self.gate.require(guild_id, host_id, Access::Staff).await?;

        let prize = request.prize.trim().to_string();
        if prize.is_empty() {
            return Err(EngineError::validation("prize must not be empty"));
        }
        if request.winner_count == 0 {
            return Err(EngineError::validation("a giveaway needs at least one winner"));
        }
        if request.min_invites < 0 {
            return Err(EngineError::validation("minimum invites cannot be negative"));
        }
        let length = chrono::Duration::from_std(request.duration)
            .map_err(|_| EngineError::validation("giveaway duration is too long"))?;
        let ends_at = Utc::now()
            .checked_add_signed(length)
            .ok_or_else(|| EngineError::validation("giveaway duration is too long"))?;

        let mut giveaway = Giveaway {
            guild_id,
            channel_id: request.channel_id,
            message_id: 0,
            prize,
            winner_count: request.winner_count,
            host_id,
            ends_at,
            entries: Default::default(),
            ended: false,
            min_invites: request.min_invites,
            last_winners: Vec::new(),
        };

        giveaway.message_id = self
            .platform
            .send_message(giveaway.channel_id, render(&giveaway))
            .await?;

        let stored = giveaway.clone();
        if let Err(e) = self
            .store
            .giveaways
            .update(|b| b.giveaways.insert(stored.message_id, stored))
            .await
        {
            // Without a record nobody can enter, so take the announcement down.
            if let Err(cleanup) = self
                .platform
                .delete_message(giveaway.channel_id, giveaway.message_id)
                .await
            {
                warn!("Failed to remove orphaned giveaway message {}: {}", giveaway.message_id, cleanup);
            }
            return Err(e.into());
        }

        self.schedule_completion(giveaway.message_id).await;
        info!(
            "Giveaway {} for '{}' launched by {} in guild {}, ends at {}",
            giveaway.message_id, giveaway.prize, host_id, guild_id, giveaway.ends_at
        );

        Ok(giveaway)
    }

    /// Enters the user, or withdraws them if they already entered.
    pub async fn toggle_entry(&self, message_id: MessageId, user_id: UserId) -> EngineResult<EntryToggle> {
        let giveaway = self.require(message_id).await?;
        self.gate.ensure_active(giveaway.guild_id).await?;
        if giveaway.ended {
            return Err(EngineError::GiveawayEnded);
        }

        let have = if giveaway.min_invites > 0 {
            self.tracker.credit_for(giveaway.guild_id, user_id).await
        } else {
            0
        };

        // Join or leave is decided against the stored entries, under the
        // document lock, so concurrent toggles stay each other's inverse.
        self.store
            .giveaways
            .try_update(|b| {
                let g = b
                    .giveaways
                    .get_mut(&message_id)
                    .ok_or_else(|| EngineError::not_found("giveaway"))?;
                if g.ended {
                    return Err(EngineError::GiveawayEnded);
                }
                if g.entries.remove(&user_id) {
                    return Ok(EntryToggle::Left);
                }
                if g.min_invites > 0 && have < g.min_invites {
                    return Err(EngineError::NotEligible {
                        have,
                        need: g.min_invites,
                    });
                }
                g.entries.insert(user_id);
                Ok(EntryToggle::Joined)
            })
            .await
    }

    async fn ensure_host_or_staff(&self, giveaway: &Giveaway, actor_id: UserId) -> EngineResult<()> {
        self.gate.ensure_active(giveaway.guild_id).await?;
        if actor_id == giveaway.host_id {
            return Ok(());
        }
        if self.gate.access_level(giveaway.guild_id, actor_id).await < Access::Staff {
            return Err(EngineError::Unauthorized("the giveaway host or staff".into()));
        }
        Ok(())
    }

    /// Ends a giveaway before its scheduled time.
    pub async fn end(&self, message_id: MessageId, actor_id: UserId) -> EngineResult<Giveaway> {
        let giveaway = self.require(message_id).await?;
        self.ensure_host_or_staff(&giveaway, actor_id).await?;
        if giveaway.ended {
            return Err(EngineError::GiveawayEnded);
        }

        self.timers.cancel(&message_id);
        self.complete(message_id)
            .await?
            .ok_or(EngineError::GiveawayEnded)
    }

    /// Draws a new set of winners from the recorded entries. Allowed after the
    /// giveaway ended; leaves `ended` and the entries untouched.
    pub async fn reroll(&self, message_id: MessageId, actor_id: UserId) -> EngineResult<Vec<UserId>> {
        let giveaway = self.require(message_id).await?;
        self.ensure_host_or_staff(&giveaway, actor_id).await?;

        let updated = self
            .store
            .giveaways
            .try_update(|b| {
                let g = b
                    .giveaways
                    .get_mut(&message_id)
                    .ok_or_else(|| EngineError::not_found("giveaway"))?;
                if g.entries.is_empty() {
                    return Err(EngineError::validation("nobody entered this giveaway"));
                }
                let entries: Vec<UserId> = g.entries.iter().copied().collect();
                g.last_winners = self.draw(&entries, g.winner_count as usize);
                Ok(g.clone())
            })
            .await?;

        let announcement = OutboundMessage::text(format!(
            "🔁 New winner{} for **{}**: {}",
            if updated.last_winners.len() == 1 { "" } else { "s" },
            updated.prize,
            mentions(&updated.last_winners)
        ));
        if let Err(e) = self.platform.send_message(updated.channel_id, announcement).await {
            warn!("Failed to announce reroll of giveaway {}: {}", message_id, e);
        }

        info!("Giveaway {} rerolled by {}: {:?}", message_id, actor_id, updated.last_winners);
        Ok(updated.last_winners)
    }

    /// Marks the giveaway ended and draws winners in one persisted step.
    /// Returns `None` when it had already ended.
    pub async fn complete(&self, message_id: MessageId) -> EngineResult<Option<Giveaway>> {
        let completed = self
            .store
            .giveaways
            .try_update(|b| -> EngineResult<Option<Giveaway>> {
                let g = b
                    .giveaways
                    .get_mut(&message_id)
                    .ok_or_else(|| EngineError::not_found("giveaway"))?;
                if g.ended {
                    return Ok(None);
                }
                g.ended = true;
                let entries: Vec<UserId> = g.entries.iter().copied().collect();
                g.last_winners = self.draw(&entries, g.winner_count as usize);
                Ok(Some(g.clone()))
            })
            .await?;

        let Some(giveaway) = completed else {
            return Ok(None);
        };

        if let Err(e) = self
            .platform
            .edit_message(giveaway.channel_id, giveaway.message_id, render(&giveaway))
            .await
        {
            warn!("Failed to update announcement of giveaway {}: {}", message_id, e);
        }

        if !giveaway.last_winners.is_empty() {
            let announcement = OutboundMessage::text(format!(
                "🎉 Congratulations {}! You won **{}**!",
                mentions(&giveaway.last_winners),
                giveaway.prize
            ));
            if let Err(e) = self.platform.send_message(giveaway.channel_id, announcement).await {
                warn!("Failed to announce winners of giveaway {}: {}", message_id, e);
            }
        }

        info!(
            "Giveaway {} completed with {} entries, winners {:?}",
            message_id,
            giveaway.entries.len(),
            giveaway.last_winners
        );
        Ok(Some(giveaway))
    }

    /// Arms the completion timer from the persisted end time. Calling it again
    /// while a timer is pending is a no-op. Past-due giveaways complete at once.
    pub async fn schedule_completion(self: &Arc<Self>, message_id: MessageId) -> bool {
        let Some(giveaway) = self.get(message_id).await else {
            return false;
        };
        if giveaway.ended {
            return false;
        }

        let remaining = (giveaway.ends_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let deadline = tokio::time::Instant::now() + remaining;
        let cap = self.timer_cap;
        let this = Arc::clone(self);

        self.timers.arm_once(message_id, move |_| async move {
            sleep_capped(deadline, cap).await;
            if let Err(e) = this.complete(message_id).await {
                error!("Failed to complete giveaway {}: {}", message_id, e);
            }
        })
    }

    /// Re-arms every giveaway that has not ended yet. Run once on startup.
    pub async fn resume_all(self: &Arc<Self>) -> usize {
        let pending: Vec<MessageId> = self
            .store
            .giveaways
            .read(|b| b.active().map(|g| g.message_id).collect())
            .await;

        let mut armed = 0;
        for message_id in pending {
            if self.schedule_completion(message_id).await {
                armed += 1;
            }
        }

        info!("Resumed {} pending giveaway(s)", armed);
        armed
    }

    pub fn is_scheduled(&self, message_id: MessageId) -> bool {
        self.timers.is_armed(&message_id)
    }
}

fn mentions(users: &[UserId]) -> String {
    users
        .iter()
        .map(|u| format!("<@{}>", u))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The announcement as it should currently look.
pub fn render(giveaway: &Giveaway) -> OutboundMessage {
    let mut content = format!(
        "🎉 **GIVEAWAY** 🎉\n**Prize:** {}\n**Winners:** {}\n**Hosted by:** <@{}>\n",
        giveaway.prize, giveaway.winner_count, giveaway.host_id
    );
    if giveaway.min_invites > 0 {
        content.push_str(&format!("**Required invites:** {}\n", giveaway.min_invites));
    }

    if giveaway.ended {
        content.push_str(&format!("**Ended:** <t:{}:f>\n", giveaway.ends_at.timestamp()));
        if giveaway.last_winners.is_empty() {
            content.push_str("No valid entries.");
        } else {
            content.push_str(&format!("**Won by:** {}", mentions(&giveaway.last_winners)));
        }
    } else {
        content.push_str(&format!("**Ends:** <t:{}:R>", giveaway.ends_at.timestamp()));
    }

    OutboundMessage::text(content)
        .with_button(Button::new(ENTER_BUTTON_ID, "🎉 Enter").disabled(giveaway.ended))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::Harness;
    use std::collections::BTreeSet;

    const GUILD: GuildId = 1;
    const CHANNEL: ChannelId = 300;
    const HOST: UserId = 60;
    const STAFF_ROLE: u64 = 900;

    async fn harness() -> Harness {
        let h = Harness::new().await;
        h.platform.make_admin(GUILD, 50);
        h.platform.give_roles(GUILD, HOST, &[STAFF_ROLE]);
        h.settings.add_staff_role(GUILD, 50, STAFF_ROLE).await.unwrap();
        h
    }

    fn request(duration: Duration, winners: u32) -> LaunchRequest {
        LaunchRequest {
            channel_id: CHANNEL,
            duration,
            winner_count: winners,
            prize: "Nitro".into(),
            min_invites: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn toggling_twice_restores_entries() {
        let h = harness().await;
        let g = h
            .giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(3600), 1))
            .await
            .unwrap();

        assert_eq!(h.giveaways.toggle_entry(g.message_id, 5).await.unwrap(), EntryToggle::Joined);
        assert_eq!(h.giveaways.toggle_entry(g.message_id, 5).await.unwrap(), EntryToggle::Left);
        assert!(h.giveaways.get(g.message_id).await.unwrap().entries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn min_invites_gate_joining() {
        let h = harness().await;
        let mut req = request(Duration::from_secs(3600), 1);
        req.min_invites = 2;
        let g = h.giveaways.launch(GUILD, HOST, req).await.unwrap();

        assert!(matches!(
            h.giveaways.toggle_entry(g.message_id, 5).await,
            Err(EngineError::NotEligible { have: 0, need: 2 })
        ));

        h.tracker.adjust_manual(GUILD, 50, 5, 2).await.unwrap();
        assert_eq!(h.giveaways.toggle_entry(g.message_id, 5).await.unwrap(), EntryToggle::Joined);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_is_allowed_below_min_invites() {
        let h = harness().await;
        let mut req = request(Duration::from_secs(3600), 1);
        req.min_invites = 2;
        let g = h.giveaways.launch(GUILD, HOST, req).await.unwrap();

        h.tracker.adjust_manual(GUILD, 50, 5, 2).await.unwrap();
        assert_eq!(h.giveaways.toggle_entry(g.message_id, 5).await.unwrap(), EntryToggle::Joined);

        h.tracker.adjust_manual(GUILD, 50, 5, -2).await.unwrap();
        assert_eq!(h.giveaways.toggle_entry(g.message_id, 5).await.unwrap(), EntryToggle::Left);
        assert!(h.giveaways.get(g.message_id).await.unwrap().entries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_toggles_cancel_out() {
        let h = harness().await;
        let g = h
            .giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(3600), 1))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            h.giveaways.toggle_entry(g.message_id, 5),
            h.giveaways.toggle_entry(g.message_id, 5)
        );
        let outcomes = BTreeSet::from([format!("{:?}", a.unwrap()), format!("{:?}", b.unwrap())]);
        assert_eq!(outcomes.len(), 2);
        assert!(h.giveaways.get(g.message_id).await.unwrap().entries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn all_entries_win_when_fewer_than_winner_count() {
        let h = harness().await;
        let g = h
            .giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(60), 5))
            .await
            .unwrap();
        for user in [1, 2, 3] {
            h.giveaways.toggle_entry(g.message_id, user).await.unwrap();
        }

        let ended = h.giveaways.end(g.message_id, HOST).await.unwrap();
        let winners: BTreeSet<UserId> = ended.last_winners.iter().copied().collect();
        assert_eq!(ended.last_winners.len(), 3);
        assert_eq!(winners, BTreeSet::from([1, 2, 3]));
        assert!(!h.giveaways.is_scheduled(g.message_id));

        // The announcement now carries a disabled control.
        let (_, edited) = h.platform.last_edit(g.message_id).unwrap();
        assert!(edited.buttons[0].disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_giveaway_rejects_everything_but_reroll() {
        let h = harness().await;
        let g = h
            .giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(60), 1))
            .await
            .unwrap();
        h.giveaways.toggle_entry(g.message_id, 1).await.unwrap();
        h.giveaways.toggle_entry(g.message_id, 2).await.unwrap();
        let ended = h.giveaways.end(g.message_id, HOST).await.unwrap();

        assert!(matches!(
            h.giveaways.toggle_entry(g.message_id, 3).await,
            Err(EngineError::GiveawayEnded)
        ));
        assert!(matches!(
            h.giveaways.end(g.message_id, HOST).await,
            Err(EngineError::GiveawayEnded)
        ));
        assert!(h.giveaways.complete(g.message_id).await.unwrap().is_none());

        let after = h.giveaways.get(g.message_id).await.unwrap();
        assert_eq!(after.entries, ended.entries);
        assert_eq!(after.last_winners, ended.last_winners);

        let rerolled = h.giveaways.reroll(g.message_id, HOST).await.unwrap();
        assert_eq!(rerolled.len(), 1);
        let after = h.giveaways.get(g.message_id).await.unwrap();
        assert!(after.ended);
        assert_eq!(after.entries, ended.entries);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_giveaway_ends_without_winners() {
        let h = harness().await;
        let g = h
            .giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(60), 2))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        let after = h.giveaways.get(g.message_id).await.unwrap();
        assert!(after.ended);
        assert!(after.last_winners.is_empty());

        assert!(matches!(
            h.giveaways.reroll(g.message_id, HOST).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn long_delay_completes_through_capped_waits() {
        let h = harness().await;
        let giveaways = Arc::new(
            GiveawayService::new(h.store.clone(), h.platform.clone(), h.gate.clone(), h.tracker.clone())
                .with_timer_cap(Duration::from_secs(10)),
        );

        let g = giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(95), 1))
            .await
            .unwrap();
        giveaways.toggle_entry(g.message_id, 4).await.unwrap();

        tokio::time::sleep(Duration::from_secs(94)).await;
        assert!(!giveaways.get(g.message_id).await.unwrap().ended);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let after = giveaways.get(g.message_id).await.unwrap();
        assert!(after.ended);
        assert_eq!(after.last_winners, vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduling_is_idempotent_and_resumes_past_due() {
        let h = harness().await;
        let g = h
            .giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(3600), 1))
            .await
            .unwrap();
        assert!(!h.giveaways.schedule_completion(g.message_id).await);

        // A giveaway persisted by an earlier run whose end has already passed.
        let stale = Giveaway {
            message_id: 777,
            ends_at: Utc::now() - chrono::Duration::hours(2),
            entries: BTreeSet::from([9]),
            ..g.clone()
        };
        h.store
            .giveaways
            .update(|b| b.giveaways.insert(777, stale))
            .await
            .unwrap();

        assert_eq!(h.giveaways.resume_all().await, 1);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let after = h.giveaways.get(777).await.unwrap();
        assert!(after.ended);
        assert_eq!(after.last_winners, vec![9]);
        assert!(!h.giveaways.get(g.message_id).await.unwrap().ended);
    }

    #[tokio::test(start_paused = true)]
    async fn only_host_or_staff_may_end() {
        let h = harness().await;
        let g = h
            .giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(60), 1))
            .await
            .unwrap();

        assert!(matches!(
            h.giveaways.end(g.message_id, 1234).await,
            Err(EngineError::Unauthorized(_))
        ));
        assert!(matches!(
            h.giveaways.launch(GUILD, 1234, request(Duration::from_secs(60), 1)).await,
            Err(EngineError::Unauthorized(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn list_active_skips_ended() {
        let h = harness().await;
        let first = h
            .giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(60), 1))
            .await
            .unwrap();
        let second = h
            .giveaways
            .launch(GUILD, HOST, request(Duration::from_secs(120), 1))
            .await
            .unwrap();
        h.giveaways.end(first.message_id, HOST).await.unwrap();

        let active = h.giveaways.list_active(GUILD).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message_id, second.message_id);
    }
}
