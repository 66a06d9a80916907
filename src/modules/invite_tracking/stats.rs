use crate::services::platform::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw counters for one inviter. `manual` is a signed staff adjustment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InviterStats {
    pub joins: i64,
    pub rejoins: i64,
    pub left: i64,
    pub manual: i64,
}

impl InviterStats {
    pub fn credited(&self) -> i64 {
        (self.joins + self.rejoins - self.left + self.manual).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvitedMember {
    pub invite_code: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub active: bool,
    pub left_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    First,
    Rejoin,
}

/// The attribution ledger: every map the join/leave accounting touches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerState {
    pub stats: HashMap<UserId, InviterStats>,
    /// Member to the inviter last credited for them.
    pub member_inviters: HashMap<UserId, UserId>,
    /// Manual code bindings, consulted before the platform's invite creator.
    pub invite_owners: HashMap<String, UserId>,
    pub invited_members: HashMap<UserId, HashMap<UserId, InvitedMember>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerBackup {
    pub taken_at: DateTime<Utc>,
    pub ledger: LedgerState,
}

impl LedgerState {
    pub fn stats(&self, user_id: UserId) -> InviterStats {
        self.stats.get(&user_id).copied().unwrap_or_default()
    }

    /// Blacklisted inviters read as zero; their counters are left intact.
    pub fn credited(&self, user_id: UserId, blacklisted: bool) -> i64 {
        if blacklisted {
            return 0;
        }
        self.stats(user_id).credited()
    }

    pub fn inviter_of(&self, member_id: UserId) -> Option<UserId> {
        self.member_inviters.get(&member_id).copied()
    }

    pub fn record_join(
        &mut self,
        member_id: UserId,
        inviter_id: UserId,
        invite_code: Option<&str>,
        at: DateTime<Utc>,
    ) -> JoinKind {
        let kind = if self.member_inviters.contains_key(&member_id) {
            JoinKind::Rejoin
        } else {
            JoinKind::First
        };

        let stats = self.stats.entry(inviter_id).or_default();
        match kind {
            JoinKind::First => stats.joins += 1,
            JoinKind::Rejoin => stats.rejoins += 1,
        }

        self.member_inviters.insert(member_id, inviter_id);
        self.invited_members.entry(inviter_id).or_default().insert(
            member_id,
            InvitedMember {
                invite_code: invite_code.map(str::to_string),
                joined_at: at,
                active: true,
                left_at: None,
            },
        );

        kind
    }

    /// Credits a leave to the member's last inviter. The member mapping is
    /// kept so a later rejoin counts as a rejoin.
    pub fn record_leave(&mut self, member_id: UserId, at: DateTime<Utc>) -> Option<UserId> {
        let inviter_id = self.inviter_of(member_id)?;

        self.stats.entry(inviter_id).or_default().left += 1;
        if let Some(record) = self
            .invited_members
            .get_mut(&inviter_id)
            .and_then(|bucket| bucket.get_mut(&member_id))
        {
            record.active = false;
            record.left_at = Some(at);
        }

        Some(inviter_id)
    }

    pub fn adjust_manual(&mut self, user_id: UserId, delta: i64) -> InviterStats {
        let stats = self.stats.entry(user_id).or_default();
        stats.manual += delta;
        *stats
    }

    /// Fully detaches a user: counters, invited history, and every reverse
    /// link naming them as inviter or code owner.
    pub fn reset(&mut self, user_id: UserId) {
        self.stats.remove(&user_id);
        self.invited_members.remove(&user_id);
        self.member_inviters.retain(|_, inviter| *inviter != user_id);
        self.invite_owners.retain(|_, owner| *owner != user_id);
    }

    pub fn reset_all(&mut self) {
        *self = LedgerState::default();
    }

    pub fn bind_code(&mut self, code: &str, user_id: UserId) -> Option<UserId> {
        self.invite_owners.insert(code.to_string(), user_id)
    }

    pub fn unbind_code(&mut self, code: &str) -> Option<UserId> {
        self.invite_owners.remove(code)
    }

    /// Inviters ordered by credited invites, highest first, ties by id.
    pub fn leaderboard(&self, limit: usize, is_blacklisted: impl Fn(UserId) -> bool) -> Vec<(UserId, i64)> {
        let mut rows: Vec<(UserId, i64)> = self
            .stats
            .keys()
            .map(|&user_id| (user_id, self.credited(user_id, is_blacklisted(user_id))))
            .filter(|(_, credited)| *credited > 0)
            .collect();

        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        rows.truncate(limit);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: UserId = 100;
    const B: UserId = 200;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn credited_matches_formula_and_clamps() {
        let stats = InviterStats {
            joins: 3,
            rejoins: 1,
            left: 2,
            manual: -1,
        };
        assert_eq!(stats.credited(), 1);

        let negative = InviterStats {
            manual: -10,
            ..stats
        };
        assert_eq!(negative.credited(), 0);
    }

    #[test]
    fn rejoin_after_leave_counts_as_rejoin() {
        let mut ledger = LedgerState::default();

        assert_eq!(ledger.record_join(1, A, Some("abc"), now()), JoinKind::First);
        assert_eq!(ledger.record_leave(1, now()), Some(A));
        assert_eq!(ledger.record_join(1, A, Some("abc"), now()), JoinKind::Rejoin);

        let stats = ledger.stats(A);
        assert_eq!((stats.joins, stats.rejoins, stats.left), (1, 1, 1));
        assert_eq!(stats.credited(), 1);

        let record = &ledger.invited_members[&A][&1];
        assert!(record.active);
        assert!(record.left_at.is_none());
    }

    #[test]
    fn leave_marks_history_inactive() {
        let mut ledger = LedgerState::default();
        ledger.record_join(1, A, None, now());
        ledger.record_leave(1, now());

        let record = &ledger.invited_members[&A][&1];
        assert!(!record.active);
        assert!(record.left_at.is_some());
        assert_eq!(ledger.inviter_of(1), Some(A));
    }

    #[test]
    fn leave_of_untracked_member_is_ignored() {
        let mut ledger = LedgerState::default();
        assert_eq!(ledger.record_leave(9, now()), None);
        assert!(ledger.stats.is_empty());
    }

    #[test]
    fn reset_detaches_reverse_links() {
        let mut ledger = LedgerState::default();
        ledger.bind_code("vip", A);
        ledger.record_join(1, A, Some("vip"), now());
        ledger.record_join(2, B, None, now());

        ledger.reset(A);

        assert_eq!(ledger.stats(A), InviterStats::default());
        assert!(!ledger.invited_members.contains_key(&A));
        assert!(!ledger.invite_owners.contains_key("vip"));
        assert_eq!(ledger.inviter_of(1), None);
        assert_eq!(ledger.inviter_of(2), Some(B));

        // The member leaving afterwards must not re-credit A.
        assert_eq!(ledger.record_leave(1, now()), None);
        assert_eq!(ledger.stats(A), InviterStats::default());
    }

    #[test]
    fn blacklist_scenario_reads_zero_without_touching_counters() {
        let mut ledger = LedgerState::default();
        ledger.stats.insert(
            A,
            InviterStats {
                joins: 3,
                rejoins: 0,
                left: 1,
                manual: 0,
            },
        );

        assert_eq!(ledger.credited(A, false), 2);
        assert_eq!(ledger.credited(A, true), 0);
        assert_eq!(ledger.credited(A, false), 2);
    }

    #[test]
    fn credited_tracks_any_event_sequence() {
        let mut ledger = LedgerState::default();
        let members: Vec<UserId> = (1..=6).collect();

        for (step, &member) in members.iter().cycle().take(30).enumerate() {
            if step % 3 == 2 {
                ledger.record_leave(member, now());
            } else {
                ledger.record_join(member, A, None, now());
            }
            let s = ledger.stats(A);
            assert_eq!(ledger.credited(A, false), (s.joins + s.rejoins - s.left + s.manual).max(0));
            assert_eq!(ledger.credited(A, true), 0);
        }
    }

    #[test]
    fn leaderboard_orders_and_skips_blacklisted() {
        let mut ledger = LedgerState::default();
        ledger.adjust_manual(A, 3);
        ledger.adjust_manual(B, 5);
        ledger.adjust_manual(300, 3);
        ledger.adjust_manual(400, -2);

        assert_eq!(ledger.leaderboard(10, |_| false), vec![(B, 5), (A, 3), (300, 3)]);
        assert_eq!(ledger.leaderboard(1, |u| u == B), vec![(A, 3)]);
    }
}
