use crate::services::error::EngineError;
use crate::services::platform::UserId;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, poise::ChoiceParameter)]
pub enum TicketKind {
    #[name = "support"]
    Support,
    #[name = "order"]
    Order,
    #[name = "sale"]
    Sale,
    #[name = "reward"]
    Reward,
}

impl TicketKind {
    pub const ALL: [TicketKind; 4] = [
        TicketKind::Support,
        TicketKind::Order,
        TicketKind::Sale,
        TicketKind::Reward,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            TicketKind::Support => "support",
            TicketKind::Order => "order",
            TicketKind::Sale => "sale",
            TicketKind::Reward => "reward",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketKind::Support => "🛟 Support",
            TicketKind::Order => "🛒 Order",
            TicketKind::Sale => "💰 Sale",
            TicketKind::Reward => "🎁 Invite Reward",
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TicketKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketKind::ALL
            .into_iter()
            .find(|k| k.id() == s)
            .ok_or_else(|| EngineError::validation(format!("unknown ticket type `{}`", s)))
    }
}

/// Ticket metadata carried in the channel topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketDescriptor {
    pub opener_id: UserId,
    pub created_at: DateTime<Utc>,
    pub kind: TicketKind,
}

impl TicketDescriptor {
    pub fn encode(&self) -> String {
        format!(
            "opener={};created={};type={}",
            self.opener_id,
            self.created_at.timestamp(),
            self.kind
        )
    }

    /// Parses a channel topic. Anything that is not a ticket topic is `None`.
    pub fn parse(topic: &str) -> Option<Self> {
        let mut opener_id = None;
        let mut created_at = None;
        let mut kind = None;

        for field in topic.trim().split(';') {
            let (key, value) = field.split_once('=')?;
            match key.trim() {
                "opener" => opener_id = value.trim().parse::<UserId>().ok(),
                "created" => {
                    created_at = value
                        .trim()
                        .parse::<i64>()
                        .ok()
                        .and_then(|secs| DateTime::from_timestamp(secs, 0))
                }
                "type" => kind = value.trim().parse::<TicketKind>().ok(),
                _ => {}
            }
        }

        Some(Self {
            opener_id: opener_id?,
            created_at: created_at?,
            kind: kind?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_parse() {
        let descriptor = TicketDescriptor {
            opener_id: 123,
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            kind: TicketKind::Sale,
        };
        assert_eq!(descriptor.encode(), "opener=123;created=1700000000;type=sale");
        assert_eq!(TicketDescriptor::parse(&descriptor.encode()), Some(descriptor));
    }

    #[test]
    fn foreign_topics_are_not_tickets() {
        assert_eq!(TicketDescriptor::parse("General chat, be nice"), None);
        assert_eq!(TicketDescriptor::parse("opener=1;created=2"), None);
        assert_eq!(TicketDescriptor::parse("opener=x;created=2;type=support"), None);
        assert_eq!(TicketDescriptor::parse("opener=1;created=2;type=party"), None);
    }

    #[test]
    fn unknown_kind_is_a_validation_error() {
        assert!(matches!("party".parse::<TicketKind>(), Err(EngineError::Validation(_))));
        assert_eq!("reward".parse::<TicketKind>().unwrap(), TicketKind::Reward);
    }
}
