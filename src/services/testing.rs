//! In-process fakes shared by the unit tests.

use crate::modules::automod::filter::AutomodService;
use crate::modules::config::settings::SettingsService;
use crate::modules::giveaways::scheduler::GiveawayService;
use crate::modules::invite_tracking::tracking::InviteTracker;
use crate::modules::rewards::workflow::RewardService;
use crate::modules::tickets::machine::TicketService;
use crate::services::app_config::{RewardConfig, TicketConfig};
use crate::services::gate::AuthorizationGate;
use crate::services::platform::{
    ChannelId, ChannelInfo, ChannelSpec, GuildId, InviteInfo, MessageId, OutboundMessage, Platform,
    PlatformError, RoleId, UserId,
};
use crate::services::store::{DocumentBackend, StateStore, StoreError, Table};
use crate::services::webhook::{PayoutNotifier, PayoutRequest};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<Table, serde_json::Value>>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn put(&self, table: Table, body: serde_json::Value) {
        self.documents.lock().unwrap().insert(table, body);
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn load(&self, table: Table) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.documents.lock().unwrap().get(&table).cloned())
    }

    async fn save(&self, table: Table, body: serde_json::Value) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".into()));
        }
        self.documents.lock().unwrap().insert(table, body);
        Ok(())
    }
}

#[derive(Default)]
struct PlatformState {
    invites: HashMap<GuildId, Vec<InviteInfo>>,
    admins: HashSet<(GuildId, UserId)>,
    roles: HashMap<(GuildId, UserId), Vec<RoleId>>,
    role_names: HashMap<GuildId, Vec<(RoleId, String)>>,
    channels: HashMap<ChannelId, (GuildId, ChannelInfo, Option<ChannelSpec>)>,
    sent: Vec<(ChannelId, MessageId, OutboundMessage)>,
    edits: Vec<(ChannelId, MessageId, OutboundMessage)>,
    deleted_messages: Vec<(ChannelId, MessageId)>,
    dms: Vec<(UserId, String)>,
}

/// Records every call; failures can be switched on per capability.
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<PlatformState>,
    next_id: AtomicU64,
    fail_invites: AtomicBool,
    fail_dms: AtomicBool,
}

impl FakePlatform {
    fn id(&self) -> u64 {
        10_000 + self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn set_invites(&self, guild_id: GuildId, invites: Vec<InviteInfo>) {
        self.state.lock().unwrap().invites.insert(guild_id, invites);
    }

    pub fn fail_invites(&self, fail: bool) {
        self.fail_invites.store(fail, Ordering::SeqCst);
    }

    pub fn fail_dms(&self, fail: bool) {
        self.fail_dms.store(fail, Ordering::SeqCst);
    }

    pub fn make_admin(&self, guild_id: GuildId, user_id: UserId) {
        self.state.lock().unwrap().admins.insert((guild_id, user_id));
    }

    pub fn give_roles(&self, guild_id: GuildId, user_id: UserId, roles: &[RoleId]) {
        self.state
            .lock()
            .unwrap()
            .roles
            .entry((guild_id, user_id))
            .or_default()
            .extend_from_slice(roles);
    }

    pub fn name_role(&self, guild_id: GuildId, role_id: RoleId, name: &str) {
        self.state
            .lock()
            .unwrap()
            .role_names
            .entry(guild_id)
            .or_default()
            .push((role_id, name.to_string()));
    }

    pub fn has_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId) -> bool {
        self.state
            .lock()
            .unwrap()
            .roles
            .get(&(guild_id, user_id))
            .is_some_and(|r| r.contains(&role_id))
    }

    pub fn channel(&self, channel_id: ChannelId) -> Option<ChannelInfo> {
        self.state
            .lock()
            .unwrap()
            .channels
            .get(&channel_id)
            .map(|(_, info, _)| info.clone())
    }

    pub fn created_spec(&self, channel_id: ChannelId) -> Option<ChannelSpec> {
        self.state
            .lock()
            .unwrap()
            .channels
            .get(&channel_id)
            .and_then(|(_, _, spec)| spec.clone())
    }

    pub fn sent_to(&self, channel_id: ChannelId) -> Vec<OutboundMessage> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|(c, _, _)| *c == channel_id)
            .map(|(_, _, m)| m.clone())
            .collect()
    }

    pub fn last_edit(&self, message_id: MessageId) -> Option<(ChannelId, OutboundMessage)> {
        self.state
            .lock()
            .unwrap()
            .edits
            .iter()
            .rev()
            .find(|(_, m, _)| *m == message_id)
            .map(|(c, _, msg)| (*c, msg.clone()))
    }

    pub fn deleted_messages(&self) -> Vec<(ChannelId, MessageId)> {
        self.state.lock().unwrap().deleted_messages.clone()
    }

    pub fn dms_to(&self, user_id: UserId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .dms
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn fetch_invites(&self, guild_id: GuildId) -> Result<Vec<InviteInfo>, PlatformError> {
        if self.fail_invites.load(Ordering::SeqCst) {
            return Err(PlatformError("missing access".into()));
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .invites
            .get(&guild_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, channel_id: ChannelId, message: OutboundMessage) -> Result<MessageId, PlatformError> {
        let id = self.id();
        self.state.lock().unwrap().sent.push((channel_id, id, message));
        Ok(id)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        message: OutboundMessage,
    ) -> Result<(), PlatformError> {
        self.state
            .lock()
            .unwrap()
            .edits
            .push((channel_id, message_id, message));
        Ok(())
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), PlatformError> {
        self.state
            .lock()
            .unwrap()
            .deleted_messages
            .push((channel_id, message_id));
        Ok(())
    }

    async fn create_channel(&self, guild_id: GuildId, spec: ChannelSpec) -> Result<ChannelId, PlatformError> {
        let id = self.id();
        let info = ChannelInfo {
            id,
            name: spec.name.clone(),
            topic: Some(spec.topic.clone()),
        };
        self.state
            .lock()
            .unwrap()
            .channels
            .insert(id, (guild_id, info, Some(spec)));
        Ok(id)
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError> {
        match self.state.lock().unwrap().channels.remove(&channel_id) {
            Some(_) => Ok(()),
            None => Err(PlatformError("unknown channel".into())),
        }
    }

    async fn list_channels(&self, guild_id: GuildId) -> Result<Vec<ChannelInfo>, PlatformError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .channels
            .values()
            .filter(|(g, _, _)| *g == guild_id)
            .map(|(_, info, _)| info.clone())
            .collect())
    }

    async fn add_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId) -> Result<(), PlatformError> {
        self.give_roles(guild_id, user_id, &[role_id]);
        Ok(())
    }

    async fn direct_message(&self, user_id: UserId, content: String) -> Result<(), PlatformError> {
        if self.fail_dms.load(Ordering::SeqCst) {
            return Err(PlatformError("cannot send messages to this user".into()));
        }
        self.state.lock().unwrap().dms.push((user_id, content));
        Ok(())
    }

    async fn member_roles(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<RoleId>, PlatformError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .roles
            .get(&(guild_id, user_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn role_names(&self, guild_id: GuildId) -> Result<Vec<(RoleId, String)>, PlatformError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .role_names
            .get(&guild_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn is_administrator(&self, guild_id: GuildId, user_id: UserId) -> Result<bool, PlatformError> {
        Ok(self.state.lock().unwrap().admins.contains(&(guild_id, user_id)))
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    requests: Mutex<Vec<(String, PayoutRequest)>>,
    fail: AtomicBool,
}

impl FakeNotifier {
    pub fn requests(&self) -> Vec<(String, PayoutRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PayoutNotifier for FakeNotifier {
    async fn notify(&self, endpoint: &str, request: &PayoutRequest) -> Result<(), PlatformError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlatformError("webhook answered 502 Bad Gateway".into()));
        }
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.to_string(), request.clone()));
        Ok(())
    }
}

/// Every service wired against the fakes, with default configuration.
pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub store: Arc<StateStore>,
    pub platform: Arc<FakePlatform>,
    pub notifier: Arc<FakeNotifier>,
    pub gate: Arc<AuthorizationGate>,
    pub settings: Arc<SettingsService>,
    pub tracker: Arc<InviteTracker>,
    pub rewards: Arc<RewardService>,
    pub tickets: Arc<TicketService>,
    pub giveaways: Arc<GiveawayService>,
    pub automod: Arc<AutomodService>,
}

impl Harness {
    pub const OWNER: UserId = 1;

    pub async fn new() -> Self {
        let backend = Arc::new(MemoryBackend::default());
        let store = Arc::new(StateStore::open(backend.clone()).await.unwrap());
        let platform = Arc::new(FakePlatform::default());
        let notifier = Arc::new(FakeNotifier::default());

        let gate = Arc::new(AuthorizationGate::new(
            store.clone(),
            platform.clone(),
            HashSet::from([Self::OWNER]),
        ));
        let settings = Arc::new(SettingsService::new(store.clone(), gate.clone()));
        let tracker = Arc::new(InviteTracker::new(store.clone(), platform.clone(), gate.clone()));
        let rewards = Arc::new(RewardService::new(
            tracker.clone(),
            settings.clone(),
            gate.clone(),
            notifier.clone(),
            RewardConfig::default(),
        ));
        let tickets = Arc::new(TicketService::new(
            platform.clone(),
            gate.clone(),
            settings.clone(),
            tracker.clone(),
            TicketConfig::default(),
            RewardConfig::default().threshold,
        ));
        let giveaways = Arc::new(
            GiveawayService::new(store.clone(), platform.clone(), gate.clone(), tracker.clone())
                .with_rng(StdRng::seed_from_u64(0x5eed)),
        );
        let automod = Arc::new(AutomodService::new(platform.clone(), gate.clone(), settings.clone()));

        Self {
            backend,
            store,
            platform,
            notifier,
            gate,
            settings,
            tracker,
            rewards,
            tickets,
            giveaways,
            automod,
        }
    }
}
