use crate::db::entities::state_documents;
use crate::modules::config::settings::GuildConfigs;
use crate::modules::giveaways::model::GiveawayBook;
use crate::modules::invite_tracking::stats::{LedgerBackup, LedgerState};
use crate::services::gate::StopFlags;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("malformed document: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(String),
}

/// One logical table per workflow, each persisted as a single JSON tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Ledger,
    LedgerBackup,
    GuildConfig,
    Giveaways,
    StopFlags,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Ledger => "ledger",
            Table::LedgerBackup => "ledger_backup",
            Table::GuildConfig => "guild_config",
            Table::Giveaways => "giveaways",
            Table::StopFlags => "stop_flags",
        }
    }
}

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn load(&self, table: Table) -> Result<Option<serde_json::Value>, StoreError>;
    async fn save(&self, table: Table, body: serde_json::Value) -> Result<(), StoreError>;
}

/// `state_documents` rows, one per table, rewritten in full on every save.
pub struct DatabaseBackend {
    db: DatabaseConnection,
}

impl DatabaseBackend {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentBackend for DatabaseBackend {
    async fn load(&self, table: Table) -> Result<Option<serde_json::Value>, StoreError> {
        let row = state_documents::Entity::find_by_id(table.name().to_string())
            .one(&self.db)
            .await?;

        Ok(row.map(|r| r.body))
    }

    async fn save(&self, table: Table, body: serde_json::Value) -> Result<(), StoreError> {
        let row = state_documents::ActiveModel {
            name: Set(table.name().to_string()),
            body: Set(body),
            updated_at: Set(Utc::now().into()),
        };

        state_documents::Entity::insert(row)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(state_documents::Column::Name)
                    .update_columns([
                        state_documents::Column::Body,
                        state_documents::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }
}

/// A write-through copy of one table.
///
/// Mutations run against a clone; the clone replaces the live value only
/// after the backend accepted it, so memory never runs ahead of disk.
pub struct Document<T> {
    table: Table,
    backend: Arc<dyn DocumentBackend>,
    state: Mutex<T>,
}

impl<T> Document<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send,
{
    pub async fn open(backend: Arc<dyn DocumentBackend>, table: Table) -> Result<Self, StoreError> {
        let state = match backend.load(table).await? {
            Some(body) => serde_json::from_value(body)?,
            None => {
                debug!("No stored {} document, starting empty", table.name());
                T::default()
            }
        };

        Ok(Self {
            table,
            backend,
            state: Mutex::new(state),
        })
    }

    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.state.lock().await;
        f(&guard)
    }

    pub async fn snapshot(&self) -> T {
        self.state.lock().await.clone()
    }

    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, StoreError> {
        self.try_update(|state| Ok::<R, StoreError>(f(state))).await
    }

    /// Like `update`, but an `Err` from `f` discards the change without writing.
    pub async fn try_update<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;

        let body = serde_json::to_value(&next).map_err(StoreError::from)?;
        self.backend.save(self.table, body).await?;

        *guard = next;
        Ok(out)
    }
}

/// Process-wide durable state.
pub struct StateStore {
    pub ledger: Document<LedgerState>,
    pub ledger_backup: Document<Option<LedgerBackup>>,
    pub guilds: Document<GuildConfigs>,
    pub giveaways: Document<GiveawayBook>,
    pub stop_flags: Document<StopFlags>,
}

impl StateStore {
    pub async fn open(backend: Arc<dyn DocumentBackend>) -> Result<Self, StoreError> {
        let store = Self {
            ledger: Document::open(backend.clone(), Table::Ledger).await?,
            ledger_backup: Document::open(backend.clone(), Table::LedgerBackup).await?,
            guilds: Document::open(backend.clone(), Table::GuildConfig).await?,
            giveaways: Document::open(backend.clone(), Table::Giveaways).await?,
            stop_flags: Document::open(backend, Table::StopFlags).await?,
        };

        info!("State store loaded");
        Ok(store)
    }
}
