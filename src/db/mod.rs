use sea_orm::{Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migrations;

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut opt = sea_orm::ConnectOptions::new(database_url.to_owned());
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    info!("Connecting to database...");
    let db = Database::connect(opt).await?;
    info!("Database connection established");

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::migrations::Migrator;
    use crate::services::store::{DatabaseBackend, DocumentBackend, Table};
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;

    #[tokio::test]
    async fn documents_round_trip_through_sqlite() {
        let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
        opt.max_connections(1).min_connections(1);
        let db = Database::connect(opt).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let backend = DatabaseBackend::new(db);
        assert!(backend.load(Table::Giveaways).await.unwrap().is_none());

        backend
            .save(Table::Giveaways, serde_json::json!({ "giveaways": {} }))
            .await
            .unwrap();
        backend
            .save(Table::Giveaways, serde_json::json!({ "giveaways": { "1": null } }))
            .await
            .unwrap();

        let body = backend.load(Table::Giveaways).await.unwrap().unwrap();
        assert_eq!(body, serde_json::json!({ "giveaways": { "1": null } }));
    }
}
