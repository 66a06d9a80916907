use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StateDocuments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StateDocuments::Name)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StateDocuments::Body).json().not_null())
                    .col(
                        ColumnDef::new(StateDocuments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StateDocuments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StateDocuments {
    Table,
    Name,
    Body,
    UpdatedAt,
}
