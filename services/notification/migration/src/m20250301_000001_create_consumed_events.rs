use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConsumedEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsumedEvents::EventId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ConsumedEvents::EventType).string().not_null())
                    .col(ColumnDef::new(ConsumedEvents::Email).string().not_null())
                    .col(
                        ColumnDef::new(ConsumedEvents::ProcessedAt)
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
            .drop_table(Table::drop().table(ConsumedEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ConsumedEvents {
    Table,
    EventId,
    EventType,
    Email,
    ProcessedAt,
}
