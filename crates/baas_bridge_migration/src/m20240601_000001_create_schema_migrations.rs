use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SchemaMigrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SchemaMigrations::Version)
                            .string_len(14)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SchemaMigrations::Name).string().not_null())
                    .col(
                        ColumnDef::new(SchemaMigrations::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(SchemaMigrations::AppliedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SchemaMigrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SchemaMigrations {
    Table,
    Version,
    Name,
    Status,
    AppliedAt,
}
