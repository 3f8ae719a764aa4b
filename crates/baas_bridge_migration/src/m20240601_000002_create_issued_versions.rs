use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IssuedVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IssuedVersions::Version)
                            .string_len(14)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IssuedVersions::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 已有历史记录的版本同样视为已发出
        manager
            .get_connection()
            .execute_unprepared("INSERT INTO issued_versions (version) SELECT version FROM schema_migrations")
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IssuedVersions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum IssuedVersions {
    Table,
    Version,
    IssuedAt,
}
