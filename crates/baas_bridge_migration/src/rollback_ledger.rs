//! 回滚账本表的定义
//!
//! 账本表按需创建：首次写入失败时由调用方补建后重试一次。

use sea_orm_migration::prelude::*;

pub const ROLLBACK_LEDGER_TABLE: &str = "rollback_migrations";

/// 创建回滚账本表（已存在时不做任何事）
pub async fn create_rollback_ledger_table(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(RollbackMigrations::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(RollbackMigrations::Version)
                        .string_len(14)
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(RollbackMigrations::Name).string().not_null())
                .col(ColumnDef::new(RollbackMigrations::DownSql).text().not_null())
                .col(
                    ColumnDef::new(RollbackMigrations::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp()),
                )
                .to_owned(),
        )
        .await
}

pub async fn has_rollback_ledger_table(manager: &SchemaManager<'_>) -> Result<bool, DbErr> {
    manager.has_table(ROLLBACK_LEDGER_TABLE).await
}

#[derive(DeriveIden)]
enum RollbackMigrations {
    Table,
    Version,
    Name,
    DownSql,
    CreatedAt,
}
