pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_schema_migrations;
mod m20240601_000002_create_issued_versions;
pub mod rollback_ledger;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        // 回滚账本表不在启动迁移中创建，由账本在首次写入时自行补建
        vec![
            Box::new(m20240601_000001_create_schema_migrations::Migration),
            Box::new(m20240601_000002_create_issued_versions::Migration),
        ]
    }
}
