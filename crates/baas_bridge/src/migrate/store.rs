use async_trait::async_trait;
use baas_bridge_entity::prelude::{IssuedVersion, RollbackMigration, SchemaMigration};
use baas_bridge_entity::sea_orm_active_enums::MigrationStatus;
use baas_bridge_entity::{issued_version, rollback_migration, schema_migration};
use baas_bridge_migration::rollback_ledger::{create_rollback_ledger_table, has_rollback_ledger_table};
use baas_bridge_migration::SchemaManager;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::Serialize;
use tracing::{debug, info};

use super::error::StoreError;
use super::Migration;

/// 迁移历史表：已应用迁移的唯一事实来源
///
/// 所有返回列表的查询均按版本号降序（最新在前）。
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert(
        &self,
        version: &str,
        name: &str,
        status: MigrationStatus,
        applied_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// 返回受影响行数，行不存在时为 0
    async fn delete_by_version(&self, version: &str) -> Result<u64, StoreError>;

    async fn select_all(&self) -> Result<Vec<Migration>, StoreError>;

    async fn select_by_version(&self, version: &str) -> Result<Option<Migration>, StoreError>;

    /// 版本号严格大于 `target` 的迁移
    async fn select_newer_than(&self, target: &str) -> Result<Vec<Migration>, StoreError>;

    /// 最新的 `n` 条迁移
    async fn select_latest(&self, n: u64) -> Result<Vec<Migration>, StoreError>;

    async fn max_version(&self) -> Result<Option<String>, StoreError>;

    /// 登记新发出的版本号，版本号已被占用时返回 false
    async fn reserve_version(&self, version: &str, issued_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// 曾经发出过的最大版本号，包括已被回滚的
    async fn max_issued_version(&self) -> Result<Option<String>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub version: String,
    pub name: String,
    pub down_sql: String,
    pub created_at: DateTime<Utc>,
}

impl From<rollback_migration::Model> for LedgerEntry {
    fn from(model: rollback_migration::Model) -> Self {
        Self {
            version: model.version,
            name: model.name,
            down_sql: model.down_sql,
            created_at: model.created_at,
        }
    }
}

/// 回滚账本：版本号到 down SQL 的映射，记录在迁移回滚后依然保留
#[async_trait]
pub trait RollbackLedger: Send + Sync {
    async fn insert(&self, entry: &LedgerEntry) -> Result<(), StoreError>;

    /// 账本表尚不存在时视为无记录
    async fn select_by_version(&self, version: &str) -> Result<Option<LedgerEntry>, StoreError>;

    /// 补建账本表
    async fn provision(&self) -> Result<(), StoreError>;

    async fn max_version(&self) -> Result<Option<String>, StoreError>;
}

#[derive(Clone)]
pub struct DbHistoryStore {
    db: DatabaseConnection,
}

impl DbHistoryStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for DbHistoryStore {
    async fn insert(
        &self,
        version: &str,
        name: &str,
        status: MigrationStatus,
        applied_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let model = schema_migration::ActiveModel {
            version: Set(version.to_string()),
            name: Set(name.to_string()),
            status: Set(status),
            applied_at: Set(applied_at),
        };
        SchemaMigration::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(StoreError::History)?;
        debug!("历史表写入 {} ({})，状态 {}", version, name, status);
        Ok(())
    }

    async fn delete_by_version(&self, version: &str) -> Result<u64, StoreError> {
        let result = SchemaMigration::delete_by_id(version.to_string())
            .exec(&self.db)
            .await
            .map_err(StoreError::History)?;
        debug!("历史表删除 {}，影响 {} 行", version, result.rows_affected);
        Ok(result.rows_affected)
    }

    async fn select_all(&self) -> Result<Vec<Migration>, StoreError> {
        let rows = SchemaMigration::find()
            .order_by_desc(schema_migration::Column::Version)
            .all(&self.db)
            .await
            .map_err(StoreError::History)?;
        Ok(rows.into_iter().map(Migration::from).collect())
    }

    async fn select_by_version(&self, version: &str) -> Result<Option<Migration>, StoreError> {
        let row = SchemaMigration::find_by_id(version.to_string())
            .one(&self.db)
            .await
            .map_err(StoreError::History)?;
        Ok(row.map(Migration::from))
    }

    async fn select_newer_than(&self, target: &str) -> Result<Vec<Migration>, StoreError> {
        let rows = SchemaMigration::find()
            .filter(schema_migration::Column::Version.gt(target))
            .order_by_desc(schema_migration::Column::Version)
            .all(&self.db)
            .await
            .map_err(StoreError::History)?;
        Ok(rows.into_iter().map(Migration::from).collect())
    }

    async fn select_latest(&self, n: u64) -> Result<Vec<Migration>, StoreError> {
        let rows = SchemaMigration::find()
            .order_by_desc(schema_migration::Column::Version)
            // 绑定参数为 i64
            .limit(n.min(i64::MAX as u64))
            .all(&self.db)
            .await
            .map_err(StoreError::History)?;
        Ok(rows.into_iter().map(Migration::from).collect())
    }

    async fn max_version(&self) -> Result<Option<String>, StoreError> {
        let row = SchemaMigration::find()
            .order_by_desc(schema_migration::Column::Version)
            .one(&self.db)
            .await
            .map_err(StoreError::History)?;
        Ok(row.map(|r| r.version))
    }

    async fn reserve_version(&self, version: &str, issued_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let model = issued_version::ActiveModel {
            version: Set(version.to_string()),
            issued_at: Set(issued_at),
        };
        let rows = IssuedVersion::insert(model)
            .on_conflict(
                OnConflict::column(issued_version::Column::Version)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(StoreError::History)?;
        debug!("登记版本号 {}，写入 {} 行", version, rows);
        Ok(rows > 0)
    }

    async fn max_issued_version(&self) -> Result<Option<String>, StoreError> {
        let row = IssuedVersion::find()
            .order_by_desc(issued_version::Column::Version)
            .one(&self.db)
            .await
            .map_err(StoreError::History)?;
        Ok(row.map(|r| r.version))
    }
}

#[derive(Clone)]
pub struct DbRollbackLedger {
    db: DatabaseConnection,
}

impl DbRollbackLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn table_exists(&self) -> Result<bool, StoreError> {
        has_rollback_ledger_table(&SchemaManager::new(&self.db))
            .await
            .map_err(StoreError::Ledger)
    }
}

#[async_trait]
impl RollbackLedger for DbRollbackLedger {
    async fn insert(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let model = rollback_migration::ActiveModel {
            version: Set(entry.version.clone()),
            name: Set(entry.name.clone()),
            down_sql: Set(entry.down_sql.clone()),
            created_at: Set(entry.created_at),
        };
        RollbackMigration::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(StoreError::Ledger)?;
        debug!("回滚账本写入 {} ({})", entry.version, entry.name);
        Ok(())
    }

    async fn select_by_version(&self, version: &str) -> Result<Option<LedgerEntry>, StoreError> {
        if !self.table_exists().await? {
            debug!("回滚账本表不存在，{} 无回滚数据", version);
            return Ok(None);
        }
        let row = RollbackMigration::find_by_id(version.to_string())
            .one(&self.db)
            .await
            .map_err(StoreError::Ledger)?;
        Ok(row.map(LedgerEntry::from))
    }

    async fn provision(&self) -> Result<(), StoreError> {
        create_rollback_ledger_table(&SchemaManager::new(&self.db))
            .await
            .map_err(StoreError::Ledger)?;
        info!("回滚账本表已创建");
        Ok(())
    }

    async fn max_version(&self) -> Result<Option<String>, StoreError> {
        if !self.table_exists().await? {
            return Ok(None);
        }
        let row = RollbackMigration::find()
            .order_by_desc(rollback_migration::Column::Version)
            .one(&self.db)
            .await
            .map_err(StoreError::Ledger)?;
        Ok(row.map(|r| r.version))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;
    use crate::database::memory_database;

    fn at(s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, s).unwrap()
    }

    #[tokio::test]
    async fn test_history_store_orders_descending() {
        let store = DbHistoryStore::new(memory_database().await);
        for version in ["20240501120001", "20240501120003", "20240501120002"] {
            store
                .insert(version, "m", MigrationStatus::Applied, Some(at(1)))
                .await
                .unwrap();
        }

        let all: Vec<String> = store.select_all().await.unwrap().into_iter().map(|m| m.version).collect();
        assert_eq!(all, vec!["20240501120003", "20240501120002", "20240501120001"]);

        let newer: Vec<String> = store
            .select_newer_than("20240501120001")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.version)
            .collect();
        assert_eq!(newer, vec!["20240501120003", "20240501120002"]);

        let latest = store.select_latest(1).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].version, "20240501120003");

        assert_eq!(store.max_version().await.unwrap().as_deref(), Some("20240501120003"));
    }

    #[tokio::test]
    async fn test_history_store_roundtrip_fields_and_delete() {
        let store = DbHistoryStore::new(memory_database().await);
        store
            .insert("20240501120000", "add_users_table", MigrationStatus::Pending, None)
            .await
            .unwrap();

        let row = store.select_by_version("20240501120000").await.unwrap().unwrap();
        assert_eq!(row.name, "add_users_table");
        assert_eq!(row.status, MigrationStatus::Pending);
        assert_eq!(row.applied_at, None);

        assert_eq!(store.delete_by_version("20240501120000").await.unwrap(), 1);
        // 再次删除不报错，只是影响 0 行
        assert_eq!(store.delete_by_version("20240501120000").await.unwrap(), 0);
        assert!(store.select_by_version("20240501120000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_store_rejects_duplicate_version() {
        let store = DbHistoryStore::new(memory_database().await);
        store
            .insert("20240501120000", "a", MigrationStatus::Applied, Some(at(0)))
            .await
            .unwrap();
        let result = store
            .insert("20240501120000", "b", MigrationStatus::Applied, Some(at(0)))
            .await;
        assert_matches!(result, Err(StoreError::History(_)));
    }

    #[tokio::test]
    async fn test_ledger_missing_table_reads_as_absent_and_write_fails() {
        let ledger = DbRollbackLedger::new(memory_database().await);
        assert!(ledger.select_by_version("20240501120000").await.unwrap().is_none());
        assert!(ledger.max_version().await.unwrap().is_none());

        let entry = LedgerEntry {
            version: "20240501120000".to_string(),
            name: "add_users_table".to_string(),
            down_sql: "DROP TABLE users".to_string(),
            created_at: at(0),
        };
        assert_matches!(ledger.insert(&entry).await, Err(StoreError::Ledger(_)));

        ledger.provision().await.unwrap();
        // 重复补建是无操作
        ledger.provision().await.unwrap();
        ledger.insert(&entry).await.unwrap();

        let stored = ledger.select_by_version("20240501120000").await.unwrap().unwrap();
        assert_eq!(stored.down_sql, "DROP TABLE users");
        assert_eq!(ledger.max_version().await.unwrap().as_deref(), Some("20240501120000"));
    }

    #[tokio::test]
    async fn test_select_latest_accepts_any_count() {
        let store = DbHistoryStore::new(memory_database().await);
        for version in ["20240501120001", "20240501120002"] {
            store
                .insert(version, "m", MigrationStatus::Applied, Some(at(1)))
                .await
                .unwrap();
        }
        let all = store.select_latest(u64::MAX).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].version, "20240501120002");
    }

    #[tokio::test]
    async fn test_reserved_versions_outlive_history_rows() {
        let store = DbHistoryStore::new(memory_database().await);
        assert!(store.max_issued_version().await.unwrap().is_none());

        assert!(store.reserve_version("20240501120000", at(0)).await.unwrap());
        assert!(!store.reserve_version("20240501120000", at(0)).await.unwrap());
        store
            .insert("20240501120000", "m", MigrationStatus::Applied, Some(at(0)))
            .await
            .unwrap();
        store.delete_by_version("20240501120000").await.unwrap();

        assert!(store.max_version().await.unwrap().is_none());
        assert_eq!(
            store.max_issued_version().await.unwrap().as_deref(),
            Some("20240501120000")
        );
    }
}
