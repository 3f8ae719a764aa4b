use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::{MigrationError, StoreError};
use super::gateway::ExecutionGateway;
use super::store::{HistoryStore, LedgerEntry, RollbackLedger};
use super::version::{is_valid_version, Clock, VersionAllocator};
use super::{BulkRollback, Migration, MigrationStatus, RollbackOutcome};

/// 版本号登记冲突时的最大尝试次数
const MAX_RESERVE_ATTEMPTS: usize = 16;

pub struct MigrationEngine {
    gateway: Arc<dyn ExecutionGateway>,
    history: Arc<dyn HistoryStore>,
    ledger: Arc<dyn RollbackLedger>,
    clock: Arc<dyn Clock>,
    allocator: VersionAllocator,
}

impl MigrationEngine {
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        history: Arc<dyn HistoryStore>,
        ledger: Arc<dyn RollbackLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            history,
            ledger,
            allocator: VersionAllocator::new(clock.clone()),
            clock,
        }
    }

    /// 创建只有正向 SQL 的迁移
    ///
    /// 执行失败时仍以 `pending` 状态记录该版本，版本号就此占用，需人工在库外补完变更；
    /// 原始执行错误通过 [`MigrationError::Execution`] 返回。
    pub async fn create_forward_only(&self, name: &str, forward_sql: &str) -> Result<Migration, MigrationError> {
        validate_name(name)?;
        validate_payload("forward SQL", forward_sql)?;

        let version = self.next_version().await?;
        info!("创建迁移 {} ({})", version, name);

        match self.gateway.apply(forward_sql).await {
            Ok(()) => {
                let applied_at = self.clock.now();
                self.history
                    .insert(&version, name, MigrationStatus::Applied, Some(applied_at))
                    .await?;
                info!("迁移 {} 已应用", version);
                Ok(Migration {
                    version,
                    name: name.to_string(),
                    status: MigrationStatus::Applied,
                    applied_at: Some(applied_at),
                    forward_sql: Some(forward_sql.to_string()),
                    down_sql: None,
                })
            }
            Err(source) => {
                error!("迁移 {} 执行失败: {}", version, source);
                let pending = match self.history.insert(&version, name, MigrationStatus::Pending, None).await {
                    Ok(()) => {
                        warn!("迁移 {} 已记录为 pending，需要人工处理", version);
                        Some(Box::new(Migration {
                            version: version.clone(),
                            name: name.to_string(),
                            status: MigrationStatus::Pending,
                            applied_at: None,
                            forward_sql: Some(forward_sql.to_string()),
                            down_sql: None,
                        }))
                    }
                    Err(e) => {
                        error!("记录 pending 迁移 {} 失败: {}", version, e);
                        None
                    }
                };
                Err(MigrationError::Execution {
                    version,
                    source,
                    pending,
                })
            }
        }
    }

    /// 创建可回滚的迁移：正向成功后把 down SQL 写入回滚账本
    ///
    /// 账本写入失败时补建账本表并重试一次；仍失败则返回 [`MigrationError::LedgerWrite`]，
    /// 已应用的正向迁移不会被撤销。
    pub async fn create_reversible(
        &self,
        name: &str,
        forward_sql: &str,
        down_sql: &str,
    ) -> Result<Migration, MigrationError> {
        validate_name(name)?;
        validate_payload("forward SQL", forward_sql)?;
        validate_payload("down SQL", down_sql)?;

        let mut migration = self.create_forward_only(name, forward_sql).await?;
        migration.down_sql = Some(down_sql.to_string());

        let entry = LedgerEntry {
            version: migration.version.clone(),
            name: name.to_string(),
            down_sql: down_sql.to_string(),
            created_at: self.clock.now(),
        };

        if let Err(first) = self.ledger.insert(&entry).await {
            warn!("写入回滚账本失败，补建账本表后重试: {}", first);
            let retried = match self.ledger.provision().await {
                Ok(()) => self.ledger.insert(&entry).await,
                Err(e) => Err(e),
            };
            if let Err(source) = retried {
                error!("迁移 {} 的 down SQL 未能保存: {}", migration.version, source);
                return Err(MigrationError::LedgerWrite {
                    version: migration.version.clone(),
                    migration: Box::new(migration),
                    source,
                });
            }
        }

        info!("迁移 {} 的 down SQL 已写入回滚账本", migration.version);
        Ok(migration)
    }

    /// 全部迁移，最新在前
    pub async fn list_migrations(&self) -> Result<Vec<Migration>, MigrationError> {
        Ok(self.history.select_all().await?)
    }

    pub async fn get_status(&self, version: &str) -> Result<Migration, MigrationError> {
        validate_version(version)?;
        self.history
            .select_by_version(version)
            .await?
            .ok_or_else(|| MigrationError::NotFound(version.to_string()))
    }

    /// 回滚单个版本；给出 down SQL 时先执行它，否则只删除历史记录
    pub async fn rollback_migration(
        &self,
        version: &str,
        down_sql: Option<&str>,
    ) -> Result<RollbackOutcome, MigrationError> {
        validate_version(version)?;
        if let Some(sql) = down_sql {
            validate_payload("down SQL", sql)?;
        }
        self.ensure_recorded(version).await?;
        self.rollback_one(version, down_sql).await
    }

    /// 使用回滚账本中保存的 down SQL 回滚单个版本
    pub async fn rollback_migration_with_stored_down(&self, version: &str) -> Result<RollbackOutcome, MigrationError> {
        validate_version(version)?;
        let entry = self
            .ledger
            .select_by_version(version)
            .await?
            .ok_or_else(|| MigrationError::NoRollbackDataFound(version.to_string()))?;
        self.ensure_recorded(version).await?;
        self.rollback_one(version, Some(&entry.down_sql)).await
    }

    /// 回滚所有版本号大于 `target` 的迁移（仅删除历史记录），从新到旧
    pub async fn rollback_to_version(&self, target: &str) -> Result<BulkRollback, MigrationError> {
        validate_version(target)?;
        let mut rows = self.history.select_newer_than(target).await?;
        rows.retain(|m| m.version.as_str() > target);
        info!("回滚到版本 {}，共 {} 个迁移", target, rows.len());
        Ok(self.remove_newest_first(rows).await)
    }

    /// 回滚最新的 `count` 个迁移（仅删除历史记录），从新到旧
    pub async fn rollback_last_n(&self, count: u64) -> Result<BulkRollback, MigrationError> {
        if count == 0 {
            return Err(MigrationError::Validation("count must be at least 1".to_string()));
        }
        let rows = self.history.select_latest(count).await?;
        info!("回滚最近 {} 个迁移，实际 {} 个", count, rows.len());
        Ok(self.remove_newest_first(rows).await)
    }

    /// 分配并登记新版本号
    ///
    /// 下限取历史表、已发出版本表与回滚账本中的最大值，登记冲突（其他进程抢先）时顺延重试。
    async fn next_version(&self) -> Result<String, MigrationError> {
        let history_max = self.history.max_version().await?;
        let issued_max = self.history.max_issued_version().await?;
        let ledger_max = self.ledger.max_version().await?;
        let mut floor = history_max.max(issued_max).max(ledger_max);

        for _ in 0..MAX_RESERVE_ATTEMPTS {
            let version = self.allocator.allocate_after(floor.as_deref());
            if self.history.reserve_version(&version, self.clock.now()).await? {
                return Ok(version);
            }
            warn!("版本号 {} 已被占用，顺延重试", version);
            floor = Some(version);
        }
        Err(MigrationError::VersionConflict(format!(
            "no free version after {} attempts",
            MAX_RESERVE_ATTEMPTS
        )))
    }

    async fn ensure_recorded(&self, version: &str) -> Result<(), MigrationError> {
        match self.history.select_by_version(version).await? {
            Some(_) => Ok(()),
            None => Err(MigrationError::NotFound(version.to_string())),
        }
    }

    /// 所有回滚策略共用的单版本回滚
    ///
    /// down SQL 执行失败时保留历史行，使记录与实际状态一致；账本记录始终保留。
    async fn rollback_one(&self, version: &str, down_sql: Option<&str>) -> Result<RollbackOutcome, MigrationError> {
        if let Some(sql) = down_sql {
            if let Err(source) = self.gateway.apply(sql).await {
                error!("迁移 {} 的 down SQL 执行失败，历史记录保持不变: {}", version, source);
                return Err(MigrationError::Execution {
                    version: version.to_string(),
                    source,
                    pending: None,
                });
            }
        }

        let removed = self.remove_history_row(version).await? > 0;
        info!(
            "迁移 {} 已回滚{}",
            version,
            if down_sql.is_some() { "" } else { "（仅历史记录）" }
        );
        Ok(RollbackOutcome {
            version: version.to_string(),
            down_applied: down_sql.is_some(),
            removed,
        })
    }

    async fn remove_history_row(&self, version: &str) -> Result<u64, StoreError> {
        let rows = self.history.delete_by_version(version).await?;
        if rows == 0 {
            // 并发回滚已删除该行
            debug!("迁移 {} 的历史记录已不存在，视为无操作", version);
        }
        Ok(rows)
    }

    async fn remove_newest_first(&self, mut rows: Vec<Migration>) -> BulkRollback {
        rows.sort_by(|a, b| b.version.cmp(&a.version));

        let mut result = BulkRollback::default();
        for migration in rows {
            match self.remove_history_row(&migration.version).await {
                Ok(0) => continue,
                Ok(_) => result.rolled_back.push(migration.version),
                Err(e) => {
                    warn!(
                        "批量回滚在 {} 处中断，已回滚 {} 个: {}",
                        migration.version,
                        result.rolled_back.len(),
                        e
                    );
                    result.failed_version = Some(migration.version);
                    result.failure = Some(e);
                    break;
                }
            }
        }
        result
    }
}

fn validate_version(version: &str) -> Result<(), MigrationError> {
    if is_valid_version(version) {
        Ok(())
    } else {
        Err(MigrationError::Validation(format!(
            "version must be 14 digits (YYYYMMDDHHMMSS), got {:?}",
            version
        )))
    }
}

fn validate_name(name: &str) -> Result<(), MigrationError> {
    if name.trim().is_empty() {
        return Err(MigrationError::Validation("name must not be empty".to_string()));
    }
    Ok(())
}

fn validate_payload(what: &str, sql: &str) -> Result<(), MigrationError> {
    if sql.trim().is_empty() {
        return Err(MigrationError::Validation(format!("{} must not be empty", what)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use sea_orm::DbErr;

    use super::*;
    use crate::migrate::error::ExecutionError;
    use crate::migrate::version::tests::ManualClock;

    #[derive(Default)]
    struct FakeGateway {
        applied: Mutex<Vec<String>>,
        reject: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn reject(&self, payload: &str) {
            self.reject.lock().push(payload.to_string());
        }

        fn applied(&self) -> Vec<String> {
            self.applied.lock().clone()
        }
    }

    #[async_trait]
    impl ExecutionGateway for FakeGateway {
        async fn apply(&self, payload: &str) -> Result<(), ExecutionError> {
            if self.reject.lock().iter().any(|p| p == payload) {
                return Err(ExecutionError::Rejected {
                    status: 400,
                    message: format!("cannot apply {}", payload),
                });
            }
            self.applied.lock().push(payload.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeHistory {
        rows: Mutex<BTreeMap<String, Migration>>,
        issued: Mutex<BTreeSet<String>>,
        selects: Mutex<usize>,
        fail_delete: Mutex<Option<String>>,
        vanish_before_delete: Mutex<Option<String>>,
    }

    impl FakeHistory {
        fn fail_delete_on(&self, version: &str) {
            *self.fail_delete.lock() = Some(version.to_string());
        }

        /// 模拟另一个调用方在本次查询之后、删除之前删掉了该行
        fn vanish_before_delete(&self, version: &str) {
            *self.vanish_before_delete.lock() = Some(version.to_string());
        }

        fn newest_first(&self) -> Vec<Migration> {
            self.rows.lock().values().rev().cloned().collect()
        }
    }

    #[async_trait]
    impl HistoryStore for FakeHistory {
        async fn insert(
            &self,
            version: &str,
            name: &str,
            status: MigrationStatus,
            applied_at: Option<DateTime<Utc>>,
        ) -> Result<(), StoreError> {
            let mut rows = self.rows.lock();
            if rows.contains_key(version) {
                return Err(StoreError::History(DbErr::Custom("duplicate version".to_string())));
            }
            rows.insert(
                version.to_string(),
                Migration {
                    version: version.to_string(),
                    name: name.to_string(),
                    status,
                    applied_at,
                    forward_sql: None,
                    down_sql: None,
                },
            );
            Ok(())
        }

        async fn delete_by_version(&self, version: &str) -> Result<u64, StoreError> {
            if self.fail_delete.lock().as_deref() == Some(version) {
                return Err(StoreError::History(DbErr::Custom("connection reset".to_string())));
            }
            if self.vanish_before_delete.lock().as_deref() == Some(version) {
                self.rows.lock().remove(version);
            }
            Ok(self.rows.lock().remove(version).map_or(0, |_| 1))
        }

        async fn select_all(&self) -> Result<Vec<Migration>, StoreError> {
            *self.selects.lock() += 1;
            Ok(self.newest_first())
        }

        async fn select_by_version(&self, version: &str) -> Result<Option<Migration>, StoreError> {
            *self.selects.lock() += 1;
            Ok(self.rows.lock().get(version).cloned())
        }

        async fn select_newer_than(&self, target: &str) -> Result<Vec<Migration>, StoreError> {
            Ok(self
                .newest_first()
                .into_iter()
                .filter(|m| m.version.as_str() > target)
                .collect())
        }

        async fn select_latest(&self, n: u64) -> Result<Vec<Migration>, StoreError> {
            Ok(self.newest_first().into_iter().take(n as usize).collect())
        }

        async fn max_version(&self) -> Result<Option<String>, StoreError> {
            Ok(self.rows.lock().keys().next_back().cloned())
        }

        async fn reserve_version(&self, version: &str, _issued_at: DateTime<Utc>) -> Result<bool, StoreError> {
            Ok(self.issued.lock().insert(version.to_string()))
        }

        async fn max_issued_version(&self) -> Result<Option<String>, StoreError> {
            Ok(self.issued.lock().iter().next_back().cloned())
        }
    }

    #[derive(Default)]
    struct FakeLedger {
        entries: Mutex<BTreeMap<String, LedgerEntry>>,
        provisioned: Mutex<bool>,
        broken: Mutex<bool>,
    }

    #[async_trait]
    impl RollbackLedger for FakeLedger {
        async fn insert(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
            if !*self.provisioned.lock() {
                return Err(StoreError::Ledger(DbErr::Custom("no such table: rollback_migrations".to_string())));
            }
            self.entries.lock().insert(entry.version.clone(), entry.clone());
            Ok(())
        }

        async fn select_by_version(&self, version: &str) -> Result<Option<LedgerEntry>, StoreError> {
            Ok(self.entries.lock().get(version).cloned())
        }

        async fn provision(&self) -> Result<(), StoreError> {
            if *self.broken.lock() {
                return Err(StoreError::Ledger(DbErr::Custom("permission denied".to_string())));
            }
            *self.provisioned.lock() = true;
            Ok(())
        }

        async fn max_version(&self) -> Result<Option<String>, StoreError> {
            Ok(self.entries.lock().keys().next_back().cloned())
        }
    }

    struct Harness {
        engine: MigrationEngine,
        gateway: Arc<FakeGateway>,
        history: Arc<FakeHistory>,
        ledger: Arc<FakeLedger>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let gateway = Arc::new(FakeGateway::default());
        let history = Arc::new(FakeHistory::default());
        let ledger = Arc::new(FakeLedger::default());
        let clock = Arc::new(ManualClock::at(2024, 7, 15, 9, 30, 0));
        let engine = MigrationEngine::new(gateway.clone(), history.clone(), ledger.clone(), clock.clone());
        Harness {
            engine,
            gateway,
            history,
            ledger,
            clock,
        }
    }

    #[tokio::test]
    async fn test_create_forward_only_records_applied() {
        let h = harness();
        let migration = h
            .engine
            .create_forward_only("add_users_table", "CREATE TABLE users(id int)")
            .await
            .unwrap();

        assert_eq!(migration.version, "20240715093000");
        assert_eq!(migration.status, MigrationStatus::Applied);
        assert_eq!(h.gateway.applied(), vec!["CREATE TABLE users(id int)"]);

        let status = h.engine.get_status(&migration.version).await.unwrap();
        assert_eq!(status.status, MigrationStatus::Applied);
        assert!(status.applied_at.is_some());

        let listed = h.engine.list_migrations().await.unwrap();
        assert_eq!(listed[0].version, migration.version);
        assert_eq!(listed[0].status, MigrationStatus::Applied);
    }

    #[tokio::test]
    async fn test_create_forward_only_failure_records_pending() {
        let h = harness();
        h.gateway.reject("CREATE TABLE broken(");

        let err = h
            .engine
            .create_forward_only("broken", "CREATE TABLE broken(")
            .await
            .unwrap_err();
        assert_matches!(
            &err,
            MigrationError::Execution { version, pending: Some(pending), .. }
                if version == "20240715093000" && pending.status == MigrationStatus::Pending
        );
        assert_eq!(err.kind(), "execution_error");

        let status = h.engine.get_status("20240715093000").await.unwrap();
        assert_eq!(status.status, MigrationStatus::Pending);
        assert_eq!(status.applied_at, None);

        // 版本号已被占用，下一次创建不会复用
        let next = h.engine.create_forward_only("fixed", "SELECT 1").await.unwrap();
        assert_eq!(next.version, "20240715093001");
    }

    #[tokio::test]
    async fn test_validation_happens_before_store_access() {
        let h = harness();
        assert_matches!(
            h.engine.create_forward_only("  ", "SELECT 1").await,
            Err(MigrationError::Validation(_))
        );
        assert_matches!(
            h.engine.create_reversible("x", "SELECT 1", "").await,
            Err(MigrationError::Validation(_))
        );
        assert_matches!(h.engine.get_status("2024").await, Err(MigrationError::Validation(_)));
        assert_matches!(
            h.engine.rollback_migration("abcdefghijklmn", None).await,
            Err(MigrationError::Validation(_))
        );
        assert_matches!(h.engine.rollback_to_version("1").await, Err(MigrationError::Validation(_)));
        assert_matches!(h.engine.rollback_last_n(0).await, Err(MigrationError::Validation(_)));

        assert_eq!(*h.history.selects.lock(), 0);
        assert!(h.gateway.applied().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_migration_history_only_then_not_found() {
        let h = harness();
        let m = h.engine.create_forward_only("a", "CREATE TABLE a(id int)").await.unwrap();

        let outcome = h.engine.rollback_migration(&m.version, None).await.unwrap();
        assert!(outcome.removed);
        assert!(!outcome.down_applied);
        // 仅删除历史记录，不执行任何反向 SQL
        assert_eq!(h.gateway.applied().len(), 1);

        assert_matches!(h.engine.get_status(&m.version).await, Err(MigrationError::NotFound(_)));
        // 第二次回滚报告 NotFound，而不是重复删除错误
        assert_matches!(
            h.engine.rollback_migration(&m.version, None).await,
            Err(MigrationError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn test_rollback_migration_with_explicit_down() {
        let h = harness();
        let m = h.engine.create_forward_only("a", "CREATE TABLE a(id int)").await.unwrap();

        let outcome = h
            .engine
            .rollback_migration(&m.version, Some("DROP TABLE a"))
            .await
            .unwrap();
        assert!(outcome.down_applied);
        assert_eq!(h.gateway.applied(), vec!["CREATE TABLE a(id int)", "DROP TABLE a"]);
        assert!(h.history.newest_first().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_down_failure_keeps_history_row() {
        let h = harness();
        let m = h.engine.create_forward_only("a", "CREATE TABLE a(id int)").await.unwrap();
        h.gateway.reject("DROP TABLE a");

        let err = h
            .engine
            .rollback_migration(&m.version, Some("DROP TABLE a"))
            .await
            .unwrap_err();
        assert_matches!(err, MigrationError::Execution { pending: None, .. });
        assert_eq!(
            h.engine.get_status(&m.version).await.unwrap().status,
            MigrationStatus::Applied
        );
    }

    #[tokio::test]
    async fn test_reversible_self_heals_ledger_and_stored_down_runs_once() {
        let h = harness();
        assert!(!*h.ledger.provisioned.lock());

        let m = h
            .engine
            .create_reversible("add_users_table", "CREATE TABLE users(id int)", "DROP TABLE users")
            .await
            .unwrap();
        assert_eq!(m.down_sql.as_deref(), Some("DROP TABLE users"));
        assert!(*h.ledger.provisioned.lock());

        let outcome = h.engine.rollback_migration_with_stored_down(&m.version).await.unwrap();
        assert!(outcome.down_applied);
        let drops = h.gateway.applied().iter().filter(|p| *p == "DROP TABLE users").count();
        assert_eq!(drops, 1);

        assert!(h.engine.list_migrations().await.unwrap().is_empty());
        // 账本记录在回滚后仍保留
        assert!(h.ledger.entries.lock().contains_key(&m.version));
    }

    #[tokio::test]
    async fn test_reversible_ledger_failure_keeps_forward_success() {
        let h = harness();
        *h.ledger.broken.lock() = true;

        let err = h
            .engine
            .create_reversible("a", "CREATE TABLE a(id int)", "DROP TABLE a")
            .await
            .unwrap_err();
        let version = assert_matches!(err, MigrationError::LedgerWrite { migration, .. } => {
            assert_eq!(migration.status, MigrationStatus::Applied);
            migration.version
        });
        assert_eq!(
            h.engine.get_status(&version).await.unwrap().status,
            MigrationStatus::Applied
        );
    }

    #[tokio::test]
    async fn test_reversible_forward_failure_writes_no_ledger_entry() {
        let h = harness();
        h.gateway.reject("CREATE TABLE a(");

        let err = h
            .engine
            .create_reversible("a", "CREATE TABLE a(", "DROP TABLE a")
            .await
            .unwrap_err();
        assert_matches!(err, MigrationError::Execution { .. });
        assert!(h.ledger.entries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stored_down_missing_for_forward_only() {
        let h = harness();
        let m = h.engine.create_forward_only("a", "SELECT 1").await.unwrap();
        assert_matches!(
            h.engine.rollback_migration_with_stored_down(&m.version).await,
            Err(MigrationError::NoRollbackDataFound(v)) if v == m.version
        );
    }

    #[tokio::test]
    async fn test_recreate_after_rollback_gets_new_version() {
        let h = harness();
        let first = h
            .engine
            .create_reversible("users", "CREATE TABLE users(id int)", "DROP TABLE users")
            .await
            .unwrap();
        h.engine.rollback_migration_with_stored_down(&first.version).await.unwrap();

        // 时钟未前进，仍需分配一个新版本
        let second = h
            .engine
            .create_reversible("users", "CREATE TABLE users(id int)", "DROP TABLE users")
            .await
            .unwrap();
        assert_ne!(first.version, second.version);
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn test_rollback_to_version_descending_and_exclusive() {
        let h = harness();
        let mut versions = Vec::new();
        for i in 0..4 {
            let m = h
                .engine
                .create_forward_only(&format!("m{}", i), "SELECT 1")
                .await
                .unwrap();
            versions.push(m.version);
            h.clock.advance(60);
        }

        let result = h.engine.rollback_to_version(&versions[1]).await.unwrap();
        assert!(result.is_complete());
        assert_eq!(result.rolled_back, vec![versions[3].clone(), versions[2].clone()]);
        assert!(result.rolled_back.iter().all(|v| v > &versions[1]));

        let remaining: Vec<String> = h
            .engine
            .list_migrations()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.version)
            .collect();
        assert_eq!(remaining, vec![versions[1].clone(), versions[0].clone()]);
        // 批量回滚只删除历史记录
        assert_eq!(h.gateway.applied().len(), 4);
    }

    #[tokio::test]
    async fn test_rollback_last_n_more_than_history() {
        let h = harness();
        for i in 0..3 {
            h.engine
                .create_forward_only(&format!("m{}", i), "SELECT 1")
                .await
                .unwrap();
        }
        let result = h.engine.rollback_last_n(5).await.unwrap();
        assert_eq!(result.rolled_back.len(), 3);
        assert!(h.engine.list_migrations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_three_reversible_then_rollback_last_two() {
        let h = harness();
        let mut versions = Vec::new();
        for name in ["create_a", "create_b", "create_c"] {
            let m = h
                .engine
                .create_reversible(name, "SELECT 1", "SELECT 2")
                .await
                .unwrap();
            versions.push(m.version);
        }

        let result = h.engine.rollback_last_n(2).await.unwrap();
        assert_eq!(result.rolled_back, vec![versions[2].clone(), versions[1].clone()]);

        let remaining = h.engine.list_migrations().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].version, versions[0]);
    }

    #[tokio::test]
    async fn test_bulk_rollback_reports_partial_progress() {
        let h = harness();
        let mut versions = Vec::new();
        for i in 0..3 {
            let m = h
                .engine
                .create_forward_only(&format!("m{}", i), "SELECT 1")
                .await
                .unwrap();
            versions.push(m.version);
        }
        h.history.fail_delete_on(&versions[1]);

        let result = h.engine.rollback_last_n(3).await.unwrap();
        assert!(!result.is_complete());
        assert_eq!(result.rolled_back, vec![versions[2].clone()]);
        assert_eq!(result.failed_version.as_deref(), Some(versions[1].as_str()));
        assert_eq!(h.engine.list_migrations().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fresh_engine_never_reissues_rolled_back_version() {
        let h = harness();
        let first = h.engine.create_forward_only("a", "SELECT 1").await.unwrap();
        h.engine.rollback_migration(&first.version, None).await.unwrap();

        // 新引擎没有本进程的分配记录，时钟也未前进
        let engine = MigrationEngine::new(h.gateway.clone(), h.history.clone(), h.ledger.clone(), h.clock.clone());
        let second = engine.create_forward_only("b", "SELECT 1").await.unwrap();
        assert_eq!(first.version, "20240715093000");
        assert_eq!(second.version, "20240715093001");
    }

    #[tokio::test]
    async fn test_reserved_by_another_process_is_skipped() {
        let h = harness();
        // 另一个进程抢先登记了当前秒，但尚未写入历史表
        h.history.issued.lock().insert("20240715093000".to_string());
        h.history.issued.lock().insert("20240715093001".to_string());

        let m = h.engine.create_forward_only("a", "SELECT 1").await.unwrap();
        assert_eq!(m.version, "20240715093002");
    }

    #[tokio::test]
    async fn test_versions_unique_across_engines_on_sqlite() {
        use crate::database::memory_database;
        use crate::migrate::store::{DbHistoryStore, DbRollbackLedger};

        let db = memory_database().await;
        let clock = Arc::new(ManualClock::at(2024, 7, 15, 9, 30, 0));
        let engine = || {
            MigrationEngine::new(
                Arc::new(FakeGateway::default()),
                Arc::new(DbHistoryStore::new(db.clone())),
                Arc::new(DbRollbackLedger::new(db.clone())),
                clock.clone(),
            )
        };

        let first = engine().create_forward_only("a", "SELECT 1").await.unwrap();
        engine().rollback_migration(&first.version, None).await.unwrap();
        let second = engine().create_forward_only("b", "SELECT 1").await.unwrap();
        assert_ne!(first.version, second.version);
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn test_concurrent_delete_is_a_no_op() {
        let h = harness();
        let m = h.engine.create_forward_only("a", "SELECT 1").await.unwrap();
        h.history.vanish_before_delete(&m.version);

        let outcome = h.engine.rollback_migration(&m.version, None).await.unwrap();
        assert!(!outcome.removed);
        assert!(!outcome.down_applied);
        assert!(h.history.newest_first().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_rollback_continues_past_vanished_row() {
        let h = harness();
        let mut versions = Vec::new();
        for i in 0..3 {
            let m = h
                .engine
                .create_forward_only(&format!("m{}", i), "SELECT 1")
                .await
                .unwrap();
            versions.push(m.version);
        }
        h.history.vanish_before_delete(&versions[1]);

        let result = h.engine.rollback_last_n(3).await.unwrap();
        assert!(result.is_complete());
        assert_eq!(result.rolled_back, vec![versions[2].clone(), versions[0].clone()]);
        assert_eq!(result.failed_version, None);
        assert!(h.engine.list_migrations().await.unwrap().is_empty());
    }
}
