//! 迁移版本与回滚引擎
//!
//! 引擎本身不持有状态，已应用的迁移完全以外部历史表为准：
//! - `version`：版本号分配
//! - `store`：历史表与回滚账本的存储接口及 SeaORM 实现
//! - `gateway`：执行网关，负责把 SQL 真正应用到目标库
//! - `engine`：创建、查询与四种回滚策略

mod engine;
pub mod error;
mod gateway;
mod store;
mod version;

pub use engine::MigrationEngine;
pub use error::{MigrationError, StoreError};
pub use gateway::{DatabaseGateway, ExecutionGateway, HttpSqlGateway};
pub use store::{DbHistoryStore, DbRollbackLedger};
pub use version::SystemClock;

use baas_bridge_entity::schema_migration;
pub use baas_bridge_entity::sea_orm_active_enums::MigrationStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    pub version: String,
    pub name: String,
    pub status: MigrationStatus,
    pub applied_at: Option<DateTime<Utc>>,
    /// 仅在创建时返回，历史表不保存 SQL 本身
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_sql: Option<String>,
    /// 通过可回滚路径创建时存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_sql: Option<String>,
}

impl From<schema_migration::Model> for Migration {
    fn from(model: schema_migration::Model) -> Self {
        Self {
            version: model.version,
            name: model.name,
            status: model.status,
            applied_at: model.applied_at,
            forward_sql: None,
            down_sql: None,
        }
    }
}

/// 单个版本回滚的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub version: String,
    /// 是否执行了 down SQL；为 false 时仅删除了历史记录
    pub down_applied: bool,
    /// 历史行是否由本次调用删除（并发删除时为 false，视为无操作）
    pub removed: bool,
}

/// 批量回滚的结果，失败时仍报告已完成的部分
#[derive(Debug, Default, Serialize)]
pub struct BulkRollback {
    /// 本次删除的版本，按处理顺序（从新到旧）；已被并发删除的版本不计入
    pub rolled_back: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_version: Option<String>,
    #[serde(skip)]
    pub failure: Option<StoreError>,
}

impl BulkRollback {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}
