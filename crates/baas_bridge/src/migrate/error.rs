use sea_orm::DbErr;
use thiserror::Error;

use super::Migration;

/// 执行网关应用 SQL 失败
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("database rejected the payload: {0}")]
    Database(#[from] DbErr),
    #[error("sql endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sql endpoint returned {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// 历史表或回滚账本本身不可用
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("history store error: {0}")]
    History(#[source] DbErr),
    #[error("rollback ledger error: {0}")]
    Ledger(#[source] DbErr),
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("migration {0} not found")]
    NotFound(String),

    #[error("no rollback data found for migration {0}")]
    NoRollbackDataFound(String),

    /// 正向创建失败时 `pending` 为已记录的待处理迁移；回滚时执行 down SQL 失败则为 None
    #[error("failed to apply payload for migration {version}: {source}")]
    Execution {
        version: String,
        #[source]
        source: ExecutionError,
        pending: Option<Box<Migration>>,
    },

    /// 并发分配时始终未能登记到空闲版本号
    #[error("version allocation failed: {0}")]
    VersionConflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// 正向迁移已成功应用，只是 down SQL 未能写入回滚账本
    #[error("migration {version} was applied but its down SQL could not be stored: {source}")]
    LedgerWrite {
        version: String,
        migration: Box<Migration>,
        #[source]
        source: StoreError,
    },
}

impl MigrationError {
    /// 供调用方区分错误类别的稳定标识
    pub fn kind(&self) -> &'static str {
        match self {
            MigrationError::Validation(_) => "validation_error",
            MigrationError::NotFound(_) => "not_found",
            MigrationError::NoRollbackDataFound(_) => "no_rollback_data_found",
            MigrationError::Execution { .. } => "execution_error",
            MigrationError::VersionConflict(_) => "version_conflict",
            MigrationError::Store(_) => "store_error",
            MigrationError::LedgerWrite { .. } => "ledger_write_error",
        }
    }
}
