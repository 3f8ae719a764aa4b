use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::debug;

use super::error::ExecutionError;
use crate::baas::{BaasClient, BaasError};

/// 执行网关：把任意 SQL 应用到目标库
///
/// 引擎不解析也不预演 SQL，只关心成功或失败。
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    async fn apply(&self, payload: &str) -> Result<(), ExecutionError>;
}

/// 通过数据库连接直接执行
pub struct DatabaseGateway {
    db: DatabaseConnection,
}

impl DatabaseGateway {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExecutionGateway for DatabaseGateway {
    async fn apply(&self, payload: &str) -> Result<(), ExecutionError> {
        let result = self.db.execute_unprepared(payload).await?;
        debug!("SQL 已执行，影响 {} 行", result.rows_affected());
        Ok(())
    }
}

/// 通过 BaaS 的 SQL 接口执行
pub struct HttpSqlGateway {
    client: Arc<BaasClient>,
}

impl HttpSqlGateway {
    pub fn new(client: Arc<BaasClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutionGateway for HttpSqlGateway {
    async fn apply(&self, payload: &str) -> Result<(), ExecutionError> {
        self.client.execute_sql(payload).await?;
        Ok(())
    }
}

impl From<BaasError> for ExecutionError {
    fn from(err: BaasError) -> Self {
        match err {
            BaasError::Http(e) => ExecutionError::Http(e),
            BaasError::Api { status, message } => ExecutionError::Rejected { status, message },
            other => ExecutionError::Rejected {
                status: 0,
                message: other.to_string(),
            },
        }
    }
}
