//! 对外暴露的可调用操作
//!
//! 每个操作都有名称、描述和 JSON 参数结构，调用结果统一为 [`ToolResponse`]，
//! 任何失败都以 `success: false` 返回而不是中断进程。

pub mod baas;
pub mod migrations;
pub mod platform;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::baas::{BaasClient, BaasError};
use crate::cli::{BaasCli, CliError};
use crate::migrate::{MigrationEngine, MigrationError};
use crate::platform::{PlatformClient, PlatformError};

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolResponse {
    pub fn ok(data: Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: Some(message.into()),
        }
    }

    pub fn failure(error: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
            message: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("baas request failed: {0}")]
    Baas(#[from] BaasError),
    #[error("platform request failed: {0}")]
    Platform(#[from] PlatformError),
    #[error("cli command failed: {0}")]
    Cli(#[from] CliError),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ToolError {
    fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::InvalidArguments(_) => "validation_error",
            ToolError::NotConfigured(_) => "not_configured",
            ToolError::Migration(e) => e.kind(),
            ToolError::Baas(_) => "baas_error",
            ToolError::Platform(_) => "platform_error",
            ToolError::Cli(_) => "cli_error",
            ToolError::Encode(_) => "encode_error",
        }
    }
}

impl From<ToolError> for ToolResponse {
    fn from(e: ToolError) -> Self {
        let mut data = json!({ "error_kind": e.kind() });
        // 已落库的迁移需要让调用方看到，版本号已被占用
        let recorded = match &e {
            ToolError::Migration(MigrationError::Execution {
                version,
                pending: Some(migration),
                ..
            })
            | ToolError::Migration(MigrationError::LedgerWrite { version, migration, .. }) => {
                data["version"] = Value::String(version.clone());
                serde_json::to_value(migration.as_ref()).ok()
            }
            ToolError::Migration(MigrationError::Execution { version, .. }) => {
                data["version"] = Value::String(version.clone());
                None
            }
            _ => None,
        };
        if let Some(migration) = recorded {
            data["migration"] = migration;
        }
        ToolResponse::failure(e.to_string(), Some(data))
    }
}

pub type ToolResult = Result<ToolResponse, ToolError>;

/// 操作执行所需的全部依赖；外部服务未配置时对应操作返回 `not_configured`
pub struct ToolContext {
    pub engine: MigrationEngine,
    pub baas: Option<Arc<BaasClient>>,
    pub platform: Option<PlatformClient>,
    pub cli: BaasCli,
}

impl ToolContext {
    fn baas(&self) -> Result<&BaasClient, ToolError> {
        self.baas.as_deref().ok_or(ToolError::NotConfigured("baas"))
    }

    fn platform(&self) -> Result<&PlatformClient, ToolError> {
        self.platform.as_ref().ok_or(ToolError::NotConfigured("platform"))
    }
}

pub fn get_tools() -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    tools.extend(migrations::get_migration_tools());
    tools.extend(baas::get_baas_tools());
    tools.extend(platform::get_platform_tools());
    tools
}

pub async fn execute_tool(name: &str, arguments: Option<Value>, ctx: &ToolContext) -> ToolResponse {
    debug!("调用操作 {}，参数: {:?}", name, arguments);
    let args = &arguments;
    let result = match name {
        "create_migration" => migrations::create_migration(args, ctx).await,
        "create_reversible_migration" => migrations::create_reversible_migration(args, ctx).await,
        "list_migrations" => migrations::list_migrations(ctx).await,
        "get_migration_status" => migrations::get_migration_status(args, ctx).await,
        "rollback_migration" => migrations::rollback_migration(args, ctx).await,
        "rollback_migration_with_stored_down" => migrations::rollback_migration_with_stored_down(args, ctx).await,
        "rollback_to_version" => migrations::rollback_to_version(args, ctx).await,
        "rollback_last_n" => migrations::rollback_last_n(args, ctx).await,

        "execute_sql" => baas::execute_sql(args, ctx).await,
        "list_buckets" => baas::list_buckets(ctx).await,
        "create_bucket" => baas::create_bucket(args, ctx).await,
        "delete_bucket" => baas::delete_bucket(args, ctx).await,
        "invoke_edge_function" => baas::invoke_edge_function(args, ctx).await,
        "get_auth_settings" => baas::get_auth_settings(ctx).await,
        "check_health" => baas::check_health(ctx).await,
        "run_cli" => baas::run_cli(args, ctx).await,

        "list_applications" => platform::list_applications(ctx).await,
        "get_application" => platform::get_application(args, ctx).await,
        "start_application" | "stop_application" | "restart_application" => {
            platform::application_lifecycle(name, args, ctx).await
        }
        "get_application_logs" => platform::get_application_logs(args, ctx).await,
        "list_application_envs" => platform::list_application_envs(args, ctx).await,
        "update_application_env" => platform::update_application_env(args, ctx).await,
        "list_services" => platform::list_services(ctx).await,

        _ => Err(ToolError::UnknownTool(name.to_string())),
    };
    match result {
        Ok(response) => response,
        Err(e) => {
            error!("操作 {} 失败: {}", name, e);
            e.into()
        }
    }
}

fn param<'a>(args: &'a Option<Value>, name: &str) -> Result<Option<&'a Value>, ToolError> {
    match args {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(map.get(name).filter(|v| !v.is_null())),
        Some(_) => Err(ToolError::InvalidArguments("arguments must be a JSON object".to_string())),
    }
}

pub fn required_str<'a>(args: &'a Option<Value>, name: &str) -> Result<&'a str, ToolError> {
    optional_str(args, name)?.ok_or_else(|| ToolError::InvalidArguments(format!("missing required parameter: {}", name)))
}

pub fn optional_str<'a>(args: &'a Option<Value>, name: &str) -> Result<Option<&'a str>, ToolError> {
    match param(args, name)? {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ToolError::InvalidArguments(format!("parameter {} must be a string", name))),
    }
}

pub fn required_u64(args: &Option<Value>, name: &str) -> Result<u64, ToolError> {
    optional_u64(args, name)?.ok_or_else(|| ToolError::InvalidArguments(format!("missing required parameter: {}", name)))
}

pub fn optional_u64(args: &Option<Value>, name: &str) -> Result<Option<u64>, ToolError> {
    match param(args, name)? {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| ToolError::InvalidArguments(format!("parameter {} must be a non-negative integer", name))),
    }
}

pub fn optional_bool(args: &Option<Value>, name: &str) -> Result<Option<bool>, ToolError> {
    match param(args, name)? {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ToolError::InvalidArguments(format!("parameter {} must be a boolean", name))),
    }
}

#[cfg(test)]
pub(crate) async fn test_context() -> ToolContext {
    use crate::migrate::{DatabaseGateway, DbHistoryStore, DbRollbackLedger, SystemClock};

    let db = crate::database::memory_database().await;
    ToolContext {
        engine: MigrationEngine::new(
            Arc::new(DatabaseGateway::new(db.clone())),
            Arc::new(DbHistoryStore::new(db.clone())),
            Arc::new(DbRollbackLedger::new(db)),
            Arc::new(SystemClock),
        ),
        baas: None,
        platform: None,
        cli: BaasCli::new("baas-bridge-no-such-binary", None),
    }
}
