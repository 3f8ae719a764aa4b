mod baas;
mod cli;
mod config;
mod database;
mod migrate;
mod platform;
mod tools;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::baas::BaasClient;
use crate::cli::BaasCli;
use crate::config::{Args, Command, Config, GatewayKind};
use crate::database::setup_database;
use crate::migrate::{
    DatabaseGateway, DbHistoryStore, DbRollbackLedger, ExecutionGateway, HttpSqlGateway, MigrationEngine, SystemClock,
};
use crate::platform::PlatformClient;
use crate::tools::{execute_tool, get_tools, ToolContext, ToolResponse};
use crate::utils::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level)?;
    let config = Config::from_args(&args);
    debug!("运行配置: {}", serde_json::to_string(&config)?);

    match args.command {
        Command::Tools => print_json(&get_tools()),
        Command::Setup => {
            config.validate()?;
            setup_database(database_url(&config)?).await?;
            info!("迁移历史表已就绪");
            Ok(())
        }
        Command::Call { tool, args } => {
            let arguments = match args.as_deref().map(serde_json::from_str::<Value>).transpose() {
                Ok(arguments) => arguments,
                Err(e) => return print_json(&ToolResponse::failure(format!("invalid --args JSON: {}", e), None)),
            };
            config.validate()?;
            let ctx = build_context(&config).await?;
            let response = execute_tool(&tool, arguments, &ctx).await;
            print_json(&response)
        }
    }
}

fn database_url(config: &Config) -> Result<&str> {
    config.database_url.as_deref().context("未配置数据库地址")
}

async fn build_context(config: &Config) -> Result<ToolContext> {
    let timeout = Duration::from_secs(config.http_timeout);
    let db = setup_database(database_url(config)?).await?;

    let baas = match &config.baas {
        Some(baas) => Some(Arc::new(
            BaasClient::new(&baas.url, baas.service_key.clone(), timeout).context("创建 BaaS 客户端失败")?,
        )),
        None => None,
    };
    let platform = match &config.platform {
        Some(platform) => Some(
            PlatformClient::new(&platform.url, platform.token.clone(), timeout).context("创建部署平台客户端失败")?,
        ),
        None => None,
    };

    let gateway: Arc<dyn ExecutionGateway> = match (config.gateway, &baas) {
        (GatewayKind::Http, Some(client)) => Arc::new(HttpSqlGateway::new(client.clone())),
        (GatewayKind::Http, None) => anyhow::bail!("使用 http 执行方式时必须配置 BaaS"),
        (GatewayKind::Database, _) => Arc::new(DatabaseGateway::new(db.clone())),
    };
    info!("迁移执行方式: {}", config.gateway);

    Ok(ToolContext {
        engine: MigrationEngine::new(
            gateway,
            Arc::new(DbHistoryStore::new(db.clone())),
            Arc::new(DbRollbackLedger::new(db)),
            Arc::new(SystemClock),
        ),
        baas,
        platform,
        cli: BaasCli::new(config.cli.path.clone(), config.cli.workdir.clone()),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
