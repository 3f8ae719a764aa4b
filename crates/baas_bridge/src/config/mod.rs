//! 命令行参数与运行配置
//!
//! 所有参数都可以通过环境变量提供，便于在容器中部署。

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Serialize, Serializer};

#[derive(Parser, Debug)]
#[command(name = "baas-bridge", version, about)]
pub struct Args {
    /// 存放迁移历史表和回滚账本的数据库
    #[arg(long, env = "BAAS_BRIDGE_DATABASE_URL")]
    pub database_url: Option<String>,

    /// 迁移 SQL 的执行方式
    #[arg(long, env = "BAAS_BRIDGE_GATEWAY", value_enum, default_value_t = GatewayKind::Database)]
    pub gateway: GatewayKind,

    #[arg(long, env = "BAAS_BRIDGE_BAAS_URL")]
    pub baas_url: Option<String>,

    #[arg(long, env = "BAAS_BRIDGE_BAAS_SERVICE_KEY", hide_env_values = true)]
    pub baas_service_key: Option<String>,

    #[arg(long, env = "BAAS_BRIDGE_PLATFORM_URL")]
    pub platform_url: Option<String>,

    #[arg(long, env = "BAAS_BRIDGE_PLATFORM_TOKEN", hide_env_values = true)]
    pub platform_token: Option<String>,

    #[arg(long, env = "BAAS_BRIDGE_CLI_PATH", default_value = "supabase")]
    pub cli_path: String,

    #[arg(long, env = "BAAS_BRIDGE_CLI_WORKDIR")]
    pub cli_workdir: Option<PathBuf>,

    #[arg(long, env = "BAAS_BRIDGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP 请求超时（秒）
    #[arg(long, env = "BAAS_BRIDGE_HTTP_TIMEOUT", default_value_t = 30)]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 以 JSON 输出所有可调用的操作
    Tools,
    /// 调用一个操作并以 JSON 输出结果
    Call {
        tool: String,
        /// JSON 对象形式的参数
        #[arg(long)]
        args: Option<String>,
    },
    /// 只执行启动迁移（创建迁移历史表）
    Setup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GatewayKind {
    /// 通过数据库连接执行
    Database,
    /// 通过 BaaS 的 SQL 接口执行
    Http,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaasConfig {
    pub url: String,
    #[serde(serialize_with = "redact")]
    pub service_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformConfig {
    pub url: String,
    #[serde(serialize_with = "redact")]
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CliConfig {
    pub path: String,
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    #[serde(serialize_with = "redact_url")]
    pub database_url: Option<String>,
    pub gateway: GatewayKind,
    pub baas: Option<BaasConfig>,
    pub platform: Option<PlatformConfig>,
    pub cli: CliConfig,
    pub log_level: String,
    pub http_timeout: u64,
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        let baas = match (&args.baas_url, &args.baas_service_key) {
            (Some(url), Some(key)) => Some(BaasConfig {
                url: url.clone(),
                service_key: key.clone(),
            }),
            _ => None,
        };
        let platform = match (&args.platform_url, &args.platform_token) {
            (Some(url), Some(token)) => Some(PlatformConfig {
                url: url.clone(),
                token: token.clone(),
            }),
            _ => None,
        };
        Self {
            database_url: args.database_url.clone().filter(|u| !u.trim().is_empty()),
            gateway: args.gateway,
            baas,
            platform,
            cli: CliConfig {
                path: args.cli_path.clone(),
                workdir: args.cli_workdir.clone(),
            },
            log_level: args.log_level.clone(),
            http_timeout: args.http_timeout,
        }
    }

    /// 检查需要访问数据库的命令所依赖的配置
    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_none() {
            bail!("未配置数据库地址，请设置 --database-url 或 BAAS_BRIDGE_DATABASE_URL");
        }
        if self.http_timeout == 0 {
            bail!("HTTP 超时时间必须大于 0");
        }
        if self.gateway == GatewayKind::Http && self.baas.is_none() {
            bail!("使用 http 执行方式时必须同时配置 BaaS 地址和 service key");
        }
        Ok(())
    }
}

fn redact<T: ?Sized, S: Serializer>(_: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("******")
}

/// 隐藏连接串中的密码部分
fn redact_url<S: Serializer>(url: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match url {
        Some(url) => serializer.serialize_some(&mask_password(url)),
        None => serializer.serialize_none(),
    }
}

fn mask_password(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("******"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
