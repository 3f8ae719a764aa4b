//! 部署平台 REST API（v1）客户端
//!
//! 只做请求转发：应用生命周期、日志、环境变量与服务列表。

mod error;

pub use error::PlatformError;

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::utils::http::{body_as_value, build_client, failure_of, parse_base_url};

/// 日志默认返回行数
pub const DEFAULT_LOG_LINES: u32 = 100;

pub struct PlatformClient {
    client: Client,
    base_url: Url,
    token: String,
}

/// 应用摘要，其余字段原样保留
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// 应用生命周期操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl PlatformClient {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, PlatformError> {
        let base_url = parse_base_url(base_url).map_err(PlatformError::InvalidUrl)?;
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            token: token.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, PlatformError> {
        let url = self
            .base_url
            .join(&format!("api/v1/{}", path))
            .map_err(|e| PlatformError::InvalidUrl(format!("{}: {}", path, e)))?;
        debug!("部署平台请求: {} {}", method, url);
        Ok(self.client.request(method, url).bearer_auth(&self.token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, PlatformError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let (status, message) = failure_of(response).await;
            return Err(PlatformError::Api { status, message });
        }
        Ok(body_as_value(response).await?)
    }

    pub async fn list_applications(&self) -> Result<Vec<Application>, PlatformError> {
        let value = self.send(self.request(Method::GET, "applications")?).await?;
        serde_json::from_value(value).map_err(|e| PlatformError::Api {
            status: 200,
            message: format!("unexpected application list response: {}", e),
        })
    }

    pub async fn get_application(&self, uuid: &str) -> Result<Value, PlatformError> {
        let path = format!("applications/{}", checked_uuid(uuid)?);
        self.send(self.request(Method::GET, &path)?).await
    }

    pub async fn application_lifecycle(&self, uuid: &str, action: LifecycleAction) -> Result<Value, PlatformError> {
        let path = format!("applications/{}/{}", checked_uuid(uuid)?, action);
        self.send(self.request(Method::GET, &path)?).await
    }

    pub async fn get_application_logs(&self, uuid: &str, lines: Option<u32>) -> Result<Value, PlatformError> {
        let path = format!("applications/{}/logs", checked_uuid(uuid)?);
        let request = self
            .request(Method::GET, &path)?
            .query(&[("lines", lines.unwrap_or(DEFAULT_LOG_LINES))]);
        self.send(request).await
    }

    pub async fn list_application_envs(&self, uuid: &str) -> Result<Value, PlatformError> {
        let path = format!("applications/{}/envs", checked_uuid(uuid)?);
        self.send(self.request(Method::GET, &path)?).await
    }

    /// 更新单个环境变量，变量需在下次部署后生效
    pub async fn update_application_env(&self, uuid: &str, key: &str, value: &str) -> Result<Value, PlatformError> {
        let path = format!("applications/{}/envs", checked_uuid(uuid)?);
        let request = self
            .request(Method::PATCH, &path)?
            .json(&json!({ "key": key, "value": value }));
        self.send(request).await
    }

    pub async fn list_services(&self) -> Result<Value, PlatformError> {
        self.send(self.request(Method::GET, "services")?).await
    }
}

/// 拒绝可能改变请求路径的标识
fn checked_uuid(uuid: &str) -> Result<&str, PlatformError> {
    if uuid.is_empty() || !uuid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(PlatformError::InvalidUrl(format!("invalid application uuid: {:?}", uuid)));
    }
    Ok(uuid)
}
