//! 自托管 BaaS 实例的 REST 客户端
//!
//! 所有请求都经由网关地址，携带 service key 作为 `apikey` 和 Bearer 令牌。

mod error;
mod storage;

pub use error::BaasError;
pub use storage::Bucket;

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::utils::http::{body_as_value, build_client, failure_of, parse_base_url};

static FUNCTION_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// 健康检查涉及的依赖服务及其探测路径
const HEALTH_PROBES: [(&str, &str); 3] = [
    ("auth", "auth/v1/health"),
    ("rest", "rest/v1/"),
    ("storage", "storage/v1/status"),
];

pub struct BaasClient {
    client: Client,
    base_url: Url,
    service_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub service: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub services: Vec<ServiceHealth>,
}

impl BaasClient {
    pub fn new(base_url: &str, service_key: impl Into<String>, timeout: Duration) -> Result<Self, BaasError> {
        let base_url = parse_base_url(base_url).map_err(BaasError::InvalidUrl)?;
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            service_key: service_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BaasError> {
        self.base_url
            .join(path)
            .map_err(|e| BaasError::InvalidUrl(format!("{}: {}", path, e)))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BaasError> {
        let url = self.endpoint(path)?;
        debug!("BaaS 请求: {} {}", method, url);
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key))
    }

    /// 发送请求并把响应体解析为 JSON，非 2xx 状态转为 [`BaasError::Api`]
    async fn send(&self, request: RequestBuilder) -> Result<Value, BaasError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let (status, message) = failure_of(response).await;
            return Err(BaasError::Api { status, message });
        }
        Ok(body_as_value(response).await?)
    }

    /// 通过 SQL 接口执行任意 SQL，返回结果行
    pub async fn execute_sql(&self, query: &str) -> Result<Value, BaasError> {
        let request = self.request(Method::POST, "pg/query")?.json(&json!({ "query": query }));
        self.send(request).await
    }

    pub async fn get_auth_settings(&self) -> Result<Value, BaasError> {
        let request = self.request(Method::GET, "auth/v1/settings")?;
        self.send(request).await
    }

    pub async fn invoke_edge_function(&self, name: &str, body: Option<Value>) -> Result<Value, BaasError> {
        if !FUNCTION_NAME.is_match(name) {
            return Err(BaasError::InvalidArgument(format!("invalid function name: {:?}", name)));
        }
        let request = self
            .request(Method::POST, &format!("functions/v1/{}", name))?
            .json(&body.unwrap_or_else(|| json!({})));
        self.send(request).await
    }

    /// 逐个探测依赖服务，单个服务不可达不影响其他服务的结果
    pub async fn check_health(&self) -> HealthReport {
        let mut services = Vec::with_capacity(HEALTH_PROBES.len());
        for (service, path) in HEALTH_PROBES {
            let result = match self.request(Method::GET, path) {
                Ok(request) => request.send().await.map_err(BaasError::from),
                Err(e) => Err(e),
            };
            let health = match result {
                Ok(response) => {
                    let status = response.status();
                    ServiceHealth {
                        service: service.to_string(),
                        healthy: status.is_success(),
                        status: Some(status.as_u16()),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("BaaS 服务 {} 不可达: {}", service, e);
                    ServiceHealth {
                        service: service.to_string(),
                        healthy: false,
                        status: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            services.push(health);
        }
        HealthReport {
            healthy: services.iter().all(|s| s.healthy),
            services,
        }
    }
}
