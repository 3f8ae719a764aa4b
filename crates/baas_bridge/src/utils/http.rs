use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde_json::Value;

/// 构建带超时和 UA 的 HTTP 客户端
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("baas-bridge/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// 解析基础地址，并保证路径以 `/` 结尾，便于后续 `join` 相对路径
pub fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| format!("{}: {}", raw, e))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// 读取失败响应的状态码和错误消息
pub async fn failure_of(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, extract_message(&body))
}

/// 从错误响应体中提取可读消息，兼容常见的几种 JSON 错误格式
pub fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            match value.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(s)) = inner.get("message") {
                        return s.clone();
                    }
                }
                _ => {}
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(500).collect()
}

/// 读取响应体，非 JSON 时以字符串形式返回
pub async fn body_as_value(response: Response) -> reqwest::Result<Value> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
