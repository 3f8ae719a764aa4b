use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{BaasClient, BaasError};

/// 存储桶
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub file_size_limit: Option<u64>,
    #[serde(default)]
    pub allowed_mime_types: Option<Vec<String>>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl BaasClient {
    pub async fn list_buckets(&self) -> Result<Vec<Bucket>, BaasError> {
        let request = self.request(Method::GET, "storage/v1/bucket")?;
        let value = self.send(request).await?;
        serde_json::from_value(value)
            .map_err(|e| BaasError::InvalidArgument(format!("unexpected bucket list response: {}", e)))
    }

    pub async fn create_bucket(&self, id: &str, public: bool) -> Result<Value, BaasError> {
        if id.trim().is_empty() {
            return Err(BaasError::InvalidArgument("bucket id must not be empty".to_string()));
        }
        let request = self
            .request(Method::POST, "storage/v1/bucket")?
            .json(&json!({ "id": id, "name": id, "public": public }));
        self.send(request).await
    }

    pub async fn delete_bucket(&self, id: &str) -> Result<Value, BaasError> {
        if id.trim().is_empty() || id.contains('/') {
            return Err(BaasError::InvalidArgument(format!("invalid bucket id: {:?}", id)));
        }
        let request = self.request(Method::DELETE, &format!("storage/v1/bucket/{}", id))?;
        self.send(request).await
    }
}
