//! 单任务 HTTP 后端
//!
//! POST `<base_url>/<benchmark>/<task_id><tool>`，请求体为去标签的动作字段；
//! 非 2xx 的 `{ "error": ..., "detail": ... }` 转为 ApiError。超时由 reqwest 客户端负责；
//! 连接失败与超时标记为传输层错误。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::backend::Backend;
use crate::core::ApiError;

pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        benchmark: &str,
        task_id: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: format!("{}/{}/{}", base_url.trim_end_matches('/'), benchmark, task_id),
            api_key,
        })
    }

    /// 复用已有 reqwest 客户端（会话内多个任务共享连接池）
    pub fn with_client(client: Client, task_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: task_url,
            api_key,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn call(&self, tool: &str, payload: Value) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, tool);
        post_json(&self.client, &url, self.api_key.as_deref(), &payload).await
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, ApiError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ApiError::new("failed to build http client").with_detail(e.to_string()))
}

/// POST JSON 并解析 JSON 响应；非 2xx 转为 ApiError
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    api_key: Option<&str>,
    body: &B,
) -> Result<Value, ApiError> {
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::transport("request failed", e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::transport("failed to read response", e.to_string()))?;

    if !status.is_success() {
        return Err(api_error_from_body(status.as_u16(), &text));
    }
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&text)
        .map_err(|e| ApiError::new("malformed response body").with_detail(e.to_string()))
}

/// 从错误响应体构造 ApiError：优先取 `error` / `detail` 字段，否则整段文本作为细节
pub fn api_error_from_body(status: u16, body: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP {}", status));
    let detail = parsed
        .as_ref()
        .and_then(|v| v.get("detail"))
        .map(|d| match d {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.trim().to_string());
    ApiError::new(message).with_detail(detail).with_status(status)
}
