//! 基准会话 API：开始会话、任务列表、开始 / 完成任务、提交会话、上报 LLM 用量
//!
//! 仅作为任务驱动（main.rs）的外部协作者；推理核心不依赖它。

use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::backend::http::{build_client, post_json};
use crate::backend::HttpBackend;
use crate::core::ApiError;
use crate::observability::{LlmCallRecord, TelemetrySink};

/// 单个任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: String,
    #[serde(default)]
    pub spec_id: String,
    pub task_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartSession<'a> {
    pub benchmark: &'a str,
    pub workspace: &'a str,
    pub name: &'a str,
    pub architecture: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionStarted {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub tasks: Vec<TaskInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    #[serde(default)]
    pub logs: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub eval: Option<Evaluation>,
}

/// 基准 API 客户端（可克隆，内部共享连接池）
#[derive(Debug, Clone)]
pub struct BenchmarkClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl BenchmarkClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let value = post_json(&self.client, &url, self.api_key.as_deref(), body).await?;
        serde_json::from_value(value).map_err(|e| {
            ApiError::new(format!("malformed response from {}", path)).with_detail(e.to_string())
        })
    }

    pub async fn start_session(&self, req: &StartSession<'_>) -> Result<SessionStarted, ApiError> {
        self.post("/sessions/start", req).await
    }

    pub async fn session_status(&self, session_id: &str) -> Result<SessionStatus, ApiError> {
        self.post("/sessions/status", &json!({ "session_id": session_id }))
            .await
    }

    pub async fn submit_session(&self, session_id: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post("/sessions/submit", &json!({ "session_id": session_id }))
            .await?;
        Ok(())
    }

    pub async fn start_task(&self, task: &TaskInfo) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post("/tasks/start", &json!({ "task_id": task.task_id }))
            .await?;
        Ok(())
    }

    pub async fn complete_task(&self, task: &TaskInfo) -> Result<TaskResult, ApiError> {
        self.post("/tasks/complete", &json!({ "task_id": task.task_id }))
            .await
    }

    pub async fn log_llm(&self, record: &LlmCallRecord) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post("/tasks/log_llm", record).await?;
        Ok(())
    }

    /// 为单个任务创建后端客户端（共享连接池）
    pub fn task_backend(&self, benchmark: &str, task: &TaskInfo) -> HttpBackend {
        HttpBackend::with_client(
            self.client.clone(),
            format!("{}/{}/{}", self.base_url, benchmark, task.task_id),
            self.api_key.clone(),
        )
    }
}

/// 通过基准 API 上报 LLM 用量；后台发送，失败只记日志。
/// 完成任务前调用 `flush`，保证该任务的用量记录先于 complete_task 到达。
pub struct BenchmarkTelemetry {
    client: BenchmarkClient,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl BenchmarkTelemetry {
    pub fn new(client: BenchmarkClient) -> Self {
        Self {
            client,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// 等待已发出的上报全部结束
    pub async fn flush(&self) {
        let handles: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("log_llm task aborted: {}", e);
            }
        }
    }
}

impl TelemetrySink for BenchmarkTelemetry {
    fn record(&self, record: LlmCallRecord) {
        let client = self.client.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = client.log_llm(&record).await {
                tracing::warn!(task_id = %record.task_id, "log_llm failed: {}", e);
            }
        });
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}
