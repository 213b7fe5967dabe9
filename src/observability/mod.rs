//! 可观测性：tracing 初始化与 LLM 调用遥测
//!
//! 遥测是旁路：TelemetrySink::record 不返回结果，不影响推理循环的控制流。

use std::time::Duration;

use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::llm::Usage;

/// 日志：默认 info，可通过 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

/// 单次模型调用记录
#[derive(Debug, Clone, Serialize)]
pub struct LlmCallRecord {
    pub task_id: String,
    pub model: String,
    pub duration_sec: f64,
    pub usage: Usage,
    /// RFC 3339 时间戳
    pub at: String,
}

impl LlmCallRecord {
    pub fn new(task_id: &str, model: &str, duration: Duration, usage: Usage) -> Self {
        Self {
            task_id: task_id.to_string(),
            model: model.to_string(),
            duration_sec: duration.as_secs_f64(),
            usage,
            at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// 遥测接收端（fire-and-forget）
pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: LlmCallRecord);
}

/// 仅写入 tracing 日志
#[derive(Debug, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, record: LlmCallRecord) {
        tracing::info!(
            task_id = %record.task_id,
            model = %record.model,
            duration_sec = record.duration_sec,
            prompt_tokens = record.usage.prompt_tokens,
            completion_tokens = record.usage.completion_tokens,
            "llm call"
        );
    }
}
