//! 错误类型
//!
//! - `ApiError`：后端返回的类型化失败（可恢复，交给 ErrorRecoveryAgent 分类）；
//!   传输层失败（连接、超时、读响应）带 `transport` 标记，不进入恢复流程
//! - `AgentError`：对当前任务致命的错误（LLM 服务失败、初始化阶段后端失败、配置错误）

use thiserror::Error;

use crate::llm::LlmError;

/// 后端动作失败：错误消息 + 细节（HTTP 状态码可选）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub detail: Option<String>,
    pub status: Option<u16>,
    /// 请求未得到后端应答
    pub transport: bool,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
            status: None,
            transport: false,
        }
    }

    /// 传输层失败（连接 / 超时 / 读取响应体）
    pub fn transport(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            transport: true,
            ..Self::new(message).with_detail(detail)
        }
    }

    pub fn is_transport(&self) -> bool {
        self.transport
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// 细节文本，缺省为空串（用于模式匹配与 prompt 拼接）
    pub fn detail_text(&self) -> &str {
        self.detail.as_deref().unwrap_or("")
    }
}

/// 终止当前任务的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Backend error: {0}")]
    Backend(#[from] ApiError),

    #[error("Config error: {0}")]
    Config(String),
}
