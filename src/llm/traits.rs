//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete 一次往返，
//! 请求可携带 ResponseSchema（结构化输出）或不带（自由文本）。

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::memory::Message;

/// LLM 调用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// 模型输出不符合目标 Schema（对当前任务致命，不重试）
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Empty response")]
    EmptyResponse,
}

/// 结构化输出的目标 Schema（名称 + JSON Schema）
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

/// 单次调用请求
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    /// None 表示自由文本
    pub response_schema: Option<ResponseSchema>,
    pub max_tokens: u32,
}

impl<'a> CompletionRequest<'a> {
    pub fn text(messages: &'a [Message], max_tokens: u32) -> Self {
        Self {
            messages,
            response_schema: None,
            max_tokens,
        }
    }

    pub fn structured(messages: &'a [Message], schema: ResponseSchema, max_tokens: u32) -> Self {
        Self {
            messages,
            response_schema: Some(schema),
            max_tokens,
        }
    }
}

/// 单次调用的 token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// 调用结果：原始文本 + 用量
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: Usage,
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 模型标识（用于遥测）
    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
