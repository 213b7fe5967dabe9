//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本依次返回预置回复，并记录每次请求（消息 + schema 名），便于断言调用次数与内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{Completion, CompletionRequest, LlmClient, LlmError, Usage};
use crate::memory::Message;

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub schema_name: Option<String>,
    pub max_tokens: u32,
}

/// 脚本化 Mock：脚本耗尽后返回 ApiError
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmClient {
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条回复（或错误）
    pub fn push(&self, response: Result<String, LlmError>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                messages: request.messages.to_vec(),
                schema_name: request.response_schema.map(|s| s.name),
                max_tokens: request.max_tokens,
            });

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::ApiError("mock script exhausted".to_string())));

        next.map(|content| Completion {
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: content.len() as u64,
                total_tokens: 10 + content.len() as u64,
            },
            content,
        })
    }
}
