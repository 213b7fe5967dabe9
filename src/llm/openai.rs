//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url，如 OpenRouter）；
//! 结构化调用使用 response_format = json_schema，并累计 token 用量。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, FunctionCall,
    ResponseFormat, ResponseFormatJsonSchema,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{Completion, CompletionRequest, LlmClient, LlmError, ResponseSchema, Usage};
use crate::memory::{has_tool_result, Message, Role};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, usage: &Usage) {
        self.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens, Ordering::Relaxed);
        self.total_tokens.fetch_add(usage.total_tokens, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str, timeout_secs: u64) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        let mut client = Client::with_config(config);
        match reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
        {
            Ok(http) => client = client.with_http_client(http),
            Err(e) => tracing::warn!("Failed to build LLM http client ({}), using default", e),
        }

        Self {
            client,
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    /// 日志 -> API 消息。未被 tool 条目应答的 assistant 动作以纯文本发送，
    /// 避免接口拒绝悬空的 tool_calls。
    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let invalid = |e: async_openai::error::OpenAIError| LlmError::InvalidRequest(e.to_string());

        messages
            .iter()
            .map(|m| {
                let msg: ChatCompletionRequestMessage = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(invalid)?
                        .into(),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(invalid)?
                        .into(),
                    Role::Assistant => {
                        let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                        match &m.tool_call {
                            Some(call) if has_tool_result(messages, &call.id) => {
                                args.content(m.content.clone()).tool_calls(vec![
                                    ChatCompletionMessageToolCalls::Function(
                                        ChatCompletionMessageToolCall {
                                            id: call.id.clone(),
                                            function: FunctionCall {
                                                name: call.name.clone(),
                                                arguments: call.arguments.clone(),
                                            },
                                        },
                                    ),
                                ]);
                            }
                            Some(call) => {
                                args.content(format!(
                                    "{}\n{} {}",
                                    m.content, call.name, call.arguments
                                ));
                            }
                            None => {
                                args.content(m.content.clone());
                            }
                        }
                        args.build().map_err(invalid)?.into()
                    }
                    Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                        .content(m.content.clone())
                        .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
                        .build()
                        .map_err(invalid)?
                        .into(),
                };
                Ok(msg)
            })
            .collect()
    }
}

/// json_schema 响应格式。strict 关闭：schemars 生成的 schema（可选字段、$ref、带标签的 oneOf）
/// 不满足 strict 模式的要求；契约由 `StructuredOutput::parse` 在本地校验。
fn json_schema_format(schema: ResponseSchema) -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: None,
            name: schema.name,
            schema: Some(schema.schema),
            strict: Some(false),
        },
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(self.to_openai_messages(request.messages)?)
            .max_completion_tokens(request.max_tokens);
        if let Some(schema) = request.response_schema {
            args.response_format(json_schema_format(schema));
        }
        let body = args
            .build()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(body)
            .await
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens as u64,
                completion_tokens: u.completion_tokens as u64,
                total_tokens: u.total_tokens as u64,
            })
            .unwrap_or_default();
        self.usage.add(&usage);

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(Completion { content, usage })
    }
}
