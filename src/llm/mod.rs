//! LLM 层：客户端抽象、结构化输出与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod structured;
pub mod traits;

pub use mock::{MockLlmClient, RecordedRequest};
pub use openai::{OpenAiClient, TokenUsage};
pub use structured::{
    complete_structured, complete_text, response_schema, strip_code_fence, Structured,
    StructuredOutput,
};
pub use traits::{Completion, CompletionRequest, LlmClient, LlmError, ResponseSchema, Usage};
