//! 错误恢复 Agent
//!
//! 将后端失败归类为 Outcome，并给出「继续 / 停止」判断：
//! 1. 规则快路径：对错误消息与细节做大小写无关的子串匹配，按顺序首个命中即返回，不调用 LLM；
//! 2. LLM 兜底：无规则命中时发起一次结构化调用（ErrorAnalysis schema），结果原样采信。
//!
//! 兜底调用本身失败时直接向上传播，不再嵌套恢复。

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::actions::ProvideAgentResponse;
use crate::core::{ApiError, ErrorOutcome, Outcome};
use crate::llm::{complete_structured, LlmClient, LlmError, StructuredOutput};
use crate::memory::Message;

/// LLM 兜底调用的 token 上限
pub const ERROR_ANALYSIS_MAX_TOKENS: u32 = 500;

/// 错误分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorAnalysis {
    /// The appropriate outcome for this error
    pub outcome: ErrorOutcome,
    /// Whether the agent should continue processing or stop
    pub should_continue: bool,
    /// Brief explanation of why this outcome and continuation decision were chosen
    pub reasoning: String,
    /// User-friendly message to include in the response
    pub suggested_message: String,
}

impl StructuredOutput for ErrorAnalysis {
    const NAME: &'static str = "ErrorAnalysis";
}

impl ErrorAnalysis {
    /// 构造最终回复形态（错误结果从不附带链接）
    pub fn to_response(&self) -> ProvideAgentResponse {
        ProvideAgentResponse {
            message: self.suggested_message.clone(),
            outcome: self.outcome.base().unwrap_or(Outcome::OkAnswer),
            links: Vec::new(),
        }
    }
}

/// 一组规则：任一模式命中即采用该分类
struct QuickRule {
    patterns: &'static [&'static str],
    outcome: ErrorOutcome,
    should_continue: bool,
    reasoning: &'static str,
    message: &'static str,
}

const QUICK_RULES: &[QuickRule] = &[
    QuickRule {
        patterns: &["not found", "does not exist", "no such", "cannot find"],
        outcome: ErrorOutcome::OkNotFound,
        should_continue: true,
        reasoning: "Resource not found - this is expected and agent can continue with alternative approach",
        message: "The requested resource was not found. This may be expected.",
    },
    QuickRule {
        patterns: &[
            "access denied",
            "forbidden",
            "unauthorized",
            "permission",
            "not allowed",
            "insufficient privileges",
        ],
        outcome: ErrorOutcome::DeniedSecurity,
        should_continue: false,
        reasoning: "Security/permission error - user lacks access, should stop and inform user",
        message: "Access denied. You do not have permission to perform this action.",
    },
    QuickRule {
        patterns: &[
            "invalid",
            "validation error",
            "bad request",
            "malformed",
            "must be",
            "cannot be negative",
        ],
        outcome: ErrorOutcome::NoneClarificationNeeded,
        should_continue: true,
        reasoning: "Validation error - agent made a mistake in parameters, can retry with corrected values",
        message: "Invalid request parameters. Adjusting and retrying.",
    },
    // 限流归为 error_internal 但继续，且不退避
    QuickRule {
        patterns: &["rate limit", "too many requests", "throttled", "try again"],
        outcome: ErrorOutcome::ErrorInternal,
        should_continue: true,
        reasoning: "Temporary rate limiting - agent can retry after brief pause",
        message: "Service temporarily throttled. Will retry.",
    },
    QuickRule {
        patterns: &["internal error", "server error", "500", "503"],
        outcome: ErrorOutcome::ErrorInternal,
        should_continue: false,
        reasoning: "Internal server error - cannot proceed, should inform user",
        message: "An internal server error occurred. Unable to complete the request.",
    },
    QuickRule {
        patterns: &["not supported", "not implemented", "unsupported"],
        outcome: ErrorOutcome::NoneUnsupported,
        should_continue: false,
        reasoning: "Operation not supported by the system",
        message: "This operation is not supported by the system.",
    },
];

/// 规则快路径；无命中返回 None
pub fn quick_classify(err: &ApiError) -> Option<ErrorAnalysis> {
    let message = err.message.to_lowercase();
    let detail = err.detail_text().to_lowercase();

    QUICK_RULES
        .iter()
        .find(|rule| {
            rule.patterns
                .iter()
                .any(|p| message.contains(p) || detail.contains(p))
        })
        .map(|rule| ErrorAnalysis {
            outcome: rule.outcome,
            should_continue: rule.should_continue,
            reasoning: rule.reasoning.to_string(),
            suggested_message: rule.message.to_string(),
        })
}

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an error analysis expert for the {company} business system.

Your task is to analyze API errors and determine:
1. The appropriate outcome category
2. Whether the agent should continue processing or stop
3. A clear explanation of your reasoning

Rules:
- Negative numbers for pagination errors indicate a server issue.

Outcome categories:
- ok_answer: Successful response with data
- ok_not_found: Resource not found (expected, can continue)
- denied_security: Access/permission denied (stop, inform user)
- none_clarification_needed: Invalid parameters or need clarification (can retry)
- none_unsupported: Operation not supported (stop, inform user)
- error_internal: Server/system error (usually stop)
- ok_with_parameter_adjustment: The request can succeed after adjusting parameters (continue)

Guidelines for should_continue:
- Continue: Not found, validation errors, temporary issues, can retry with different approach
- Stop: Security denials, internal errors, unsupported operations, unrecoverable failures
";

/// 错误恢复 Agent：持有 LLM（仅兜底时使用）
pub struct ErrorRecoveryAgent {
    llm: Arc<dyn LlmClient>,
    company: String,
    max_tokens: u32,
}

impl ErrorRecoveryAgent {
    pub fn new(llm: Arc<dyn LlmClient>, company: impl Into<String>) -> Self {
        Self {
            llm,
            company: company.into(),
            max_tokens: ERROR_ANALYSIS_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// 分析一次后端失败；context 描述当时在做什么（如 "executing GetProject"）
    pub async fn analyze(&self, err: &ApiError, context: &str) -> Result<ErrorAnalysis, LlmError> {
        if let Some(analysis) = quick_classify(err) {
            tracing::info!(outcome = %analysis.outcome, "error agent: quick classification applied");
            return Ok(analysis);
        }

        tracing::info!("error agent: LLM analysis invoked for complex error");
        self.llm_analyze(err, context).await
    }

    async fn llm_analyze(&self, err: &ApiError, context: &str) -> Result<ErrorAnalysis, LlmError> {
        let context = if context.is_empty() {
            "No additional context provided"
        } else {
            context
        };
        let user_prompt = format!(
            "Analyze this API error:\n\n\
             Error message: {}\n\
             Error detail: {}\n\
             Context: {}\n\n\
             Determine:\n\
             1. Which outcome category best fits this error\n\
             2. Should the agent continue processing or stop\n\
             3. Reasoning for your decision\n\
             4. A user-friendly message to include in the response\n",
            err.message,
            err.detail_text(),
            context
        );
        let messages = [
            Message::system(ANALYSIS_SYSTEM_PROMPT.replace("{company}", &self.company)),
            Message::user(user_prompt),
        ];
        let analysis =
            complete_structured::<ErrorAnalysis>(self.llm.as_ref(), &messages, self.max_tokens)
                .await?;
        Ok(analysis.value)
    }
}
