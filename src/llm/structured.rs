//! 结构化输出：schemars 生成 Schema，serde 解析模型输出
//!
//! 目标类型实现 `StructuredOutput`；解析失败统一映射为 `LlmError::SchemaViolation`。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

use crate::llm::{CompletionRequest, LlmClient, LlmError, ResponseSchema, Usage};
use crate::memory::Message;

/// 可作为结构化输出目标的类型
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    /// response_format 中的 schema 名
    const NAME: &'static str;

    /// 从模型文本解析；需要额外校验的类型可覆盖
    fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    }
}

/// 解析成功的结构化结果
#[derive(Debug, Clone)]
pub struct Structured<T> {
    pub value: T,
    pub usage: Usage,
}

/// 生成 T 的 ResponseSchema
pub fn response_schema<T: StructuredOutput>() -> ResponseSchema {
    let schema = schema_for!(T);
    ResponseSchema {
        name: T::NAME.to_string(),
        schema: serde_json::to_value(&schema).unwrap_or_default(),
    }
}

/// 整段输出被 ``` 代码块包裹时去掉围栏（语言标记可选）；否则原样返回去空白的文本。
/// 不在文本内部搜索 JSON 片段。
pub fn strip_code_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    match inner.split_once('\n') {
        Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body.trim(),
        _ => inner.trim(),
    }
}

/// 结构化调用：请求携带 T 的 Schema，返回解析后的 T
pub async fn complete_structured<T: StructuredOutput>(
    llm: &dyn LlmClient,
    messages: &[Message],
    max_tokens: u32,
) -> Result<Structured<T>, LlmError> {
    let completion = llm
        .complete(CompletionRequest::structured(
            messages,
            response_schema::<T>(),
            max_tokens,
        ))
        .await?;
    if completion.content.trim().is_empty() {
        return Err(LlmError::SchemaViolation(format!("{}: empty output", T::NAME)));
    }
    let trimmed = completion.content.trim();
    let value = match T::parse(trimmed) {
        Ok(v) => v,
        Err(first) => {
            let unfenced = strip_code_fence(trimmed);
            if unfenced.len() == trimmed.len() {
                return Err(LlmError::SchemaViolation(format!("{}: {}: {}", T::NAME, first, trimmed)));
            }
            T::parse(unfenced).map_err(|e| {
                LlmError::SchemaViolation(format!("{}: {}: {}", T::NAME, e, unfenced))
            })?
        }
    };
    Ok(Structured {
        value,
        usage: completion.usage,
    })
}

/// 自由文本调用：返回去除首尾空白后的回复
pub async fn complete_text(
    llm: &dyn LlmClient,
    messages: &[Message],
    max_tokens: u32,
) -> Result<String, LlmError> {
    let completion = llm
        .complete(CompletionRequest::text(messages, max_tokens))
        .await?;
    Ok(completion.content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Verdict {
        ok: bool,
    }

    impl StructuredOutput for Verdict {
        const NAME: &'static str = "Verdict";
    }

    #[test]
    fn test_strip_code_fence_whole_output_only() {
        assert_eq!(strip_code_fence("```json\n{\"ok\": true}\n```"), "{\"ok\": true}");
        assert_eq!(strip_code_fence("```\n{\"ok\": true}\n```"), "{\"ok\": true}");
        assert_eq!(
            strip_code_fence("sure: {\"ok\": false} done"),
            "sure: {\"ok\": false} done"
        );
    }

    #[tokio::test]
    async fn test_fenced_output_is_accepted() {
        let llm = MockLlmClient::new(vec!["```json\n{\"ok\": true}\n```"]);
        let out = complete_structured::<Verdict>(&llm, &[], 10).await.unwrap();
        assert_eq!(out.value, Verdict { ok: true });
    }

    #[tokio::test]
    async fn test_prose_wrapped_output_is_rejected() {
        let llm = MockLlmClient::new(vec!["sure: {\"ok\": false} done"]);
        let err = complete_structured::<Verdict>(&llm, &[], 10).await.unwrap_err();
        assert!(matches!(err, LlmError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_code_fence_inside_string_value_is_kept() {
        let raw = serde_json::json!({
            "current_state": "ready to answer",
            "plan_remaining_steps_brief": ["answer"],
            "task_completed": true,
            "function": {
                "tool": "/respond",
                "message": "Export format: ```json\n{\"a\":1}\n``` as requested",
                "outcome": "ok_answer",
                "links": []
            }
        })
        .to_string();
        let llm = MockLlmClient::new(vec![raw]);

        let step = complete_structured::<crate::sgr::NextStep>(&llm, &[], 10)
            .await
            .unwrap()
            .value;

        match step.function {
            crate::actions::Action::ProvideAgentResponse(resp) => {
                assert!(resp.message.contains("```json"));
                assert!(resp.message.ends_with("as requested"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_response_schema_named_after_type() {
        let schema = response_schema::<Verdict>();
        assert_eq!(schema.name, "Verdict");
        assert!(schema.schema.get("properties").is_some());
    }

    #[tokio::test]
    async fn test_complete_structured_reports_schema_violation() {
        let llm = MockLlmClient::new(vec!["{\"ok\": \"maybe\"}"]);
        let err = complete_structured::<Verdict>(&llm, &[], 10).await.unwrap_err();
        assert!(matches!(err, LlmError::SchemaViolation(_)));
        assert_eq!(llm.requests()[0].schema_name.as_deref(), Some("Verdict"));
    }

    #[tokio::test]
    async fn test_complete_text_trims() {
        let llm = MockLlmClient::new(vec!["  Anna works in Vienna.\n"]);
        let text = complete_text(&llm, &[], 10).await.unwrap();
        assert_eq!(text, "Anna works in Vienna.");
        assert_eq!(llm.requests()[0].schema_name, None);
    }
}
