//! 推理过程事件：控制台渲染，并可经 event_tx 推送给调用方

use serde::Serialize;

use crate::actions::AgentLink;

const CLI_RED: &str = "\x1B[31m";
const CLI_GREEN: &str = "\x1B[32m";
const CLI_BLUE: &str = "\x1B[34m";
const CLI_CLR: &str = "\x1B[0m";

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 模型选定本步动作
    Decision {
        step: usize,
        plan: String,
        action: String,
        arguments: String,
    },
    /// 动作执行结果（已去除 null）
    ToolOutput { step: usize, output: String },
    /// 当前用户子 Agent 的回答（不写入共享日志）
    CurrentUserAnswer { step: usize, answer: String },
    /// 错误恢复 Agent 的结论
    ErrorAnalyzed {
        step: usize,
        outcome: String,
        should_continue: bool,
        message: String,
    },
    /// 最终回复
    Completed {
        outcome: String,
        message: String,
        links: Vec<AgentLink>,
    },
    /// 步数用尽仍未给出最终回复
    BudgetExhausted { steps: usize },
    /// 模型输出不符合 NextStep schema
    SchemaViolation { step: usize, error: String },
}

/// 控制台文本（含 ANSI 颜色）
pub fn render(event: &AgentEvent) -> String {
    match event {
        AgentEvent::Decision {
            step,
            plan,
            action,
            arguments,
        } => format!("Next step_{}... {}\n  {} {}", step, plan, action, arguments),
        AgentEvent::ToolOutput { output, .. } => format!("{}OUT{}: {}", CLI_GREEN, CLI_CLR, output),
        AgentEvent::CurrentUserAnswer { answer, .. } => {
            format!("{}OUT{}: {}", CLI_GREEN, CLI_CLR, answer)
        }
        AgentEvent::ErrorAnalyzed {
            outcome, message, ..
        } => format!(
            "{}error agent {}{}. Summary:\n{}",
            CLI_BLUE, outcome, CLI_CLR, message
        ),
        AgentEvent::Completed {
            outcome,
            message,
            links,
        } => {
            let mut out = format!("{}agent {}{}. Summary:\n{}", CLI_BLUE, outcome, CLI_CLR, message);
            for link in links {
                let kind = serde_json::to_value(link.kind)
                    .ok()
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default();
                out.push_str(&format!("\n  - link {}: {}", kind, link.id));
            }
            out
        }
        AgentEvent::BudgetExhausted { steps } => format!(
            "{}ERR: no final response after {} steps{}",
            CLI_RED, steps, CLI_CLR
        ),
        AgentEvent::SchemaViolation { error, .. } => format!(
            "{}ERR: Exception during LLM call: {}{}",
            CLI_RED, error, CLI_CLR
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::EntityKind;

    #[test]
    fn test_render_completed_lists_links() {
        let text = render(&AgentEvent::Completed {
            outcome: "ok_answer".into(),
            message: "Done".into(),
            links: vec![AgentLink {
                kind: EntityKind::Project,
                id: "proj_1".into(),
            }],
        });
        assert!(text.contains("agent ok_answer"));
        assert!(text.ends_with("  - link project: proj_1"));
    }

    #[test]
    fn test_render_errors_in_red() {
        let text = render(&AgentEvent::SchemaViolation {
            step: 3,
            error: "bad".into(),
        });
        assert!(text.starts_with(CLI_RED));
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(AgentEvent::BudgetExhausted { steps: 20 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "budget_exhausted", "steps": 20}));
    }
}
