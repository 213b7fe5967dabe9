//! 单步推理的决策结构（NextStep）
//!
//! 模型每步必须输出：当前状态、1–5 条简要计划、完成标志、恰好一个动作。
//! 只有计划的第一条会被使用，其余仅供模型自洽。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::Action;
use crate::llm::StructuredOutput;

/// 计划条数上限
pub const MAX_PLAN_STEPS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NextStep {
    pub current_state: String,
    /// explain your thoughts on how to accomplish - what steps to execute
    #[schemars(length(min = 1, max = 5))]
    pub plan_remaining_steps_brief: Vec<String>,
    pub task_completed: bool,
    /// execute first remaining step
    pub function: Action,
}

impl NextStep {
    /// 本步执行的简要计划（第一条）
    pub fn next_step_brief(&self) -> &str {
        self.plan_remaining_steps_brief
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl StructuredOutput for NextStep {
    const NAME: &'static str = "NextStep";

    /// 除 serde 外额外拒绝：未选择动作、选择多个动作、计划条数越界
    fn parse(raw: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        match value.get("function") {
            Some(Value::Object(_)) => {}
            None | Some(Value::Null) => return Err("function: no action selected".to_string()),
            Some(Value::Array(items)) => {
                return Err(format!(
                    "function: expected exactly one action, got {}",
                    items.len()
                ))
            }
            Some(other) => return Err(format!("function: expected an object, got {}", other)),
        }

        let step: NextStep = serde_json::from_value(value).map_err(|e| e.to_string())?;
        let n = step.plan_remaining_steps_brief.len();
        if !(1..=MAX_PLAN_STEPS).contains(&n) {
            return Err(format!(
                "plan_remaining_steps_brief: expected 1..={} entries, got {}",
                MAX_PLAN_STEPS, n
            ));
        }
        Ok(step)
    }
}
