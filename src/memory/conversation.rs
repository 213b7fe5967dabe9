//! 对话日志：system / user / assistant / tool 四种角色的只追加记录
//!
//! 日志是模型每一步唯一可见的记忆；顺序即推理循环的因果顺序，不剪枝、不改写。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// assistant 选中的动作：step id + 动作名 + 参数 JSON
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// 仅 assistant：本步选择的动作
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    /// 仅 tool：对应的 step id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// 仅 tool：产生结果的动作名（错误恢复时为 `error_handling`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// assistant 条目：简要计划 + 本步动作
    pub fn assistant_call(content: impl Into<String>, call: ToolCall) -> Self {
        Self {
            tool_call: Some(call),
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// tool 条目：动作结果，挂在 step id 下
    pub fn tool(
        step_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(step_id.into()),
            name: Some(name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// 只追加的对话日志
#[derive(Clone, Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    /// 以 system prompt + 用户任务开局
    pub fn start(system_prompt: impl Into<String>, task_text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(task_text)],
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// 某个 step 是否已有 tool 结果（assistant 动作是否已被应答）
pub fn has_tool_result(messages: &[Message], step_id: &str) -> bool {
    messages
        .iter()
        .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(step_id))
}
