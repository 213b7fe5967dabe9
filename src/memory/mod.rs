//! 记忆层：单任务对话日志（只追加）

pub mod conversation;

pub use conversation::{has_tool_result, ConversationLog, Message, Role, ToolCall};
