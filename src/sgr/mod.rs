//! Schema-Guided Reasoning 任务 Agent
//!
//! - **decision**：每步的 NextStep 结构
//! - **prompt**：system prompt 拼装
//! - **current_user**：当前用户子 Agent
//! - **events**：过程事件与控制台渲染
//! - **loop_**：推理循环（SgrAgent）

pub mod current_user;
pub mod decision;
pub mod events;
pub mod loop_;
pub mod prompt;

pub use current_user::CurrentUserAgent;
pub use decision::{NextStep, MAX_PLAN_STEPS};
pub use events::{render, AgentEvent};
pub use loop_::{AgentRun, AgentSettings, SgrAgent, StopReason, ERROR_HANDLING_TOOL, MAX_REASONING_STEPS};
pub use prompt::{assemble_system_prompt, build_system_prompt, PUBLIC_ACCESS_NOTICE};
