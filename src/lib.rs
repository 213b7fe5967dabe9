//! SGR Agent - 基于 Schema-Guided Reasoning 的项目 / 工时系统任务 Agent
//!
//! 模块划分：
//! - **actions**: 动作菜单（带 tool 标签的封闭和类型）与分发器
//! - **backend**: 后端抽象、HTTP 客户端、基准会话 API、wiki 导出
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 结果分类、错误类型、错误恢复 Agent
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、结构化输出
//! - **memory**: 对话日志
//! - **observability**: tracing 初始化与 LLM 调用遥测
//! - **sgr**: 推理循环、决策结构、system prompt、当前用户子 Agent

pub mod actions;
pub mod backend;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod sgr;

pub use sgr::{AgentRun, AgentSettings, SgrAgent, StopReason};
