//! SGR 推理循环
//!
//! 每个任务：拼装 system prompt → 日志 [system, user] → 至多 20 步，每步一次受 NextStep schema
//! 约束的结构化调用，执行其中唯一的动作，再把结果追加回日志。
//!
//! 终止条件：最终回复动作、步数用尽、模型输出不符合 schema（不重试）。
//! 后端失败交给 ErrorRecoveryAgent，分析结果以 `error_handling` 工具条目写回日志后继续。
//! 模型服务本身的失败（推理或兜底分类）与后端传输层失败向上传播给任务驱动方。
//!
//! 可选 event_tx：向调用方推送 AgentEvent；settings.console 为 true 时同时打印到终端。

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;

use crate::actions::{Action, ActionDispatcher, ProvideAgentResponse};
use crate::backend::{Backend, TaskInfo};
use crate::config::AppConfig;
use crate::core::{AgentError, ErrorRecoveryAgent};
use crate::llm::{complete_structured, LlmClient, LlmError};
use crate::memory::{ConversationLog, Message, ToolCall};
use crate::observability::{LlmCallRecord, TelemetrySink, TracingTelemetry};
use crate::sgr::current_user::CurrentUserAgent;
use crate::sgr::decision::NextStep;
use crate::sgr::events::{render, AgentEvent};
use crate::sgr::prompt::assemble_system_prompt;

/// 单任务推理步数硬上限
pub const MAX_REASONING_STEPS: usize = 20;

/// 错误条目在日志中使用的合成工具名
pub const ERROR_HANDLING_TOOL: &str = "error_handling";

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub company: String,
    pub rulebook_path: String,
    /// 不超过 MAX_REASONING_STEPS
    pub max_steps: usize,
    pub max_completion_tokens: u32,
    pub error_analysis_max_tokens: u32,
    /// 是否把事件打印到终端
    pub console: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            company: "Aetherion".to_string(),
            rulebook_path: "rulebook.md".to_string(),
            max_steps: MAX_REASONING_STEPS,
            max_completion_tokens: 16384,
            error_analysis_max_tokens: crate::core::recovery::ERROR_ANALYSIS_MAX_TOKENS,
            console: true,
        }
    }
}

impl AgentSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            company: cfg.agent.company_name.clone(),
            rulebook_path: cfg.agent.rulebook_path.clone(),
            max_steps: cfg.agent.max_steps.min(MAX_REASONING_STEPS),
            max_completion_tokens: cfg.llm.max_completion_tokens,
            error_analysis_max_tokens: cfg.agent.error_analysis_max_tokens,
            console: cfg.agent.console,
        }
    }
}

/// 循环停止原因
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// 模型给出最终回复
    Completed,
    BudgetExhausted,
    /// 模型输出不符合 schema，附原始错误
    SchemaViolation(String),
}

/// 一次任务的运行结果
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub stop: StopReason,
    /// 实际发起的推理调用次数
    pub steps: usize,
    pub final_response: Option<ProvideAgentResponse>,
    /// 最近一次错误恢复合成的回复
    pub last_error_response: Option<ProvideAgentResponse>,
    pub log: Vec<Message>,
}

impl AgentRun {
    /// 对外展示的消息：最终回复优先，否则最近一次错误恢复的消息
    pub fn surfaced_message(&self) -> Option<&str> {
        self.final_response
            .as_ref()
            .or(self.last_error_response.as_ref())
            .map(|r| r.message.as_str())
    }
}

pub struct SgrAgent {
    llm: Arc<dyn LlmClient>,
    backend: Arc<dyn Backend>,
    dispatcher: ActionDispatcher,
    recovery: ErrorRecoveryAgent,
    telemetry: Arc<dyn TelemetrySink>,
    event_tx: Option<UnboundedSender<AgentEvent>>,
    settings: AgentSettings,
}

impl SgrAgent {
    pub fn new(llm: Arc<dyn LlmClient>, backend: Arc<dyn Backend>, mut settings: AgentSettings) -> Self {
        settings.max_steps = settings.max_steps.min(MAX_REASONING_STEPS);
        let recovery = ErrorRecoveryAgent::new(llm.clone(), settings.company.clone())
            .with_max_tokens(settings.error_analysis_max_tokens);
        Self {
            dispatcher: ActionDispatcher::new(backend.clone()),
            llm,
            backend,
            recovery,
            telemetry: Arc::new(TracingTelemetry),
            event_tx: None,
            settings,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<AgentEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, event: AgentEvent) {
        if self.settings.console {
            println!("{}", render(&event));
        }
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// 执行一个任务
    pub async fn run(&self, task: &TaskInfo) -> Result<AgentRun, AgentError> {
        if self.settings.max_steps == 0 {
            return Err(AgentError::Config("agent.max_steps must be at least 1".to_string()));
        }
        let prompt = assemble_system_prompt(
            self.backend.as_ref(),
            &self.settings.company,
            &self.settings.rulebook_path,
        )
        .await?;
        let mut log = ConversationLog::start(prompt, task.task_text.clone());
        let mut current_user = CurrentUserAgent::new(
            self.llm.clone(),
            self.backend.clone(),
            self.settings.company.clone(),
        )
        .with_max_tokens(self.settings.max_completion_tokens);
        let mut last_error_response = None;

        tracing::info!(task_id = %task.task_id, max_steps = self.settings.max_steps, "task started");

        for i in 0..self.settings.max_steps {
            let step = i + 1;
            let step_id = format!("step_{}", step);
            let started = Instant::now();

            let decision = match complete_structured::<NextStep>(
                self.llm.as_ref(),
                log.messages(),
                self.settings.max_completion_tokens,
            )
            .await
            {
                Ok(d) => d,
                Err(LlmError::SchemaViolation(error)) => {
                    tracing::error!(step, error = %error, "model output rejected, aborting task");
                    self.emit(AgentEvent::SchemaViolation {
                        step,
                        error: error.clone(),
                    });
                    return Ok(AgentRun {
                        stop: StopReason::SchemaViolation(error),
                        steps: step,
                        final_response: None,
                        last_error_response,
                        log: log.into_messages(),
                    });
                }
                Err(e) => return Err(e.into()),
            };

            self.telemetry.record(LlmCallRecord::new(
                &task.task_id,
                self.llm.model(),
                started.elapsed(),
                decision.usage,
            ));

            let next = decision.value;
            let brief = next.next_step_brief().to_string();
            let action = next.function.sanitized();
            let arguments = action.to_arguments();

            self.emit(AgentEvent::Decision {
                step,
                plan: brief.clone(),
                action: action.name().to_string(),
                arguments: arguments.clone(),
            });
            log.push(Message::assistant_call(
                brief,
                ToolCall {
                    id: step_id.clone(),
                    name: action.name().to_string(),
                    arguments,
                },
            ));

            // 旁路查询：回答只打印，不写回日志
            if let Action::AskAboutCurrentUser(q) = &action {
                current_user.gather().await?;
                let answer = current_user.ask(&q.question).await?;
                self.emit(AgentEvent::CurrentUserAnswer { step, answer });
                continue;
            }

            match self.dispatcher.dispatch(&action).await {
                Ok(result) => {
                    let output = result.to_string();
                    self.emit(AgentEvent::ToolOutput {
                        step,
                        output: output.clone(),
                    });
                    log.push(Message::tool(step_id, action.name(), output));
                }
                Err(err) if err.is_transport() => {
                    tracing::error!(step, tool = action.tool(), error = %err, detail = err.detail_text(), "backend unreachable, aborting task");
                    return Err(err.into());
                }
                Err(err) => {
                    tracing::warn!(step, tool = action.tool(), error = %err, "action failed");
                    let context = format!("executing {}", action.name());
                    let analysis = self.recovery.analyze(&err, &context).await?;
                    let response = analysis.to_response();
                    self.emit(AgentEvent::ErrorAnalyzed {
                        step,
                        outcome: response.outcome.to_string(),
                        should_continue: analysis.should_continue,
                        message: response.message.clone(),
                    });
                    let content = serde_json::to_string(&analysis).unwrap_or_default();
                    log.push(Message::tool(step_id, ERROR_HANDLING_TOOL, content));
                    last_error_response = Some(response);
                }
            }

            if let Action::ProvideAgentResponse(resp) = action {
                self.emit(AgentEvent::Completed {
                    outcome: resp.outcome.to_string(),
                    message: resp.message.clone(),
                    links: resp.emitted_links().to_vec(),
                });
                tracing::info!(task_id = %task.task_id, steps = step, outcome = %resp.outcome, "task completed");
                return Ok(AgentRun {
                    stop: StopReason::Completed,
                    steps: step,
                    final_response: Some(resp),
                    last_error_response,
                    log: log.into_messages(),
                });
            }
        }

        tracing::warn!(task_id = %task.task_id, steps = self.settings.max_steps, "step budget exhausted");
        self.emit(AgentEvent::BudgetExhausted {
            steps: self.settings.max_steps,
        });
        Ok(AgentRun {
            stop: StopReason::BudgetExhausted,
            steps: self.settings.max_steps,
            final_response: None,
            last_error_response,
            log: log.into_messages(),
        })
    }
}
