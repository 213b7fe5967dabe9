//! 当前用户子 Agent
//!
//! gather：首次调用时收集身份、员工档案与 wiki 中关于该员工的事实（每篇一次自由文本提取）；
//! 之后再调用为空操作。ask：把事实列表与问题拼成一次自由文本调用，返回去空白的回答。
//! 不接触动作菜单，也不会触发错误恢复。

use std::sync::Arc;

use crate::backend::Backend;
use crate::core::AgentError;
use crate::llm::{complete_text, LlmClient, LlmError};
use crate::memory::Message;

pub const NO_CURRENT_USER: &str = "No current user found.";
const NO_EMPLOYEE_DATA: &str = "No employee data found.";
const NO_WIKI_DATA: &str = "No wiki data about the user found.";

pub struct CurrentUserAgent {
    llm: Arc<dyn LlmClient>,
    backend: Arc<dyn Backend>,
    company: String,
    max_tokens: u32,
    facts: Vec<String>,
    initialized: bool,
}

impl CurrentUserAgent {
    pub fn new(llm: Arc<dyn LlmClient>, backend: Arc<dyn Backend>, company: impl Into<String>) -> Self {
        Self {
            llm,
            backend,
            company: company.into(),
            max_tokens: 16384,
            facts: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    /// 收集当前用户上下文；失败时保持未初始化，下次调用会重试
    pub async fn gather(&mut self) -> Result<(), AgentError> {
        if self.initialized {
            return Ok(());
        }

        let about = self.backend.who_am_i().await?;
        let Some(user) = about.current_user else {
            self.facts = vec![NO_CURRENT_USER.to_string()];
            self.initialized = true;
            return Ok(());
        };

        let mut facts = Vec::new();
        let resp = self.backend.get_employee(&user).await?;
        match resp.employee {
            Some(employee) => {
                facts.push(serde_json::to_string(&employee).unwrap_or_default());
                let hits = self.backend.search_wiki(&employee.name).await?;
                if hits.results.is_empty() {
                    facts.push(NO_WIKI_DATA.to_string());
                }
                for hit in &hits.results {
                    let page = self.backend.load_wiki(&hit.path).await?;
                    facts.push(self.extract_user_info(&employee.name, &page.content).await?);
                }
            }
            None => facts.push(NO_EMPLOYEE_DATA.to_string()),
        }

        tracing::info!(user = %user, facts = facts.len(), "current user context gathered");
        self.facts = facts;
        self.initialized = true;
        Ok(())
    }

    async fn extract_user_info(&self, name: &str, wiki_content: &str) -> Result<String, LlmError> {
        let messages = [
            Message::system(format!("Extract information about the person \"{}\"", name)),
            Message::user(wiki_content),
        ];
        complete_text(self.llm.as_ref(), &messages, self.max_tokens).await
    }

    /// 回答关于当前用户的问题
    pub async fn ask(&self, question: &str) -> Result<String, LlmError> {
        let facts = serde_json::to_string_pretty(&self.facts).unwrap_or_default();
        let system = format!(
            "\nYou are a assistant providing information about the current user in {} system.\n\n# Current user info:\n{}\n",
            self.company, facts
        );
        let messages = [Message::system(system), Message::user(question)];
        let answer = complete_text(self.llm.as_ref(), &messages, self.max_tokens).await?;
        tracing::debug!(question, answer = %answer, "current user answer");
        Ok(answer)
    }
}
