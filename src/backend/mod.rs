//! 后端边界：任务 API、身份、员工档案、Wiki
//!
//! Backend 只需实现一个通用 `call(tool, payload)`；身份 / 档案 / Wiki 等类型化查询
//! 都是其上的默认方法。HttpBackend 走真实接口，ScriptedBackend 供测试使用。

pub mod http;
pub mod scripted;
pub mod session;
pub mod wiki;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::actions::{Action, Page};
use crate::core::ApiError;

pub use http::HttpBackend;
pub use scripted::ScriptedBackend;
pub use session::{BenchmarkClient, BenchmarkTelemetry, TaskInfo, TaskResult};
pub use wiki::dump_wiki;

/// 身份查询结果；除 current_user 外的字段原样保留，用于拼入 system prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhoAmI {
    #[serde(default)]
    pub current_user: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeResponse {
    #[serde(default)]
    pub employee: Option<Employee>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiPage {
    #[serde(default)]
    pub file: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiHit {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiSearchResponse {
    #[serde(default)]
    pub results: Vec<WikiHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiList {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// 单任务后端客户端
#[async_trait]
pub trait Backend: Send + Sync {
    /// 以标签路径调用后端；失败返回类型化错误
    async fn call(&self, tool: &str, payload: Value) -> Result<Value, ApiError>;

    async fn who_am_i(&self) -> Result<WhoAmI, ApiError> {
        typed("/whoami", self.call("/whoami", json!({})).await?)
    }

    async fn get_employee(&self, id: &str) -> Result<EmployeeResponse, ApiError> {
        typed("/employees/get", self.call("/employees/get", json!({ "id": id })).await?)
    }

    async fn load_wiki(&self, file: &str) -> Result<WikiPage, ApiError> {
        typed("/wiki/load", self.call("/wiki/load", json!({ "file": file })).await?)
    }

    async fn search_wiki(&self, query: &str) -> Result<WikiSearchResponse, ApiError> {
        typed("/wiki/search", self.call("/wiki/search", json!({ "query": query })).await?)
    }

    async fn list_wiki(&self) -> Result<WikiList, ApiError> {
        typed("/wiki/list", self.call("/wiki/list", json!({})).await?)
    }
}

fn typed<T: DeserializeOwned>(tool: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| {
        ApiError::new(format!("malformed response from {}", tool)).with_detail(e.to_string())
    })
}

/// 分页拉取全部项目（按 next_offset 翻页，直到 next_offset <= 0）
pub async fn list_all_projects(
    backend: &dyn Backend,
    limit: i64,
) -> Result<Vec<Value>, ApiError> {
    let mut projects = Vec::new();
    let mut offset = 0;
    loop {
        let action = Action::ListProjects(Page { offset, limit });
        let page = backend.call(action.tool(), action.payload()).await?;
        if let Some(items) = page.get("projects").and_then(Value::as_array) {
            projects.extend(items.iter().cloned());
        }
        match page.get("next_offset").and_then(Value::as_i64) {
            Some(next) if next > offset => offset = next,
            _ => break,
        }
    }
    Ok(projects)
}
