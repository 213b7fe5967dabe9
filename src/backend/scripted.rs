//! 脚本化内存后端（用于测试，无需网络）
//!
//! 每个 tool 路径对应一个回复队列：队列剩一条时重复返回该条；记录全部调用以便断言。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::Backend;
use crate::core::ApiError;

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, ApiError>>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 tool 追加一条成功回复
    pub fn respond(self, tool: &str, value: Value) -> Self {
        self.push(tool, Ok(value));
        self
    }

    /// 为 tool 追加一条失败
    pub fn fail(self, tool: &str, err: ApiError) -> Self {
        self.push(tool, Err(err));
        self
    }

    fn push(&self, tool: &str, result: Result<Value, ApiError>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(tool.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 某个 tool 被调用的次数
    pub fn calls_to(&self, tool: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(t, _)| t == tool)
            .count()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn call(&self, tool: &str, payload: Value) -> Result<Value, ApiError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((tool.to_string(), payload));

        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        let queue = responses.get_mut(tool).ok_or_else(|| {
            ApiError::new(format!("tool {} not supported", tool)).with_status(501)
        })?;
        if queue.len() > 1 {
            queue
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::new("empty script")))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ApiError::new("empty script")))
        }
    }
}
