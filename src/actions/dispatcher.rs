//! 动作分发器
//!
//! 持有 Backend，dispatch(action) 按标签路径调用后端，结果去除 null 字段；
//! 每次调用输出结构化审计日志（JSON）。不施加超时，超时由后端 HTTP 客户端负责。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::actions::Action;
use crate::backend::Backend;
use crate::core::ApiError;

pub struct ActionDispatcher {
    backend: Arc<dyn Backend>,
}

impl ActionDispatcher {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// 执行动作；失败返回后端的类型化错误，交由 ErrorRecoveryAgent 处理
    pub async fn dispatch(&self, action: &Action) -> Result<Value, ApiError> {
        let start = Instant::now();
        let payload = action.payload();
        let args_preview = args_preview(&payload);
        let result = self.backend.call(action.tool(), payload).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "action_audit",
            "tool": action.tool(),
            "ok": result.is_ok(),
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "action");

        result.map(strip_nulls)
    }
}

/// 递归去除对象中的 null 成员
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
