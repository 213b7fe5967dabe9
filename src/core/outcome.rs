//! 结果分类（Outcome）：最终回复与错误分析共用的固定枚举
//!
//! `ErrorOutcome` 在 `Outcome` 基础上仅为错误路径追加 `ok_with_parameter_adjustment`。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 任务结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    OkAnswer,
    OkNotFound,
    DeniedSecurity,
    NoneClarificationNeeded,
    NoneUnsupported,
    ErrorInternal,
}

impl Outcome {
    /// 仅 ok_* 结果允许附带实体链接
    pub fn is_ok(self) -> bool {
        matches!(self, Outcome::OkAnswer | Outcome::OkNotFound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::OkAnswer => "ok_answer",
            Outcome::OkNotFound => "ok_not_found",
            Outcome::DeniedSecurity => "denied_security",
            Outcome::NoneClarificationNeeded => "none_clarification_needed",
            Outcome::NoneUnsupported => "none_unsupported",
            Outcome::ErrorInternal => "error_internal",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 错误分析专用结果：Outcome 全集 + 参数调整
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOutcome {
    OkAnswer,
    OkNotFound,
    DeniedSecurity,
    NoneClarificationNeeded,
    NoneUnsupported,
    ErrorInternal,
    OkWithParameterAdjustment,
}

impl ErrorOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorOutcome::OkWithParameterAdjustment => "ok_with_parameter_adjustment",
            other => other.base().map(Outcome::as_str).unwrap_or_default(),
        }
    }

    /// 映射回共享 Outcome；扩展值没有对应项
    pub fn base(self) -> Option<Outcome> {
        match self {
            ErrorOutcome::OkAnswer => Some(Outcome::OkAnswer),
            ErrorOutcome::OkNotFound => Some(Outcome::OkNotFound),
            ErrorOutcome::DeniedSecurity => Some(Outcome::DeniedSecurity),
            ErrorOutcome::NoneClarificationNeeded => Some(Outcome::NoneClarificationNeeded),
            ErrorOutcome::NoneUnsupported => Some(Outcome::NoneUnsupported),
            ErrorOutcome::ErrorInternal => Some(Outcome::ErrorInternal),
            ErrorOutcome::OkWithParameterAdjustment => None,
        }
    }
}

impl From<Outcome> for ErrorOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::OkAnswer => ErrorOutcome::OkAnswer,
            Outcome::OkNotFound => ErrorOutcome::OkNotFound,
            Outcome::DeniedSecurity => ErrorOutcome::DeniedSecurity,
            Outcome::NoneClarificationNeeded => ErrorOutcome::NoneClarificationNeeded,
            Outcome::NoneUnsupported => ErrorOutcome::NoneUnsupported,
            Outcome::ErrorInternal => ErrorOutcome::ErrorInternal,
        }
    }
}

impl std::fmt::Display for ErrorOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_names() {
        let json = serde_json::to_string(&Outcome::NoneClarificationNeeded).unwrap();
        assert_eq!(json, "\"none_clarification_needed\"");
        let parsed: ErrorOutcome =
            serde_json::from_str("\"ok_with_parameter_adjustment\"").unwrap();
        assert_eq!(parsed, ErrorOutcome::OkWithParameterAdjustment);
        assert_eq!(parsed.base(), None);
    }

    #[test]
    fn test_only_ok_outcomes_allow_links() {
        assert!(Outcome::OkAnswer.is_ok());
        assert!(Outcome::OkNotFound.is_ok());
        assert!(!Outcome::DeniedSecurity.is_ok());
        assert!(!Outcome::ErrorInternal.is_ok());
    }

    #[test]
    fn test_error_outcome_display_matches_base() {
        for o in [Outcome::OkAnswer, Outcome::DeniedSecurity, Outcome::NoneUnsupported] {
            assert_eq!(ErrorOutcome::from(o).to_string(), o.to_string());
        }
    }
}
