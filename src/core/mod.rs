//! 核心：结果分类、错误类型、错误恢复 Agent

pub mod error;
pub mod outcome;
pub mod recovery;

pub use error::{AgentError, ApiError};
pub use outcome::{ErrorOutcome, Outcome};
pub use recovery::{quick_classify, ErrorAnalysis, ErrorRecoveryAgent};
