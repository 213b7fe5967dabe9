//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SGR__*` 覆盖（双下划线表示嵌套，如 `SGR__LLM__MODEL=gpt-4.1`）。
//! 密钥不写进配置文件，只记录存放密钥的环境变量名（`api_key_env`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub benchmark: BenchmarkSection,
}

/// [llm] 段：OpenAI 兼容端点与模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 未设置时使用 async-openai 默认端点
    pub base_url: Option<String>,
    pub model: String,
    pub api_key_env: String,
    pub max_completion_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "gpt-4.1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_completion_tokens: 16384,
            request_timeout_secs: 120,
        }
    }
}

impl LlmSection {
    pub fn api_key(&self) -> Option<String> {
        env_var(&self.api_key_env)
    }
}

/// [agent] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 超过 20 时按 20 处理
    pub max_steps: usize,
    pub company_name: String,
    pub rulebook_path: String,
    pub error_analysis_max_tokens: u32,
    pub console: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: 20,
            company_name: "Aetherion".to_string(),
            rulebook_path: "rulebook.md".to_string(),
            error_analysis_max_tokens: 500,
            console: true,
        }
    }
}

/// [benchmark] 段：评测平台会话
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BenchmarkSection {
    pub base_url: String,
    pub api_key_env: String,
    pub benchmark: String,
    pub workspace: String,
    pub session_name: String,
    pub architecture: String,
    /// 只运行 spec_id 在列表中的任务；为空时全部运行
    pub spec_filter: Vec<String>,
    pub submit: bool,
    pub request_timeout_secs: u64,
}

impl Default for BenchmarkSection {
    fn default() -> Self {
        Self {
            base_url: "https://erc.timetoact-group.at".to_string(),
            api_key_env: "ERC3_API_KEY".to_string(),
            benchmark: "erc3-dev".to_string(),
            workspace: "my".to_string(),
            session_name: "SGR Agent".to_string(),
            architecture: "NextStep SGR Agent with OpenAI".to_string(),
            spec_filter: Vec::new(),
            submit: false,
            request_timeout_secs: 60,
        }
    }
}

impl BenchmarkSection {
    pub fn api_key(&self) -> Option<String> {
        env_var(&self.api_key_env)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// 加载配置：默认文件（若存在）→ 显式文件 → `SGR__*` 环境变量
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        builder = builder.add_source(config::File::from(path.clone()).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SGR")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_steps, 20);
        assert_eq!(cfg.agent.error_analysis_max_tokens, 500);
        assert_eq!(cfg.llm.max_completion_tokens, 16384);
        assert!(cfg.benchmark.spec_filter.is_empty());
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[agent]\nmax_steps = 7\ncompany_name = \"Globex\"\n\n[llm]\nmodel = \"test-model\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(cfg.agent.max_steps, 7);
        assert_eq!(cfg.agent.company_name, "Globex");
        assert_eq!(cfg.llm.model, "test-model");
        assert_eq!(cfg.agent.rulebook_path, "rulebook.md");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(load_config(Some(PathBuf::from("/nonexistent/sgr.toml"))).is_err());
    }
}
