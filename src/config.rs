//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEE_BROWSER__*` 覆盖（双下划线表示嵌套，如 `BEE_BROWSER__AGENT__MAX_STEPS=50`）。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSettings,
    pub llm: LlmSection,
    pub redaction: RedactionSection,
    pub history: HistorySection,
}

/// [agent] 段：步骤循环的资源上限与行为开关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_steps: usize,
    /// 连续失败多少步后终止任务
    pub max_consecutive_failures: usize,
    /// 单步最多执行的动作数，多余的丢弃
    pub max_actions_per_step: usize,
    /// 页面状态消息是否附带截图
    pub use_vision: bool,
    /// run() 暂停时轮询间隔
    pub pause_poll_interval_ms: u64,
    /// 单个动作超时（秒）
    pub action_timeout_secs: u64,
    /// 上下文 token 预算
    pub max_input_tokens: usize,
    /// 每张截图计入的 token 数
    pub image_token_cost: usize,
    /// Step Record 中页面摘要保留的字符数
    pub summary_preview_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_consecutive_failures: 3,
            max_actions_per_step: 10,
            use_vision: false,
            pause_poll_interval_ms: 200,
            action_timeout_secs: 30,
            max_input_tokens: 128_000,
            image_token_cost: crate::memory::DEFAULT_IMAGE_TOKEN_COST,
            summary_preview_chars: 500,
        }
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock；没有 API Key 时退回 mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: crate::llm::DEEPSEEK_CHAT.to_string(),
            base_url: None,
        }
    }
}

/// [redaction] 段：符号名 -> 敏感字面量
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedactionSection {
    pub secrets: HashMap<String, String>,
}

/// [history] 段：步骤历史 JSON 目录；不设置则不持久化
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    pub dir: Option<PathBuf>,
}

/// 从 config 目录加载配置，环境变量 BEE_BROWSER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEE_BROWSER")
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
        assert_eq!(cfg.agent.max_steps, 100);
        assert_eq!(cfg.agent.max_consecutive_failures, 3);
        assert_eq!(cfg.agent.max_input_tokens, 128_000);
        assert!(cfg.redaction.secrets.is_empty());
        assert!(cfg.history.dir.is_none());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[agent]\nmax_steps = 7\nuse_vision = true\n\n[llm]\nprovider = \"mock\"\n\n[redaction.secrets]\nbank_pin = \"4321\""
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.agent.max_steps, 7);
        assert!(cfg.agent.use_vision);
        assert_eq!(cfg.agent.max_consecutive_failures, 3);
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.redaction.secrets.get("bank_pin").map(String::as_str), Some("4321"));
    }
}
