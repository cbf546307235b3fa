//! LLM 层：流式客户端抽象与实现（OpenAI 兼容 / DeepSeek / 脚本化 Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::{ScriptedLlmClient, ScriptedReply};
pub use openai::{OpenAiClient, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use traits::{ChunkStream, LlmClient, LlmError};

use crate::config::AppConfig;

/// 根据配置与环境变量选择 LLM 后端；没有可用 Key 时退回到脚本化 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_deepseek_key = std::env::var("DEEPSEEK_API_KEY").is_ok();
    let has_openai_key = std::env::var("OPENAI_API_KEY").is_ok();

    match provider.as_str() {
        "mock" => {
            tracing::info!("Using scripted mock LLM");
            Arc::new(ScriptedLlmClient::repeating(
                "[FINAL_RESPONSE]Mock LLM: no model configured.[/FINAL_RESPONSE]",
            ))
        }
        "deepseek" if has_deepseek_key || has_openai_key => {
            tracing::info!("Using DeepSeek LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::deepseek(Some(&cfg.llm.model)))
        }
        _ if has_openai_key => {
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
            ))
        }
        _ => {
            tracing::warn!("No API key set or provider unknown, using mock LLM");
            Arc::new(ScriptedLlmClient::repeating(
                "[FINAL_RESPONSE]Mock LLM: no API key configured.[/FINAL_RESPONSE]",
            ))
        }
    }
}
