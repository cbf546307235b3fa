//! LLM 客户端抽象
//!
//! 运行时只需要「给我一串 token」：complete_stream 返回文本块流，取消令牌与编排器共享。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::memory::Message;

/// 文本块流
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 调用错误（按是否可恢复分类）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// API Key 被拒绝等，不可本地恢复
    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("rate limited")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// 从后端返回的错误文本粗略分类
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("401")
            || lower.contains("invalid_api_key")
            || lower.contains("incorrect api key")
            || lower.contains("unauthorized")
        {
            LlmError::Authentication(message)
        } else if lower.contains("429") || lower.contains("rate limit") {
            LlmError::RateLimited
        } else if lower.contains("timed out") || lower.contains("connection") {
            LlmError::Network(message)
        } else {
            LlmError::Other(message)
        }
    }
}

/// LLM 客户端 trait：流式完成（返回文本块流），可被取消令牌中止
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete_stream(
        &self,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<ChunkStream, LlmError>;

    /// 模型名（日志用）
    fn model_name(&self) -> &str {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth() {
        assert!(matches!(
            LlmError::classify("HTTP 401: Incorrect API key provided"),
            LlmError::Authentication(_)
        ));
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(
            LlmError::classify("model overloaded"),
            LlmError::Other("model overloaded".into())
        );
        assert_eq!(LlmError::classify("429 Too Many Requests"), LlmError::RateLimited);
    }
}
