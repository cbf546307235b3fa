//! 脚本化 Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! 按顺序返回预先写好的回复，每条回复按小块切分后流式输出，以便覆盖跨块的标记拆分。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::stream;
use tokio_util::sync::CancellationToken;

use crate::llm::{ChunkStream, LlmClient, LlmError};
use crate::memory::Message;

/// 流式回复时每块字符数
const CHUNK_CHARS: usize = 6;

/// 一次调用的脚本
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Chunks(Vec<String>),
    Fail(LlmError),
}

impl ScriptedReply {
    /// 把整段文本切成 CHUNK_CHARS 大小的块
    pub fn text(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        ScriptedReply::Chunks(
            chars
                .chunks(CHUNK_CHARS)
                .map(|c| c.iter().collect())
                .collect(),
        )
    }
}

/// 脚本耗尽后若设置了 fallback 则一直返回它，否则返回错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<Message>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedLlmClient {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        }
    }

    /// 每次调用都返回同一段文本
    pub fn repeating(text: &str) -> Self {
        Self {
            fallback: Some(ScriptedReply::text(text)),
            ..Default::default()
        }
    }

    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 最近一次调用收到的完整消息列表
    pub fn last_messages(&self) -> Vec<Message> {
        lock(&self.last_messages).clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete_stream(
        &self,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<ChunkStream, LlmError> {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_messages) = messages.to_vec();

        let next = lock(&self.replies).pop_front().or_else(|| self.fallback.clone());
        match next {
            Some(ScriptedReply::Chunks(chunks)) => {
                Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
            }
            Some(ScriptedReply::Fail(e)) => Err(e),
            None => Err(LlmError::Other("mock script exhausted".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted-mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_scripted_reply_is_chunked() {
        let client = ScriptedLlmClient::new([ScriptedReply::text("[THINKING]hello[/THINKING]")]);
        let mut stream = client
            .complete_stream(&[], CancellationToken::new())
            .await
            .unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), "[THINKING]hello[/THINKING]");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let client = ScriptedLlmClient::new([]);
        let result = client.complete_stream(&[], CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let client = ScriptedLlmClient::repeating("x");
        let token = CancellationToken::new();
        token.cancel();
        let result = client.complete_stream(&[], token).await;
        assert!(matches!(result, Err(LlmError::Cancelled)));
        assert_eq!(client.call_count(), 0);
    }
}
