//! OpenAI 兼容 API 客户端（流式）
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。
//! 只负责把消息日志转换为请求并把增量 content 转成文本块流，解析交给 StreamParser。

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::llm::{ChunkStream, LlmClient, LlmError};
use crate::memory::{LlmRole, Message};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    /// DeepSeek 兼容端点：优先 DEEPSEEK_API_KEY，其次 OPENAI_API_KEY
    pub fn deepseek(model: Option<&str>) -> Self {
        let api_key = std::env::var("DEEPSEEK_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        let model = model.unwrap_or(DEEPSEEK_CHAT);
        Self::new(Some(DEEPSEEK_BASE_URL), model, api_key.as_deref())
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let build_err = |e: async_openai::error::OpenAIError| LlmError::Other(e.to_string());
        messages
            .iter()
            .map(|m| {
                // TODO: 截图应作为 image_url content part 发送，目前只传文本部分
                let content = m.text();
                Ok(match m.role().llm_role() {
                    LlmRole::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(content)
                            .build()
                            .map_err(build_err)?,
                    ),
                    LlmRole::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(content)
                            .build()
                            .map_err(build_err)?,
                    ),
                    LlmRole::Assistant => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(content)
                            .build()
                            .map_err(build_err)?,
                    ),
                })
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete_stream(
        &self,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<ChunkStream, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.to_openai_messages(messages)?)
            .stream(true)
            .build()
            .map_err(|e| LlmError::Other(e.to_string()))?;

        let chat = self.client.chat();
        let pending = chat.create_stream(request);
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            res = pending => res.map_err(|e| LlmError::classify(e.to_string()))?,
        };

        let chunks = stream
            .filter_map(|item| async move {
                match item {
                    Ok(resp) => {
                        let text: String = resp
                            .choices
                            .iter()
                            .filter_map(|c| c.delta.content.clone())
                            .collect();
                        (!text.is_empty()).then_some(Ok(text))
                    }
                    Err(e) => Some(Err(LlmError::classify(e.to_string()))),
                }
            })
            .take_until(cancel.cancelled_owned());

        Ok(Box::pin(chunks))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
