//! 记忆层：计费消息日志、token 估算、脱敏、步骤历史持久化

pub mod conversation;
pub mod persistence;
pub mod redact;
pub mod token_budget;

pub use conversation::{ContentPart, ConversationMemory, LlmRole, Message, MessageContent, Role};
pub use persistence::{HistoryStore, JsonHistoryStore};
pub use redact::Redactor;
pub use token_budget::{TokenEstimator, DEFAULT_IMAGE_TOKEN_COST};
