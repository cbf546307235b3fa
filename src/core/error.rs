//! Agent 错误类型与处置方式
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定是向调用方传播（认证失败 / 取消）还是记录为步级失败并继续。

use thiserror::Error;

use crate::browser::BrowserError;
use crate::llm::LlmError;

/// 浏览器智能体运行过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// 凭证被拒绝：不重试，直接终止任务
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 用户或系统取消：向上传播，不计为失败
    #[error("Task cancelled")]
    Cancelled,

    /// 动作参数不符合 schema
    #[error("Invalid arguments for action '{action}': {message}")]
    Validation { action: String, message: String },

    #[error("Unregistered action: {0}")]
    UnregisteredAction(String),

    /// 浏览器执行失败（元素不存在、导航失败等）
    #[error("Action '{action}' failed: {message}")]
    Actuation { action: String, message: String },

    /// ACTION 块内容无法解析；该动作被丢弃
    #[error("Malformed action payload: {0}")]
    ActionParse(String),

    #[error("Action timeout: {0}")]
    ActionTimeout(String),

    #[error("Perception failed: {0}")]
    Perception(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Max steps reached ({0})")]
    MaxStepsReached(usize),

    #[error("Too many consecutive failures ({0})")]
    MaxConsecutiveFailures(usize),

    #[error("Invalid task state: {0}")]
    InvalidState(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 只有认证失败与取消会越过步骤循环向调用方传播
    pub fn propagates(&self) -> bool {
        matches!(self, AgentError::Authentication(_) | AgentError::Cancelled)
    }

    /// 任务级致命错误：传播类错误 + 两类资源上限
    pub fn is_task_fatal(&self) -> bool {
        self.propagates()
            || matches!(
                self,
                AgentError::MaxStepsReached(_) | AgentError::MaxConsecutiveFailures(_)
            )
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Authentication(msg) => AgentError::Authentication(msg),
            LlmError::Cancelled => AgentError::Cancelled,
            other => AgentError::Llm(other.to_string()),
        }
    }
}

impl From<BrowserError> for AgentError {
    fn from(e: BrowserError) -> Self {
        AgentError::Perception(e.to_string())
    }
}

/// 恢复引擎根据错误类型给出的处置方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// 越过步骤循环交给调用方
    Propagate,
    /// 记入 Step Record，并以一条错误结果注入下一轮推理
    RecordAndContinue(String),
    /// 丢弃（如无法解析的 ACTION 块），只记日志
    Drop,
}
