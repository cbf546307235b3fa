//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 ErrorDisposition，供步骤循环决定是传播、记录后继续还是丢弃。
//! 设计目标是让模型从自己的错误中恢复，而不是让任务崩溃。

use crate::core::{AgentError, ErrorDisposition};

/// 语义化错误处置：传播 / 以提示形式反馈给下一轮 / 丢弃
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> ErrorDisposition {
        match err {
            AgentError::Authentication(_) | AgentError::Cancelled => ErrorDisposition::Propagate,
            AgentError::ActionParse(_) => ErrorDisposition::Drop,
            AgentError::Validation { action, message } => ErrorDisposition::RecordAndContinue(
                format!(
                    "Invalid arguments for action '{action}': {message}. \
                     Check the action schema and try again."
                ),
            ),
            AgentError::UnregisteredAction(name) => ErrorDisposition::RecordAndContinue(format!(
                "Action '{name}' does not exist. Only use the actions listed in the system prompt."
            )),
            AgentError::Actuation { action, message } => ErrorDisposition::RecordAndContinue(
                format!("Action '{action}' failed: {message}"),
            ),
            AgentError::ActionTimeout(name) => ErrorDisposition::RecordAndContinue(format!(
                "Action '{name}' timed out; the page may be slow, consider waiting or retrying."
            )),
            other => ErrorDisposition::RecordAndContinue(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_propagates_auth_and_cancel() {
        let engine = RecoveryEngine::new();
        assert_eq!(
            engine.handle(&AgentError::Authentication("401".into())),
            ErrorDisposition::Propagate
        );
        assert_eq!(engine.handle(&AgentError::Cancelled), ErrorDisposition::Propagate);
    }

    #[test]
    fn test_recovery_validation_mentions_action() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Validation {
            action: "click_element".into(),
            message: "missing required field `index`".into(),
        };
        match engine.handle(&err) {
            ErrorDisposition::RecordAndContinue(msg) => {
                assert!(msg.contains("click_element"));
                assert!(msg.contains("index"));
            }
            other => panic!("Expected RecordAndContinue, got {other:?}"),
        }
    }

    #[test]
    fn test_recovery_drops_parse_error() {
        let engine = RecoveryEngine::new();
        let err = AgentError::ActionParse("not json".into());
        assert_eq!(engine.handle(&err), ErrorDisposition::Drop);
    }

    #[test]
    fn test_recovery_llm_error_is_step_scoped() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Llm("connection reset".into());
        assert!(matches!(engine.handle(&err), ErrorDisposition::RecordAndContinue(_)));
        assert!(!err.is_task_fatal());
    }

    #[test]
    fn test_resource_limits_are_fatal_and_distinct() {
        let steps = AgentError::MaxStepsReached(3);
        let failures = AgentError::MaxConsecutiveFailures(3);
        assert!(steps.is_task_fatal());
        assert!(failures.is_task_fatal());
        assert_ne!(steps, failures);
    }
}
