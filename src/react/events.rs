//! 任务过程事件：生命周期、步骤、动作与原始流事件，供 UI 订阅展示
//!
//! 通过 UnboundedSender 发送，发送失败（订阅方已关闭）直接忽略，绝不阻塞循环。

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::react::parser::BlockKind;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    TaskStarted { task_id: String, task: String },
    TaskPaused { task_id: String },
    TaskResumed { task_id: String },
    TaskCancelled { task_id: String },
    TaskCompleted { task_id: String, answer: String },
    /// 任务级致命错误，message 面向用户
    TaskFailed { task_id: String, message: String },
    TaskAwaitingInput { task_id: String, question: String },
    StepStarted { step: usize, max_steps: usize },
    StepOk { step: usize },
    StepFailed { step: usize, error: String },
    ActionStarted { step: usize, action: String },
    ActionOk { step: usize, action: String, preview: Option<String> },
    ActionFailed { step: usize, action: String, error: String },
    /// 块外文本片段
    Token { text: String },
    BlockStart { kind: BlockKind },
    BlockEnd { kind: BlockKind, content: String },
    ToolCall { action: String, args: serde_json::Value },
    ToolResult { action: String, success: bool, content: Option<String> },
}

/// 可选的事件通道
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<AgentEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<AgentEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn send(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let ev = AgentEvent::BlockStart {
            kind: BlockKind::FinalResponse,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "block_start");
        assert_eq!(json["kind"], "final_response");
    }

    #[test]
    fn test_send_after_receiver_dropped_is_ignored() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        EventSink::new(tx).send(AgentEvent::Token { text: "x".into() });
        EventSink::none().send(AgentEvent::StepOk { step: 0 });
    }
}
