//! 任务状态：阶段枚举与可跨线程共享的控制句柄
//!
//! TaskControl 是唯一会被调用方克隆的部分：暂停标志在步骤边界轮询，取消令牌同时传给正在进行的 LLM 流。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// 任务阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Idle,
    Running,
    Paused,
    /// 模型提出了问题，等待调用方提供 follow-up
    AwaitingInput,
    Completed,
    Failed,
    Cancelled,
}

impl TaskPhase {
    /// 不会再自行推进的阶段（AwaitingInput 只是本轮结束，任务仍可继续）
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskPhase::Failed | TaskPhase::Cancelled)
    }
}

/// 暂停 / 取消控制句柄
#[derive(Clone, Debug, Default)]
pub struct TaskControl {
    paused: Arc<AtomicBool>,
    cancel_token: CancellationToken,
}

impl TaskControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// 取消：停止下一轮循环，并中止正在进行的模型请求；已派发的动作允许完成
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_shared_between_clones() {
        let control = TaskControl::new();
        let handle = control.clone();
        handle.pause();
        assert!(control.is_paused());
        handle.resume();
        assert!(!control.is_paused());
        handle.cancel();
        assert!(control.is_cancelled());
        assert!(control.token().is_cancelled());
    }
}
