//! 任务上下文与步骤记录

use serde::{Deserialize, Serialize};

use crate::browser::WorldState;
use crate::core::{TaskControl, TaskPhase};
use crate::memory::Redactor;
use crate::tools::ActionResult;

/// 步骤执行前捕获的轻量页面快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerceptionSummary {
    pub url: String,
    pub title: String,
    /// 截断后的 summary_text
    pub summary: String,
}

impl PerceptionSummary {
    /// 先脱敏再截断，避免截断后残留半截明文
    pub fn from_world(state: &WorldState, max_chars: usize, redactor: &Redactor) -> Self {
        let text = redactor.redact(&state.summary_text);
        let summary = if text.chars().count() > max_chars {
            let head: String = text.chars().take(max_chars).collect();
            format!("{head}...")
        } else {
            text
        };
        Self {
            url: redactor.redact(&state.url),
            title: redactor.redact(&state.title),
            summary,
        }
    }
}

/// 单步记录：追加后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    /// 本步模型原始输出
    pub raw: String,
    pub results: Vec<ActionResult>,
    pub perception: PerceptionSummary,
    pub error: Option<String>,
    pub timestamp_ms: i64,
}

impl StepRecord {
    pub fn new(
        step: usize,
        raw: String,
        results: Vec<ActionResult>,
        perception: PerceptionSummary,
        error: Option<String>,
    ) -> Self {
        Self {
            step,
            raw,
            results,
            perception,
            error,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// runStep 的返回
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// 本轮结束（完成或等待输入）
    pub done: bool,
    pub response: Option<String>,
    pub question: Option<String>,
    pub error: Option<String>,
}

/// run() 的正常结束方式；任务级失败以 Err(AgentError) 返回
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed { answer: String, success: bool },
    AwaitingInput { question: String },
}

/// 单个任务的全部状态，由 TaskExecutor 独占
#[derive(Debug)]
pub struct TaskContext {
    pub task_id: String,
    pub task: String,
    /// 下一步的编号，从 0 开始单调递增
    pub step_index: usize,
    pub max_steps: usize,
    pub max_consecutive_failures: usize,
    pub consecutive_failures: usize,
    pub phase: TaskPhase,
    /// 暂停 / 取消标志
    pub control: TaskControl,
    /// 上一步的动作结果，下一步感知前折叠进上下文
    pub pending_results: Vec<ActionResult>,
    pub final_answer: Option<String>,
    /// 完成时 done 动作给出的 success
    pub final_success: bool,
    pub pending_question: Option<String>,
    pub history: Vec<StepRecord>,
}

impl TaskContext {
    pub fn new(task: impl Into<String>, max_steps: usize, max_consecutive_failures: usize) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            task: task.into(),
            step_index: 0,
            max_steps,
            max_consecutive_failures,
            consecutive_failures: 0,
            phase: TaskPhase::Idle,
            control: TaskControl::new(),
            pending_results: Vec::new(),
            final_answer: None,
            final_success: false,
            pending_question: None,
            history: Vec::new(),
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn steps_exhausted(&self) -> bool {
        self.step_index >= self.max_steps
    }

    pub fn failures_exhausted(&self) -> bool {
        self.consecutive_failures >= self.max_consecutive_failures
    }

    /// 失败计数：本步有执行错误则 +1，否则清零
    pub fn record_step_result(&mut self, failed: bool) {
        if failed {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
    }
}
