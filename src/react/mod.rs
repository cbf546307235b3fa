//! 智能体运行时：流式协议解析、上下文管理、步骤循环与任务状态

pub mod events;
pub mod loop_;
pub mod memory;
pub mod parser;
pub mod prompts;
pub mod task;

pub use events::{AgentEvent, EventSink};
pub use loop_::{TaskExecutor, TaskResources};
pub use memory::ContextManager;
pub use parser::{parse_action, ActionCall, BlockKind, ParserEvent, StreamParser};
pub use prompts::{build_perception_snapshot, build_system_prompt};
pub use task::{PerceptionSummary, StepOutcome, StepRecord, TaskContext, TaskOutcome};
