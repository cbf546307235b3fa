//! 核心层：错误与处置、恢复引擎、任务状态与控制句柄

pub mod error;
pub mod recovery;
pub mod state;

pub use error::{AgentError, ErrorDisposition};
pub use recovery::RecoveryEngine;
pub use state::{TaskControl, TaskPhase};
