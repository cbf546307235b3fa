//! 动作执行器
//!
//! 持有 ActionRegistry 与单动作超时，execute(name, args, browser) 在超时内调用 registry.try_dispatch；
//! 超时转为带错误的 ActionResult，每次调用输出结构化审计日志（JSON，参数预览经过脱敏）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::browser::BrowserActuator;
use crate::core::AgentError;
use crate::memory::Redactor;
use crate::tools::{ActionRegistry, ActionResult};

const ARGS_PREVIEW_CHARS: usize = 200;

/// 动作执行器：对每次调用施加超时并记录审计日志
pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
    timeout: Duration,
    redactor: Option<Arc<Redactor>>,
}

impl ActionExecutor {
    pub fn new(registry: Arc<ActionRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            redactor: None,
        }
    }

    /// 审计日志里的参数预览先经过脱敏
    pub fn with_redactor(mut self, redactor: Arc<Redactor>) -> Self {
        self.redactor = Some(redactor);
        self
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// 执行指定动作。
    ///
    /// - 未注册 / 参数校验失败：返回 Err（UnregisteredAction / Validation），由调用方决定是否中止本步
    /// - handler 失败：Ok(ActionResult { error: Some(..) })
    /// - 超时：Ok(ActionResult::error(ActionTimeout))
    /// - Authentication / Cancelled：原样返回 Err
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let start = Instant::now();
        let args_preview = self.args_preview(&args);
        let result = timeout(self.timeout, self.registry.try_dispatch(name, args, browser)).await;

        let outcome = match &result {
            Ok(Ok(r)) if r.error.is_none() => "ok",
            Ok(Ok(_)) => "error",
            Ok(Err(_)) => "rejected",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "action_audit",
            "action": name,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "action");

        match result {
            Ok(inner) => inner,
            Err(_) => Ok(ActionResult::error(
                AgentError::ActionTimeout(name.to_string()).to_string(),
            )),
        }
    }

    fn args_preview(&self, args: &Value) -> String {
        let s = args.to_string();
        let s = match &self.redactor {
            Some(r) => r.redact(&s),
            None => s,
        };
        if s.chars().count() > ARGS_PREVIEW_CHARS {
            format!("{}...", s.chars().take(ARGS_PREVIEW_CHARS).collect::<String>())
        } else {
            s
        }
    }
}
