//! done：结束任务并给出最终答案

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::browser::BrowserActuator;
use crate::core::AgentError;
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Action, ActionResult};

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DoneArgs {
    /// 给用户的最终答案
    pub text: String,
    /// 任务是否成功完成（默认 true）
    #[serde(default = "default_success")]
    pub success: bool,
}

pub struct DoneAction;

#[async_trait]
impl Action for DoneAction {
    fn name(&self) -> &str {
        "done"
    }

    fn description(&self) -> &str {
        "Complete the task and report the final answer to the user"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<DoneArgs>()
    }

    async fn execute(
        &self,
        args: Value,
        _browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: DoneArgs = parse_args(self.name(), args)?;
        Ok(ActionResult::done(args.text, args.success))
    }
}
