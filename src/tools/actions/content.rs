//! cache_content：把当前发现暂存进记忆，供后续步骤与最终答案使用

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::browser::BrowserActuator;
use crate::core::AgentError;
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Action, ActionResult};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheContentArgs {
    /// 要记住的内容
    pub content: String,
}

pub struct CacheContentAction;

#[async_trait]
impl Action for CacheContentAction {
    fn name(&self) -> &str {
        "cache_content"
    }

    fn description(&self) -> &str {
        "Cache what you have found so far from the current page for future use"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<CacheContentArgs>()
    }

    async fn execute(
        &self,
        args: Value,
        _browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: CacheContentArgs = parse_args(self.name(), args)?;
        Ok(ActionResult::ok(format!("Cached findings: {}", args.content)))
    }
}
