//! 标签页管理：switch_tab、open_tab、close_tab

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::browser::BrowserActuator;
use crate::core::AgentError;
use crate::tools::registry::actuation_error;
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Action, ActionResult};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TabIdArgs {
    /// 标签页 id（见页面状态中的 Available tabs）
    pub tab_id: u32,
}

pub struct SwitchTabAction;

#[async_trait]
impl Action for SwitchTabAction {
    fn name(&self) -> &str {
        "switch_tab"
    }

    fn description(&self) -> &str {
        "Switch to the tab with the given id"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<TabIdArgs>()
    }

    fn needs_fresh_perception(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: TabIdArgs = parse_args(self.name(), args)?;
        browser
            .switch_tab(args.tab_id)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(ActionResult::ok(format!("Switched to tab {}", args.tab_id)))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OpenTabArgs {
    /// 新标签页打开的地址
    pub url: String,
}

pub struct OpenTabAction;

#[async_trait]
impl Action for OpenTabAction {
    fn name(&self) -> &str {
        "open_tab"
    }

    fn description(&self) -> &str {
        "Open the URL in a new tab"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<OpenTabArgs>()
    }

    fn needs_fresh_perception(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: OpenTabArgs = parse_args(self.name(), args)?;
        let tab_id = browser
            .open_tab(&args.url)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(ActionResult::ok(format!("Opened {} in new tab {}", args.url, tab_id)))
    }
}

pub struct CloseTabAction;

#[async_trait]
impl Action for CloseTabAction {
    fn name(&self) -> &str {
        "close_tab"
    }

    fn description(&self) -> &str {
        "Close the tab with the given id"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<TabIdArgs>()
    }

    fn needs_fresh_perception(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: TabIdArgs = parse_args(self.name(), args)?;
        browser
            .close_tab(args.tab_id)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(ActionResult::ok(format!("Closed tab {}", args.tab_id)))
    }
}
