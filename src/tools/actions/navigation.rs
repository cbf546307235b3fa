//! 导航类动作：search_google、go_to_url、go_back、wait

use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::browser::BrowserActuator;
use crate::core::AgentError;
use crate::tools::registry::actuation_error;
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Action, ActionResult};

/// wait 的默认与最大秒数
const DEFAULT_WAIT_SECS: u64 = 3;
const MAX_WAIT_SECS: u64 = 30;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchGoogleArgs {
    /// 搜索关键词
    pub query: String,
}

pub struct SearchGoogleAction;

#[async_trait]
impl Action for SearchGoogleAction {
    fn name(&self) -> &str {
        "search_google"
    }

    fn description(&self) -> &str {
        "Search the query in Google in the current tab; the query should be concrete, like a human would type it"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SearchGoogleArgs>()
    }

    fn needs_fresh_perception(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: SearchGoogleArgs = parse_args(self.name(), args)?;
        let url = format!(
            "https://www.google.com/search?q={}",
            urlencoding::encode(&args.query)
        );
        browser
            .navigate(&url)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(ActionResult::ok(format!("Searched for \"{}\" in Google", args.query)))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GoToUrlArgs {
    /// 完整地址，包含 http(s)://
    pub url: String,
}

pub struct GoToUrlAction;

#[async_trait]
impl Action for GoToUrlAction {
    fn name(&self) -> &str {
        "go_to_url"
    }

    fn description(&self) -> &str {
        "Navigate to the URL in the current tab"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<GoToUrlArgs>()
    }

    fn needs_fresh_perception(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: GoToUrlArgs = parse_args(self.name(), args)?;
        browser
            .navigate(&args.url)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(ActionResult::ok(format!("Navigated to {}", args.url)))
    }
}

pub struct GoBackAction;

#[async_trait]
impl Action for GoBackAction {
    fn name(&self) -> &str {
        "go_back"
    }

    fn description(&self) -> &str {
        "Go back to the previous page"
    }

    fn needs_fresh_perception(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        _args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        browser
            .go_back()
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(ActionResult::ok("Navigated back"))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WaitArgs {
    /// 等待秒数（默认 3，最多 30）
    #[serde(default)]
    pub seconds: Option<u64>,
}

pub struct WaitAction;

#[async_trait]
impl Action for WaitAction {
    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Wait for the page to load or change, default 3 seconds"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<WaitArgs>()
    }

    async fn execute(
        &self,
        args: Value,
        _browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: WaitArgs = parse_args(self.name(), args)?;
        let seconds = args.seconds.unwrap_or(DEFAULT_WAIT_SECS).min(MAX_WAIT_SECS);
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        Ok(ActionResult::transient(format!("Waited for {seconds} seconds")))
    }
}
