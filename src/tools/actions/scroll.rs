//! 滚动：scroll_down、scroll_up、scroll_to_text

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::browser::{BrowserActuator, ScrollDirection};
use crate::core::AgentError;
use crate::tools::registry::actuation_error;
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Action, ActionResult};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScrollArgs {
    /// 滚动像素；不填则滚动一屏
    #[serde(default)]
    pub amount: Option<u32>,
}

/// scroll_down / scroll_up 共用实现
pub struct ScrollAction {
    direction: ScrollDirection,
}

impl ScrollAction {
    pub fn down() -> Self {
        Self {
            direction: ScrollDirection::Down,
        }
    }

    pub fn up() -> Self {
        Self {
            direction: ScrollDirection::Up,
        }
    }
}

#[async_trait]
impl Action for ScrollAction {
    fn name(&self) -> &str {
        match self.direction {
            ScrollDirection::Down => "scroll_down",
            ScrollDirection::Up => "scroll_up",
        }
    }

    fn description(&self) -> &str {
        match self.direction {
            ScrollDirection::Down => "Scroll down the page by pixel amount, or one page if not given",
            ScrollDirection::Up => "Scroll up the page by pixel amount, or one page if not given",
        }
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ScrollArgs>()
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: ScrollArgs = parse_args(self.name(), args)?;
        browser
            .scroll(self.direction, args.amount)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        let amount = args
            .amount
            .map(|a| format!("{a} pixels"))
            .unwrap_or_else(|| "one page".to_string());
        let verb = match self.direction {
            ScrollDirection::Down => "down",
            ScrollDirection::Up => "up",
        };
        Ok(ActionResult::ok(format!("Scrolled {verb} the page by {amount}")))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScrollToTextArgs {
    /// 要滚动到的可见文本
    pub text: String,
}

pub struct ScrollToTextAction;

#[async_trait]
impl Action for ScrollToTextAction {
    fn name(&self) -> &str {
        "scroll_to_text"
    }

    fn description(&self) -> &str {
        "Scroll to the first occurrence of the given text on the page"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ScrollToTextArgs>()
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: ScrollToTextArgs = parse_args(self.name(), args)?;
        let found = browser
            .scroll_to_text(&args.text)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        let msg = if found {
            format!("Scrolled to text: {}", args.text)
        } else {
            format!("Text '{}' not found or not visible on page", args.text)
        };
        Ok(ActionResult::ok(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowser;
    use serde_json::json;

    #[tokio::test]
    async fn test_scroll_names_and_calls() {
        let browser = MockBrowser::new("https://example.com");
        assert_eq!(ScrollAction::down().name(), "scroll_down");
        assert_eq!(ScrollAction::up().name(), "scroll_up");
        ScrollAction::down()
            .execute(json!({"amount": 300}), &browser)
            .await
            .unwrap();
        ScrollAction::up().execute(Value::Null, &browser).await.unwrap();
        assert_eq!(browser.calls(), vec!["scroll_down:300", "scroll_up:page"]);
    }

    #[tokio::test]
    async fn test_scroll_to_missing_text() {
        let browser = MockBrowser::new("https://example.com").with_page_text("Welcome");
        let result = ScrollToTextAction
            .execute(json!({"text": "Pricing"}), &browser)
            .await
            .unwrap();
        assert!(result.extracted_content.unwrap().contains("not found"));
    }
}
