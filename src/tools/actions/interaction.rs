//! 元素交互：click_element、input_text、send_keys、下拉框

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
pub struct ClickElementArgs {
    /// 页面状态中元素的编号，如 [12] 对应 12
    pub index: usize,
}

pub struct ClickElementAction;

#[async_trait]
impl Action for ClickElementAction {
    fn name(&self) -> &str {
        "click_element"
    }

    fn description(&self) -> &str {
        "Click an interactive element by its index"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ClickElementArgs>()
    }

    fn needs_fresh_perception(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: ClickElementArgs = parse_args(self.name(), args)?;
        browser
            .click_element(args.index)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(ActionResult::ok(format!("Clicked element with index {}", args.index))
            .with_element(args.index))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InputTextArgs {
    /// 输入框编号
    pub index: usize,
    /// 要输入的文本；敏感值使用 <secret>名称</secret> 占位符
    pub text: String,
}

pub struct InputTextAction;

#[async_trait]
impl Action for InputTextAction {
    fn name(&self) -> &str {
        "input_text"
    }

    fn description(&self) -> &str {
        "Type text into an input element by its index"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<InputTextArgs>()
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: InputTextArgs = parse_args(self.name(), args)?;
        browser
            .input_text(args.index, &args.text)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(ActionResult::ok(format!("Input text into index {}", args.index))
            .with_element(args.index))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendKeysArgs {
    /// 按键序列，如 "Enter"、"Control+a"
    pub keys: String,
}

pub struct SendKeysAction;

#[async_trait]
impl Action for SendKeysAction {
    fn name(&self) -> &str {
        "send_keys"
    }

    fn description(&self) -> &str {
        "Send special keys or shortcuts such as Escape, Backspace, Enter, Control+o"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SendKeysArgs>()
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: SendKeysArgs = parse_args(self.name(), args)?;
        browser
            .send_keys(&args.keys)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(ActionResult::ok(format!("Sent keys: {}", args.keys)))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DropdownArgs {
    /// 下拉框编号
    pub index: usize,
}

pub struct GetDropdownOptionsAction;

#[async_trait]
impl Action for GetDropdownOptionsAction {
    fn name(&self) -> &str {
        "get_dropdown_options"
    }

    fn description(&self) -> &str {
        "Get all options of a native dropdown"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<DropdownArgs>()
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: DropdownArgs = parse_args(self.name(), args)?;
        let options = browser
            .dropdown_options(args.index)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        if options.is_empty() {
            return Ok(ActionResult::ok(format!(
                "No options found in dropdown {}",
                args.index
            )));
        }
        let listing: Vec<String> = options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{i}: text={o:?}"))
            .collect();
        Ok(ActionResult::ok(format!(
            "{}\nUse the exact text in select_dropdown_option",
            listing.join("\n")
        ))
        .with_element(args.index))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectDropdownOptionArgs {
    /// 下拉框编号
    pub index: usize,
    /// 选项的完整文本
    pub text: String,
}

pub struct SelectDropdownOptionAction;

#[async_trait]
impl Action for SelectDropdownOptionAction {
    fn name(&self) -> &str {
        "select_dropdown_option"
    }

    fn description(&self) -> &str {
        "Select a dropdown option by the exact text of the option"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SelectDropdownOptionArgs>()
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let args: SelectDropdownOptionArgs = parse_args(self.name(), args)?;
        browser
            .select_dropdown_option(args.index, &args.text)
            .await
            .map_err(|e| actuation_error(self.name(), e))?;
        Ok(
            ActionResult::ok(format!("Selected option \"{}\" in dropdown {}", args.text, args.index))
                .with_element(args.index),
        )
    }
}
