//! 动作注册表
//!
//! 所有动作实现 Action trait（name / description / 参数 schema / execute），由 ActionRegistry 按名注册与查找。
//! 内置动作集合是封闭的 ActionKind 枚举，builtin() 在启动时校验每一种都已注册。
//! dispatch 负责：查找 -> schema 校验 -> 执行 handler -> 把 handler 错误转为 ActionResult。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::browser::{BrowserActuator, BrowserError};
use crate::core::AgentError;
use crate::memory::Redactor;
use crate::tools::schema::{self, ArgsValidator};
use crate::tools::actions;

/// 单个动作的结构化结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub is_done: bool,
    pub success: bool,
    /// 展示给用户 / 模型的内容
    pub extracted_content: Option<String>,
    pub error: Option<String>,
    /// 下一步是否作为消息重新注入
    pub include_in_memory: bool,
    pub interacted_element_id: Option<usize>,
}

impl ActionResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            extracted_content: Some(content.into()),
            include_in_memory: true,
            ..Default::default()
        }
    }

    /// 只在下一步的页面状态里出现一次，不写入长期消息日志
    pub fn transient(content: impl Into<String>) -> Self {
        Self {
            include_in_memory: false,
            ..Self::ok(content)
        }
    }

    pub fn done(text: impl Into<String>, success: bool) -> Self {
        Self {
            is_done: true,
            success,
            extracted_content: Some(text.into()),
            include_in_memory: true,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            include_in_memory: true,
            ..Default::default()
        }
    }

    /// 文本字段脱敏后的副本（写入历史、推送事件前使用）
    pub fn redacted(mut self, redactor: &Redactor) -> Self {
        if redactor.is_empty() {
            return self;
        }
        self.extracted_content = self.extracted_content.map(|c| redactor.redact(&c));
        self.error = self.error.map(|e| redactor.redact(&e));
        self
    }

    pub fn with_element(mut self, index: usize) -> Self {
        self.interacted_element_id = Some(index);
        self
    }
}

/// 动作 trait
#[async_trait]
pub trait Action: Send + Sync {
    /// 动作名（ACTION 块中的键）
    fn name(&self) -> &str;

    /// 动作描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        schema::empty_schema()
    }

    /// 执行后页面可能变化，同一步中剩余动作需要等新的页面状态
    fn needs_fresh_perception(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError>;
}

/// 内置动作种类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Done,
    SearchGoogle,
    GoToUrl,
    GoBack,
    Wait,
    ClickElement,
    InputText,
    SwitchTab,
    OpenTab,
    CloseTab,
    CacheContent,
    ScrollDown,
    ScrollUp,
    SendKeys,
    ScrollToText,
    GetDropdownOptions,
    SelectDropdownOption,
}

impl ActionKind {
    pub const ALL: [ActionKind; 17] = [
        ActionKind::Done,
        ActionKind::SearchGoogle,
        ActionKind::GoToUrl,
        ActionKind::GoBack,
        ActionKind::Wait,
        ActionKind::ClickElement,
        ActionKind::InputText,
        ActionKind::SwitchTab,
        ActionKind::OpenTab,
        ActionKind::CloseTab,
        ActionKind::CacheContent,
        ActionKind::ScrollDown,
        ActionKind::ScrollUp,
        ActionKind::SendKeys,
        ActionKind::ScrollToText,
        ActionKind::GetDropdownOptions,
        ActionKind::SelectDropdownOption,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Done => "done",
            ActionKind::SearchGoogle => "search_google",
            ActionKind::GoToUrl => "go_to_url",
            ActionKind::GoBack => "go_back",
            ActionKind::Wait => "wait",
            ActionKind::ClickElement => "click_element",
            ActionKind::InputText => "input_text",
            ActionKind::SwitchTab => "switch_tab",
            ActionKind::OpenTab => "open_tab",
            ActionKind::CloseTab => "close_tab",
            ActionKind::CacheContent => "cache_content",
            ActionKind::ScrollDown => "scroll_down",
            ActionKind::ScrollUp => "scroll_up",
            ActionKind::SendKeys => "send_keys",
            ActionKind::ScrollToText => "scroll_to_text",
            ActionKind::GetDropdownOptions => "get_dropdown_options",
            ActionKind::SelectDropdownOption => "select_dropdown_option",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

/// 浏览器错误包装为动作执行错误
pub(crate) fn actuation_error(action: &str, e: BrowserError) -> AgentError {
    AgentError::Actuation {
        action: action.to_string(),
        message: e.to_string(),
    }
}

/// 动作注册表：按名称存储 Arc<dyn Action> 及其编译好的参数校验器，保留注册顺序用于生成 prompt
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
    validators: HashMap<String, ArgsValidator>,
    order: Vec<String>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册全部内置动作并校验完整性
    pub fn builtin() -> Result<Self, AgentError> {
        let mut registry = Self::new();
        actions::register_builtin(&mut registry)?;
        registry.ensure_complete()?;
        Ok(registry)
    }

    /// 同名动作只能注册一次；参数 schema 在此编译，编译失败视为配置错误
    pub fn register(&mut self, action: impl Action + 'static) -> Result<(), AgentError> {
        let name = action.name().to_string();
        if self.actions.contains_key(&name) {
            return Err(AgentError::ConfigError(format!(
                "action '{name}' registered twice"
            )));
        }
        let validator = ArgsValidator::compile(&action.parameters_schema()).map_err(|e| {
            AgentError::ConfigError(format!("invalid parameter schema for '{name}': {e}"))
        })?;
        self.validators.insert(name.clone(), validator);
        self.order.push(name.clone());
        self.actions.insert(name, Arc::new(action));
        Ok(())
    }

    /// 每个内置 ActionKind 都必须有对应的注册项
    pub fn ensure_complete(&self) -> Result<(), AgentError> {
        let missing: Vec<&str> = ActionKind::ALL
            .iter()
            .map(|k| k.as_str())
            .filter(|name| !self.actions.contains_key(*name))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AgentError::ConfigError(format!(
                "built-in actions not registered: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn action_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn needs_fresh_perception(&self, name: &str) -> bool {
        self.actions
            .get(name)
            .map(|a| a.needs_fresh_perception())
            .unwrap_or(false)
    }

    /// 查找 + 校验 + 执行。未注册与参数错误作为可区分的错误返回；
    /// handler 的其他错误转为带 error 的 ActionResult（include_in_memory = true）。
    pub async fn try_dispatch(
        &self,
        name: &str,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> Result<ActionResult, AgentError> {
        let action = self
            .get(name)
            .ok_or_else(|| AgentError::UnregisteredAction(name.to_string()))?;

        if let Some(validator) = self.validators.get(name) {
            validator
                .validate(&args)
                .map_err(|message| AgentError::Validation {
                    action: name.to_string(),
                    message,
                })?;
        }

        match action.execute(args, browser).await {
            Ok(result) => Ok(result),
            // handler 内反序列化失败同样属于参数错误
            Err(e @ AgentError::Validation { .. }) => Err(e),
            Err(e) if e.propagates() => Err(e),
            Err(e) => Ok(ActionResult::error(e.to_string())),
        }
    }

    /// 总是返回 ActionResult：任何失败都变成 success = false 且带 error 的结果
    pub async fn dispatch(
        &self,
        name: &str,
        args: Value,
        browser: &dyn BrowserActuator,
    ) -> ActionResult {
        match self.try_dispatch(name, args, browser).await {
            Ok(result) => result,
            Err(e) => ActionResult::error(e.to_string()),
        }
    }

    /// 动态生成动作 schema JSON（注入 system prompt）
    pub fn to_schema_json(&self) -> String {
        let list: Vec<Value> = self
            .order
            .iter()
            .filter_map(|name| self.actions.get(name))
            .map(|action| {
                serde_json::json!({
                    "name": action.name(),
                    "description": action.description(),
                    "parameters": action.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&list).unwrap_or_else(|_| "[]".to_string())
    }
}
