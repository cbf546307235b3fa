//! 浏览器协作方边界：感知（页面状态摘要）与执行（导航、点击、输入等）
//!
//! 真正的浏览器控制在运行时之外实现；这里只定义接口，外加一个内存实现 MockBrowser 供测试与演示。

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mock::{MockBrowser, MockElement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: u32,
    pub url: String,
    pub title: String,
}

/// 当前页面的文本（可选截图）描述，可直接拼入 prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub url: String,
    pub title: String,
    /// 扁平化后的可交互元素列表，如 `[3]<button>Search</button>`
    pub summary_text: String,
    #[serde(default)]
    pub tabs: Vec<TabInfo>,
    /// base64 data URL
    #[serde(default)]
    pub screenshot: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrowserError {
    #[error("element with index {0} does not exist")]
    ElementNotFound(usize),

    #[error("tab {0} does not exist")]
    TabNotFound(u32),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// 感知提供方
#[async_trait]
pub trait PerceptionProvider: Send + Sync {
    async fn world_state(&self, use_vision: bool) -> Result<WorldState, BrowserError>;
}

/// 浏览器执行方：只在已注册动作的 handler 中调用
#[async_trait]
pub trait BrowserActuator: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn go_back(&self) -> Result<(), BrowserError>;

    async fn click_element(&self, index: usize) -> Result<(), BrowserError>;

    async fn input_text(&self, index: usize, text: &str) -> Result<(), BrowserError>;

    /// amount 为像素；None 表示一屏
    async fn scroll(&self, direction: ScrollDirection, amount: Option<u32>)
        -> Result<(), BrowserError>;

    /// 返回是否找到文本
    async fn scroll_to_text(&self, text: &str) -> Result<bool, BrowserError>;

    async fn send_keys(&self, keys: &str) -> Result<(), BrowserError>;

    async fn switch_tab(&self, tab_id: u32) -> Result<(), BrowserError>;

    /// 返回新标签页 id
    async fn open_tab(&self, url: &str) -> Result<u32, BrowserError>;

    async fn close_tab(&self, tab_id: u32) -> Result<(), BrowserError>;

    async fn dropdown_options(&self, index: usize) -> Result<Vec<String>, BrowserError>;

    async fn select_dropdown_option(&self, index: usize, text: &str) -> Result<(), BrowserError>;
}
