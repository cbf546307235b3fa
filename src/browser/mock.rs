//! 内存浏览器（用于测试，无需 Chrome）
//!
//! 维护标签页、元素与输入值，记录每次调用，world_state 按 `[index]<label>` 输出元素列表。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::browser::{
    BrowserActuator, BrowserError, PerceptionProvider, ScrollDirection, TabInfo, WorldState,
};

#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub label: String,
    /// 点击后跳转的地址
    pub href: Option<String>,
    /// 下拉框选项
    pub options: Vec<String>,
}

impl MockElement {
    pub fn button(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }

    pub fn link(label: &str, href: &str) -> Self {
        Self {
            label: label.to_string(),
            href: Some(href.to_string()),
            ..Default::default()
        }
    }

    pub fn select(label: &str, options: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
struct MockTab {
    id: u32,
    history: Vec<String>,
}

impl MockTab {
    fn url(&self) -> String {
        self.history.last().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct MockState {
    tabs: Vec<MockTab>,
    active: u32,
    next_tab_id: u32,
    elements: BTreeMap<usize, MockElement>,
    inputs: HashMap<usize, String>,
    page_text: String,
    calls: Vec<String>,
    perception_error: Option<String>,
}

impl MockState {
    fn active_tab(&mut self) -> Result<&mut MockTab, BrowserError> {
        let active = self.active;
        self.tabs
            .iter_mut()
            .find(|t| t.id == active)
            .ok_or(BrowserError::TabNotFound(active))
    }
}

#[derive(Debug, Default)]
pub struct MockBrowser {
    state: Mutex<MockState>,
}

impl MockBrowser {
    pub fn new(url: &str) -> Self {
        let state = MockState {
            tabs: vec![MockTab {
                id: 1,
                history: vec![url.to_string()],
            }],
            active: 1,
            next_tab_id: 2,
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_element(self, index: usize, element: MockElement) -> Self {
        self.lock().elements.insert(index, element);
        self
    }

    pub fn with_page_text(self, text: &str) -> Self {
        self.lock().page_text = text.to_string();
        self
    }

    /// 之后每次 world_state 都返回该错误
    pub fn fail_perception(&self, message: &str) {
        self.lock().perception_error = Some(message.to_string());
    }

    /// 已执行的调用，如 `click:3`、`navigate:https://...`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn input_value(&self, index: usize) -> Option<String> {
        self.lock().inputs.get(&index).cloned()
    }

    pub fn current_url(&self) -> String {
        let mut state = self.lock();
        let url = state.active_tab().map(|t| t.url()).unwrap_or_default();
        url
    }
}

#[async_trait]
impl PerceptionProvider for MockBrowser {
    async fn world_state(&self, use_vision: bool) -> Result<WorldState, BrowserError> {
        let mut state = self.lock();
        if let Some(msg) = &state.perception_error {
            return Err(BrowserError::Other(msg.clone()));
        }
        let url = state.active_tab()?.url();
        let mut lines: Vec<String> = state
            .elements
            .iter()
            .map(|(idx, el)| format!("[{idx}]<{}>", el.label))
            .collect();
        if !state.page_text.is_empty() {
            lines.push(state.page_text.clone());
        }
        let tabs = state
            .tabs
            .iter()
            .map(|t| TabInfo {
                id: t.id,
                url: t.url(),
                title: format!("Tab {}", t.id),
            })
            .collect();
        Ok(WorldState {
            title: format!("Mock page: {url}"),
            url,
            summary_text: lines.join("\n"),
            tabs,
            screenshot: use_vision.then(|| "data:image/png;base64,AAAA".to_string()),
        })
    }
}

#[async_trait]
impl BrowserActuator for MockBrowser {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(BrowserError::Navigation(format!("invalid url: {url}")));
        }
        let mut state = self.lock();
        state.calls.push(format!("navigate:{url}"));
        state.active_tab()?.history.push(url.to_string());
        Ok(())
    }

    async fn go_back(&self) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.calls.push("go_back".to_string());
        let tab = state.active_tab()?;
        if tab.history.len() > 1 {
            tab.history.pop();
        }
        Ok(())
    }

    async fn click_element(&self, index: usize) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let element = state
            .elements
            .get(&index)
            .cloned()
            .ok_or(BrowserError::ElementNotFound(index))?;
        state.calls.push(format!("click:{index}"));
        if let Some(href) = element.href {
            state.active_tab()?.history.push(href);
        }
        Ok(())
    }

    async fn input_text(&self, index: usize, text: &str) -> Result<(), BrowserError> {
        let mut state = self.lock();
        if !state.elements.contains_key(&index) {
            return Err(BrowserError::ElementNotFound(index));
        }
        state.calls.push(format!("input:{index}"));
        state.inputs.insert(index, text.to_string());
        Ok(())
    }

    async fn scroll(
        &self,
        direction: ScrollDirection,
        amount: Option<u32>,
    ) -> Result<(), BrowserError> {
        let dir = match direction {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        };
        let amount = amount.map(|a| a.to_string()).unwrap_or_else(|| "page".into());
        self.lock().calls.push(format!("scroll_{dir}:{amount}"));
        Ok(())
    }

    async fn scroll_to_text(&self, text: &str) -> Result<bool, BrowserError> {
        let mut state = self.lock();
        state.calls.push(format!("scroll_to_text:{text}"));
        let found = state.page_text.contains(text)
            || state.elements.values().any(|e| e.label.contains(text));
        Ok(found)
    }

    async fn send_keys(&self, keys: &str) -> Result<(), BrowserError> {
        self.lock().calls.push(format!("keys:{keys}"));
        Ok(())
    }

    async fn switch_tab(&self, tab_id: u32) -> Result<(), BrowserError> {
        let mut state = self.lock();
        if !state.tabs.iter().any(|t| t.id == tab_id) {
            return Err(BrowserError::TabNotFound(tab_id));
        }
        state.calls.push(format!("switch_tab:{tab_id}"));
        state.active = tab_id;
        Ok(())
    }

    async fn open_tab(&self, url: &str) -> Result<u32, BrowserError> {
        let mut state = self.lock();
        let id = state.next_tab_id;
        state.next_tab_id += 1;
        state.tabs.push(MockTab {
            id,
            history: vec![url.to_string()],
        });
        state.active = id;
        state.calls.push(format!("open_tab:{url}"));
        Ok(id)
    }

    async fn close_tab(&self, tab_id: u32) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let pos = state
            .tabs
            .iter()
            .position(|t| t.id == tab_id)
            .ok_or(BrowserError::TabNotFound(tab_id))?;
        state.tabs.remove(pos);
        state.calls.push(format!("close_tab:{tab_id}"));
        if state.active == tab_id {
            state.active = state.tabs.first().map(|t| t.id).unwrap_or(0);
        }
        Ok(())
    }

    async fn dropdown_options(&self, index: usize) -> Result<Vec<String>, BrowserError> {
        let state = self.lock();
        state
            .elements
            .get(&index)
            .map(|e| e.options.clone())
            .ok_or(BrowserError::ElementNotFound(index))
    }

    async fn select_dropdown_option(&self, index: usize, text: &str) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let element = state
            .elements
            .get(&index)
            .cloned()
            .ok_or(BrowserError::ElementNotFound(index))?;
        if !element.options.iter().any(|o| o == text) {
            return Err(BrowserError::Other(format!(
                "option '{text}' not found in dropdown {index}"
            )));
        }
        state.calls.push(format!("select:{index}:{text}"));
        state.inputs.insert(index, text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_click_link_navigates() {
        let browser = MockBrowser::new("https://example.com")
            .with_element(1, MockElement::link("Docs", "https://example.com/docs"));
        browser.click_element(1).await.unwrap();
        assert_eq!(browser.current_url(), "https://example.com/docs");
        browser.go_back().await.unwrap();
        assert_eq!(browser.current_url(), "https://example.com");
    }

    #[tokio::test]
    async fn test_missing_element() {
        let browser = MockBrowser::new("https://example.com");
        assert_eq!(
            browser.click_element(9).await,
            Err(BrowserError::ElementNotFound(9))
        );
    }

    #[tokio::test]
    async fn test_world_state_lists_elements() {
        let browser = MockBrowser::new("https://example.com")
            .with_element(0, MockElement::button("Search"));
        let state = browser.world_state(true).await.unwrap();
        assert_eq!(state.url, "https://example.com");
        assert!(state.summary_text.contains("[0]<Search>"));
        assert!(state.screenshot.is_some());
        assert_eq!(state.tabs.len(), 1);
    }

    #[tokio::test]
    async fn test_tabs() {
        let browser = MockBrowser::new("https://a.example");
        let id = browser.open_tab("https://b.example").await.unwrap();
        assert_eq!(browser.current_url(), "https://b.example");
        browser.switch_tab(1).await.unwrap();
        browser.close_tab(id).await.unwrap();
        assert_eq!(browser.current_url(), "https://a.example");
        assert!(browser.switch_tab(id).await.is_err());
    }
}
