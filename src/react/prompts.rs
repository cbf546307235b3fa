//! 提示词：system prompt（由注册表与标记协议生成）与每步的页面状态消息

use crate::browser::WorldState;
use crate::memory::{ContentPart, MessageContent};
use crate::react::parser::BlockKind;
use crate::tools::{ActionRegistry, ActionResult};

const SYSTEM_PROMPT_HEAD: &str = r#"You are a browser automation agent. You work step by step: each step you receive the current page state, reason about it, and choose actions from the list below.

Interactive elements are listed as [index]<element>. Only elements with an index can be interacted with.

Sensitive values are shown as <secret>name</secret>. Use the placeholder as-is in action arguments; never ask for the real value."#;

/// 根据已注册动作生成 system prompt
pub fn build_system_prompt(registry: &ActionRegistry) -> String {
    let blocks: Vec<String> = BlockKind::ALL
        .iter()
        .map(|k| format!("{}...{}", k.open_marker(), k.close_marker()))
        .collect();
    format!(
        r#"{head}

# Response format
Wrap every part of your answer in one of these blocks:
{blocks}

- [THINKING] evaluate the previous action, note what you have learned and plan the next move.
- [ACTION] exactly one action as JSON: {{"action_name": {{...arguments}}}}. Use one [ACTION] block per action; they run in order.
- [QUESTION] ask the user when you cannot continue without their input. The task pauses until they answer.
- [FINAL_RESPONSE] the answer for the user, only when no further action is needed.
- Call "done" when the task is complete, with the full answer in "text".

# Available actions
{actions}
"#,
        head = SYSTEM_PROMPT_HEAD,
        blocks = blocks.join("\n"),
        actions = registry.to_schema_json(),
    )
}

/// 单个动作结果在上下文中的文本
pub fn describe_result(result: &ActionResult) -> Option<String> {
    if let Some(err) = &result.error {
        return Some(format!("Action error: {err}"));
    }
    result
        .extracted_content
        .as_ref()
        .map(|c| format!("Action result: {c}"))
}

/// 页面状态消息：步骤信息、当前时间、标签页、仅本步可见的动作结果、元素列表，开启视觉时附截图
pub fn build_perception_snapshot(
    state: &WorldState,
    step: usize,
    max_steps: usize,
    transient_results: &[ActionResult],
    use_vision: bool,
) -> MessageContent {
    let mut text = format!(
        "[Step {} of {}] Current date and time: {}\n",
        step + 1,
        max_steps,
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    );
    text.push_str(&format!("Current url: {}\nTitle: {}\n", state.url, state.title));
    if !state.tabs.is_empty() {
        text.push_str("Available tabs:\n");
        for tab in &state.tabs {
            text.push_str(&format!("  - id={} url={} title={}\n", tab.id, tab.url, tab.title));
        }
    }
    let notes: Vec<String> = transient_results.iter().filter_map(describe_result).collect();
    if !notes.is_empty() {
        text.push_str("Previous step:\n");
        for n in notes {
            text.push_str(&format!("  {n}\n"));
        }
    }
    text.push_str("Interactive elements:\n");
    if state.summary_text.trim().is_empty() {
        text.push_str("(empty page)");
    } else {
        text.push_str(&state.summary_text);
    }

    match (&state.screenshot, use_vision) {
        (Some(data_url), true) => MessageContent::Parts(vec![
            ContentPart::Text { text },
            ContentPart::Image {
                data_url: data_url.clone(),
            },
        ]),
        _ => MessageContent::Text(text),
    }
}
