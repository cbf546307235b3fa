//! 短期记忆：按 token 预算计费的有序消息日志
//!
//! 每条消息在写入时估算 token 开销；getMessages 前按「最早加入先剪」剪枝，直到总开销回到预算以内。
//! system 与原始任务消息永远不会被隐式剪掉，只有调用方显式截断历史才会移除它们。

use serde::{Deserialize, Serialize};

use crate::memory::TokenEstimator;

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    UserTask,
    UserFollowup,
    /// 当前页面状态，至多一条，且只存活一个步骤
    PerceptionSnapshot,
    AssistantReasoning,
    /// 动作结果、错误反馈等附加上下文
    SideInformation,
}

/// 发送给 LLM API 时的角色（与 OpenAI 兼容接口一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn llm_role(&self) -> LlmRole {
        match self {
            Role::System => LlmRole::System,
            Role::AssistantReasoning => LlmRole::Assistant,
            _ => LlmRole::User,
        }
    }

    /// 剪枝时受保护的角色
    fn is_protected(&self) -> bool {
        matches!(self, Role::System | Role::UserTask | Role::PerceptionSnapshot)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// base64 data URL（截图）
    Image { data_url: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            MessageContent::Text(_) => 0,
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| matches!(p, ContentPart::Image { .. }))
                .count(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

/// 单条消息（写入后不可变）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: MessageContent,
    estimated_cost: usize,
}

impl Message {
    pub fn new(role: Role, content: impl Into<MessageContent>, estimated_cost: usize) -> Self {
        Self {
            role,
            content: content.into(),
            estimated_cost,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn estimated_cost(&self) -> usize {
        self.estimated_cost
    }
}

/// 有序消息日志 + token 计费 + 剪枝
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    estimator: TokenEstimator,
    max_input_tokens: usize,
}

impl ConversationMemory {
    pub fn new(max_input_tokens: usize, estimator: TokenEstimator) -> Self {
        Self {
            messages: Vec::new(),
            estimator,
            max_input_tokens,
        }
    }

    /// 估算开销后追加
    pub fn push(&mut self, role: Role, content: MessageContent) {
        let cost = self.estimator.estimate_content(&content);
        self.messages.push(Message::new(role, content, cost));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn total_cost(&self) -> usize {
        self.messages.iter().map(|m| m.estimated_cost).sum()
    }

    pub fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    /// 移除指定角色的全部消息，返回移除条数
    pub fn remove_role(&mut self, role: Role) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| m.role != role);
        before - self.messages.len()
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    /// 调用方显式截断：只保留前 keep 条（可以移除 system / 任务消息）
    pub fn truncate(&mut self, keep: usize) {
        self.messages.truncate(keep);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 剪枝：反复移除最早的可剪消息直到总开销不超过预算；迭代次数以消息条数为上限。
    /// 可剪消息删完仍超预算时，截断当前页面状态消息的文本。返回移除的消息条数。
    pub fn prune(&mut self) -> usize {
        let budget = self.max_input_tokens;
        let mut total = self.total_cost();
        let max_iterations = self.messages.len();
        let mut removed = 0;

        while total > budget && removed < max_iterations {
            let Some(idx) = self.messages.iter().position(|m| !m.role.is_protected()) else {
                break;
            };
            let msg = self.messages.remove(idx);
            total = total.saturating_sub(msg.estimated_cost);
            removed += 1;
        }

        if removed > 0 {
            tracing::debug!(removed, total, budget, "pruned conversation");
        }

        if total > budget {
            self.shrink_perception_snapshot(total - budget);
            if self.total_cost() > budget {
                tracing::warn!(
                    total = self.total_cost(),
                    budget,
                    "context still over budget after pruning"
                );
            }
        }
        removed
    }

    /// 只截断文本部分；截图放得下就保留，放不下才丢弃
    fn shrink_perception_snapshot(&mut self, excess: usize) {
        let Some(idx) = self
            .messages
            .iter()
            .position(|m| m.role == Role::PerceptionSnapshot)
        else {
            return;
        };
        let old = &self.messages[idx];
        let allowed = old.estimated_cost.saturating_sub(excess);
        let images: Vec<ContentPart> = match &old.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| matches!(p, ContentPart::Image { .. }))
                .cloned()
                .collect(),
        };
        let image_cost = images.len() * self.estimator.image_cost();
        let keep_images = !images.is_empty() && allowed > image_cost;
        if !images.is_empty() && !keep_images {
            tracing::warn!(
                images = images.len(),
                image_cost,
                allowed,
                "dropped screenshot from perception snapshot"
            );
        }

        let text_budget = if keep_images {
            allowed - image_cost
        } else {
            allowed
        };
        let text = TokenEstimator::truncate_to_tokens(&old.text(), text_budget);
        let content = if keep_images {
            let mut parts = vec![ContentPart::Text { text }];
            parts.extend(images);
            MessageContent::Parts(parts)
        } else {
            MessageContent::Text(text)
        };
        let cost = self.estimator.estimate_content(&content);
        tracing::warn!(from = old.estimated_cost, to = cost, "truncated perception snapshot");
        self.messages[idx] = Message::new(Role::PerceptionSnapshot, content, cost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DEFAULT_IMAGE_TOKEN_COST;

    fn memory(budget: usize) -> ConversationMemory {
        ConversationMemory::new(budget, TokenEstimator::default())
    }

    #[test]
    fn test_push_estimates_cost() {
        let mut mem = memory(1000);
        mem.push(Role::System, "x".repeat(40).into());
        assert_eq!(mem.messages()[0].estimated_cost(), 10);
        assert_eq!(mem.total_cost(), 10);
    }

    #[test]
    fn test_prune_keeps_system_and_task() {
        let mut mem = memory(50);
        mem.push(Role::System, "s".repeat(40).into());
        mem.push(Role::UserTask, "t".repeat(40).into());
        for _ in 0..10 {
            mem.push(Role::AssistantReasoning, "a".repeat(40).into());
        }
        assert_eq!(mem.total_cost(), 120);

        let removed = mem.prune();
        assert!(mem.total_cost() <= 50);
        assert_eq!(removed, 7);
        assert_eq!(mem.messages()[0].role(), Role::System);
        assert_eq!(mem.messages()[1].role(), Role::UserTask);
    }

    #[test]
    fn test_prune_removes_oldest_first() {
        let mut mem = memory(30);
        mem.push(Role::System, "s".repeat(40).into());
        mem.push(Role::UserTask, "t".repeat(40).into());
        mem.push(Role::SideInformation, "old".repeat(10).into());
        mem.push(Role::AssistantReasoning, "n".repeat(30).into());
        mem.prune();
        assert_eq!(mem.len(), 3);
        assert_eq!(mem.messages()[2].role(), Role::AssistantReasoning);
    }

    #[test]
    fn test_prune_truncates_snapshot_when_nothing_left() {
        let mut mem = memory(60);
        mem.push(Role::System, "s".repeat(40).into());
        mem.push(Role::UserTask, "t".repeat(40).into());
        mem.push(Role::PerceptionSnapshot, "p".repeat(800).into());
        mem.prune();
        assert_eq!(mem.count_role(Role::PerceptionSnapshot), 1);
        assert!(mem.total_cost() <= 60);
    }

    fn snapshot_with_image(text_len: usize) -> MessageContent {
        MessageContent::Parts(vec![
            ContentPart::Text { text: "p".repeat(text_len) },
            ContentPart::Image { data_url: "data:image/png;base64,AAAA".into() },
        ])
    }

    #[test]
    fn test_snapshot_truncation_keeps_screenshot_when_it_fits() {
        let mut mem = memory(1000);
        mem.push(Role::System, "s".repeat(40).into());
        mem.push(Role::UserTask, "t".repeat(40).into());
        mem.push(Role::PerceptionSnapshot, snapshot_with_image(4000));
        assert_eq!(mem.total_cost(), 20 + 1000 + DEFAULT_IMAGE_TOKEN_COST);

        mem.prune();
        let snapshot = &mem.messages()[2];
        assert_eq!(snapshot.content().image_count(), 1);
        assert!(snapshot.text().len() < 4000);
        assert!(mem.total_cost() <= 1000);
    }

    #[test]
    fn test_snapshot_truncation_drops_screenshot_when_too_costly() {
        let mut mem = memory(500);
        mem.push(Role::System, "s".repeat(40).into());
        mem.push(Role::UserTask, "t".repeat(40).into());
        mem.push(Role::PerceptionSnapshot, snapshot_with_image(4000));

        mem.prune();
        let snapshot = &mem.messages()[2];
        assert_eq!(snapshot.content().image_count(), 0);
        assert!(mem.total_cost() <= 500);
    }

    #[test]
    fn test_prune_terminates_when_only_protected_remain() {
        let mut mem = memory(1);
        mem.push(Role::System, "s".repeat(400).into());
        mem.push(Role::UserTask, "t".repeat(400).into());
        assert_eq!(mem.prune(), 0);
        assert_eq!(mem.len(), 2);
    }

    #[test]
    fn test_explicit_truncate_can_remove_everything() {
        let mut mem = memory(100);
        mem.push(Role::System, "s".into());
        mem.push(Role::UserTask, "t".into());
        mem.truncate(0);
        assert!(mem.is_empty());
    }

    #[test]
    fn test_image_parts_text() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "page".into() },
            ContentPart::Image { data_url: "data:image/png;base64,AAAA".into() },
        ]);
        assert_eq!(content.text(), "page");
        assert_eq!(content.image_count(), 1);
    }
}
