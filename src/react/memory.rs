//! 上下文管理
//!
//! 包装 ConversationMemory：保证日志以一条 system + 一条任务消息开头，页面状态消息至多一条，
//! 写入前脱敏，取消息前先按 token 预算剪枝。

use std::sync::Arc;

use crate::memory::{ConversationMemory, Message, MessageContent, Redactor, Role, TokenEstimator};

#[derive(Clone, Debug)]
pub struct ContextManager {
    conversation: ConversationMemory,
    redactor: Arc<Redactor>,
}

impl ContextManager {
    pub fn new(max_input_tokens: usize, estimator: TokenEstimator) -> Self {
        Self {
            conversation: ConversationMemory::new(max_input_tokens, estimator),
            redactor: Arc::new(Redactor::default()),
        }
    }

    pub fn with_redactor(mut self, redactor: Arc<Redactor>) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn redactor(&self) -> &Arc<Redactor> {
        &self.redactor
    }

    /// 重置日志为 system + 任务
    pub fn init_task(&mut self, system_prompt: &str, task: &str) {
        self.conversation.clear();
        self.conversation
            .push(Role::System, MessageContent::Text(system_prompt.to_string()));
        self.push_redacted(Role::UserTask, task.into());
    }

    pub fn add_follow_up(&mut self, text: &str) {
        self.push_redacted(Role::UserFollowup, text.into());
    }

    /// 替换当前页面状态消息（至多一条）
    pub fn add_perception_snapshot(&mut self, content: MessageContent) {
        self.conversation.remove_role(Role::PerceptionSnapshot);
        self.push_redacted(Role::PerceptionSnapshot, content);
    }

    pub fn remove_perception_snapshot(&mut self) {
        self.conversation.remove_role(Role::PerceptionSnapshot);
    }

    pub fn has_perception_snapshot(&self) -> bool {
        self.conversation.count_role(Role::PerceptionSnapshot) > 0
    }

    pub fn add_assistant_message(&mut self, text: &str) {
        self.push_redacted(Role::AssistantReasoning, text.into());
    }

    /// 动作结果、步骤错误等补充信息
    pub fn add_side_information(&mut self, text: &str) {
        self.push_redacted(Role::SideInformation, text.into());
    }

    /// 先剪枝再返回有序消息
    pub fn get_messages(&mut self) -> &[Message] {
        self.conversation.prune();
        self.conversation.messages()
    }

    /// 不剪枝的只读视图
    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// 调用方显式截断历史（可移除 system / 任务消息）
    pub fn truncate_history(&mut self, keep: usize) {
        self.conversation.truncate(keep);
    }

    pub fn total_cost(&self) -> usize {
        self.conversation.total_cost()
    }

    pub fn len(&self) -> usize {
        self.conversation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversation.is_empty()
    }

    fn push_redacted(&mut self, role: Role, content: MessageContent) {
        let content = self.redactor.redact_content(content);
        self.conversation.push(role, content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn manager(budget: usize) -> ContextManager {
        let mut ctx = ContextManager::new(budget, TokenEstimator::default());
        ctx.init_task("system prompt", "find the cheapest flight");
        ctx
    }

    #[test]
    fn test_init_task_layout() {
        let mut ctx = manager(10_000);
        ctx.add_assistant_message("thinking");
        ctx.init_task("sys", "new task");
        let roles: Vec<Role> = ctx.messages().iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::System, Role::UserTask]);
    }

    #[test]
    fn test_single_perception_snapshot() {
        let mut ctx = manager(10_000);
        ctx.add_perception_snapshot("page one".into());
        ctx.add_perception_snapshot("page two".into());
        let snapshots: Vec<String> = ctx
            .messages()
            .iter()
            .filter(|m| m.role() == Role::PerceptionSnapshot)
            .map(|m| m.text())
            .collect();
        assert_eq!(snapshots, vec!["page two".to_string()]);
        ctx.remove_perception_snapshot();
        assert!(!ctx.has_perception_snapshot());
    }

    #[test]
    fn test_pruning_converges_and_keeps_head() {
        // 每条约 25 token
        let mut ctx = manager(120);
        for i in 0..20 {
            ctx.add_assistant_message(&format!("{i:02}{}", "x".repeat(98)));
        }
        let messages = ctx.get_messages().to_vec();
        let total: usize = messages.iter().map(|m| m.estimated_cost()).sum();
        assert!(total <= 120);
        assert_eq!(messages[0].role(), Role::System);
        assert_eq!(messages[1].role(), Role::UserTask);
        // 保留的是最新的消息
        assert!(messages.last().unwrap().text().starts_with("19"));
    }

    #[test]
    fn test_truncate_history_is_explicit() {
        let mut ctx = manager(10_000);
        ctx.truncate_history(0);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_redaction_applies_to_log() {
        let secrets = HashMap::from([("password".to_string(), "s3cr3t!".to_string())]);
        let mut ctx = ContextManager::new(10_000, TokenEstimator::default())
            .with_redactor(Arc::new(Redactor::new(&secrets)));
        ctx.init_task("sys", "log in with s3cr3t!");
        ctx.add_assistant_message("typing s3cr3t! now");
        for m in ctx.messages() {
            assert!(!m.text().contains("s3cr3t!"));
        }
        assert!(ctx.messages()[1].text().contains("<secret>password</secret>"));
    }
}
