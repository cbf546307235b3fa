//! 敏感信息脱敏
//!
//! 写入消息日志前，把配置中的敏感字面量替换为 `<secret>名称</secret>` 占位符（仅文本，不处理图片）；
//! 执行动作前再把占位符还原为真实值，模型始终看不到明文。

use std::collections::HashMap;

use serde_json::Value;

use crate::memory::{ContentPart, MessageContent};

#[derive(Debug, Clone, Default)]
pub struct Redactor {
    /// (名称, 明文)，按明文长度降序，避免短值先匹配长值的一部分
    secrets: Vec<(String, String)>,
}

fn placeholder(name: &str) -> String {
    format!("<secret>{name}</secret>")
}

impl Redactor {
    pub fn new(secrets: &HashMap<String, String>) -> Self {
        let mut secrets: Vec<(String, String)> = secrets
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        secrets.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
        Self { secrets }
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (name, value) in &self.secrets {
            if out.contains(value.as_str()) {
                out = out.replace(value.as_str(), &placeholder(name));
            }
        }
        out
    }

    pub fn redact_content(&self, content: MessageContent) -> MessageContent {
        if self.is_empty() {
            return content;
        }
        match content {
            MessageContent::Text(s) => MessageContent::Text(self.redact(&s)),
            MessageContent::Parts(parts) => MessageContent::Parts(
                parts
                    .into_iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => ContentPart::Text {
                            text: self.redact(&text),
                        },
                        image => image,
                    })
                    .collect(),
            ),
        }
    }

    /// 把占位符还原为明文
    pub fn reveal(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (name, value) in &self.secrets {
            let ph = placeholder(name);
            if out.contains(&ph) {
                out = out.replace(&ph, value);
            }
        }
        out
    }

    /// 递归还原 JSON 参数中的字符串
    pub fn reveal_value(&self, value: Value) -> Value {
        if self.is_empty() {
            return value;
        }
        match value {
            Value::String(s) => Value::String(self.reveal(&s)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.reveal_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.reveal_value(v)))
                    .collect(),
            ),
            other => other,
        }
    }
}
