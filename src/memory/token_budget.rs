//! Token 估算
//!
//! 不使用精确分词器：按文本长度近似估算（英文约 4 字符/token，中文约 1.5 字符/token），
//! 每张图片再加固定开销。结果只用于预算控制，是有意为之的近似值。

use crate::memory::MessageContent;

/// 截断后追加的标记
const TRUNCATION_MARK: &str = "\n[truncated due to token budget]";

/// 默认单张截图的 token 开销
pub const DEFAULT_IMAGE_TOKEN_COST: usize = 800;

/// Token 估算器（简单的字符计数近似）
#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    image_cost: usize,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_TOKEN_COST)
    }
}

impl TokenEstimator {
    pub fn new(image_cost: usize) -> Self {
        Self { image_cost }
    }

    pub fn image_cost(&self) -> usize {
        self.image_cost
    }

    /// 估算文本的 token 数量
    pub fn estimate(text: &str) -> usize {
        let mut ascii_chars = 0;
        let mut non_ascii_chars = 0;

        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }

    /// 文本部分 + 每张图片的固定开销
    pub fn estimate_content(&self, content: &MessageContent) -> usize {
        Self::estimate(&content.text()) + content.image_count() * self.image_cost
    }

    /// 将文本截断到指定 token 数以内（保留开头部分并追加截断标记）
    pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
        let estimated = Self::estimate(text);
        if estimated <= max_tokens {
            return text.to_string();
        }

        let chars: Vec<char> = text.chars().collect();
        let ratio = max_tokens as f64 / estimated as f64;
        let mut target = (chars.len() as f64 * ratio * 0.9) as usize;

        loop {
            let head: String = chars.iter().take(target).collect();
            let candidate = format!("{}{}", head.trim_end(), TRUNCATION_MARK);
            if Self::estimate(&candidate) <= max_tokens || target == 0 {
                if target == 0 && Self::estimate(&candidate) > max_tokens {
                    return String::new();
                }
                return candidate;
            }
            target = target * 9 / 10;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ContentPart;

    #[test]
    fn test_token_estimator_english() {
        let text = "Hello, world! This is a test.";
        let tokens = TokenEstimator::estimate(text);
        assert!(tokens > 0);
        assert!(tokens < text.len());
    }

    #[test]
    fn test_token_estimator_chinese() {
        let text = "你好世界，这是一个测试。";
        let tokens = TokenEstimator::estimate(text);
        assert_eq!(tokens, 8);
    }

    #[test]
    fn test_image_surcharge() {
        let estimator = TokenEstimator::new(100);
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "abcdefgh".into() },
            ContentPart::Image { data_url: "data:image/png;base64,AA".into() },
        ]);
        assert_eq!(estimator.estimate_content(&content), 102);
    }

    #[test]
    fn test_truncate_fits_budget() {
        let text = "word ".repeat(400);
        let truncated = TokenEstimator::truncate_to_tokens(&text, 50);
        assert!(TokenEstimator::estimate(&truncated) <= 50);
        assert!(truncated.ends_with("[truncated due to token budget]"));
    }

    #[test]
    fn test_truncate_noop_when_short() {
        assert_eq!(TokenEstimator::truncate_to_tokens("short", 100), "short");
    }
}
