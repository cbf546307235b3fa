//! 流式标记协议解析
//!
//! 模型输出由五种块组成：`[INITIAL_RESPONSE]`、`[THINKING]`、`[ACTION]`、`[QUESTION]`、`[FINAL_RESPONSE]`，
//! 每种以 `[/NAME]` 结束。块外文本原样作为 Token 透传；块内文本增量输出为 BlockContent。
//! 缓冲区末尾可能是标记前缀（`[` 加大写字母）的部分会被保留，直到标记完成或被否定，
//! 因此任意切分 chunk 得到的完整块事件都相同。
//!
//! 解析器只负责分类，不写入对话日志；哪些内容成为消息由 TaskExecutor 决定。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    InitialResponse,
    Thinking,
    Action,
    Question,
    FinalResponse,
}

impl BlockKind {
    pub const ALL: [BlockKind; 5] = [
        BlockKind::InitialResponse,
        BlockKind::Thinking,
        BlockKind::Action,
        BlockKind::Question,
        BlockKind::FinalResponse,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            BlockKind::InitialResponse => "INITIAL_RESPONSE",
            BlockKind::Thinking => "THINKING",
            BlockKind::Action => "ACTION",
            BlockKind::Question => "QUESTION",
            BlockKind::FinalResponse => "FINAL_RESPONSE",
        }
    }

    pub fn open_marker(&self) -> String {
        format!("[{}]", self.tag())
    }

    pub fn close_marker(&self) -> String {
        format!("[/{}]", self.tag())
    }
}

/// ACTION 块解析出的动作调用：`{"click_element": {"index": 3}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParserEvent {
    /// 块外文本
    Token(String),
    BlockStart(BlockKind),
    /// 块内增量文本；complete 为 true 的一次出现在块结束前
    BlockContent {
        kind: BlockKind,
        text: String,
        complete: bool,
    },
    BlockEnd {
        kind: BlockKind,
        content: String,
    },
    Action(ActionCall),
    Question(String),
    FinalResponse(String),
}

#[derive(Debug)]
struct OpenBlock {
    kind: BlockKind,
    content: String,
}

/// 扫描模式下的标记前缀
fn scan_holdback_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[A-Z_]*$").expect("scan holdback regex"))
}

/// 块内模式下的标记前缀（含结束标记的 `/`）
fn block_holdback_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[/?[A-Z_]*$").expect("block holdback regex"))
}

/// 最长标记 `[/FINAL_RESPONSE]` 的长度；更长的后缀不可能是标记前缀
fn max_marker_len() -> usize {
    BlockKind::ALL
        .iter()
        .map(|k| k.close_marker().len())
        .max()
        .unwrap_or(0)
}

/// 返回应保留的后缀起点（字节下标）
fn holdback_start(buffer: &str, re: &Regex) -> usize {
    match re.find(buffer) {
        Some(m) if m.as_str().len() <= max_marker_len() => m.start(),
        _ => buffer.len(),
    }
}

#[derive(Debug, Default)]
pub struct StreamParser {
    buffer: String,
    current: Option<OpenBlock>,
    raw: String,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入一段原始文本，返回本次可确定的事件
    pub fn process_chunk(&mut self, chunk: &str) -> Vec<ParserEvent> {
        self.raw.push_str(chunk);
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        self.drain(&mut events);
        events
    }

    /// 流结束：未闭合的块按完成处理，剩余缓冲作为 Token 输出
    pub fn end(&mut self) -> Vec<ParserEvent> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        match self.current.take() {
            Some(mut block) => {
                block.content.push_str(&rest);
                events.push(ParserEvent::BlockContent {
                    kind: block.kind,
                    text: rest,
                    complete: true,
                });
                Self::close_block(block, &mut events);
            }
            None => {
                if !rest.is_empty() {
                    events.push(ParserEvent::Token(rest));
                }
            }
        }
        events
    }

    /// 迄今输入的全部原始文本
    pub fn raw_content(&self) -> &str {
        &self.raw
    }

    pub fn in_block(&self) -> Option<BlockKind> {
        self.current.as_ref().map(|b| b.kind)
    }

    fn drain(&mut self, events: &mut Vec<ParserEvent>) {
        loop {
            match self.current.take() {
                None => {
                    let earliest = BlockKind::ALL
                        .iter()
                        .filter_map(|k| {
                            let marker = k.open_marker();
                            self.buffer.find(&marker).map(|pos| (pos, *k, marker.len()))
                        })
                        .min_by_key(|(pos, _, _)| *pos);

                    match earliest {
                        Some((pos, kind, marker_len)) => {
                            if pos > 0 {
                                events.push(ParserEvent::Token(self.buffer[..pos].to_string()));
                            }
                            self.buffer.drain(..pos + marker_len);
                            events.push(ParserEvent::BlockStart(kind));
                            self.current = Some(OpenBlock {
                                kind,
                                content: String::new(),
                            });
                        }
                        None => {
                            let hold = holdback_start(&self.buffer, scan_holdback_re());
                            if hold > 0 {
                                let text: String = self.buffer.drain(..hold).collect();
                                events.push(ParserEvent::Token(text));
                            }
                            return;
                        }
                    }
                }
                Some(mut block) => {
                    let closer = block.kind.close_marker();
                    match self.buffer.find(&closer) {
                        Some(pos) => {
                            let text: String = self.buffer.drain(..pos).collect();
                            self.buffer.drain(..closer.len());
                            block.content.push_str(&text);
                            events.push(ParserEvent::BlockContent {
                                kind: block.kind,
                                text,
                                complete: true,
                            });
                            Self::close_block(block, events);
                        }
                        None => {
                            let hold = holdback_start(&self.buffer, block_holdback_re());
                            if hold > 0 {
                                let text: String = self.buffer.drain(..hold).collect();
                                block.content.push_str(&text);
                                events.push(ParserEvent::BlockContent {
                                    kind: block.kind,
                                    text,
                                    complete: false,
                                });
                            }
                            self.current = Some(block);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn close_block(block: OpenBlock, events: &mut Vec<ParserEvent>) {
        let OpenBlock { kind, content } = block;
        events.push(ParserEvent::BlockEnd {
            kind,
            content: content.clone(),
        });
        match kind {
            BlockKind::Action => match parse_action(&content) {
                Ok(call) => events.push(ParserEvent::Action(call)),
                Err(e) => tracing::warn!(error = %e, "dropping malformed action block"),
            },
            BlockKind::Question => events.push(ParserEvent::Question(content.trim().to_string())),
            BlockKind::FinalResponse => {
                events.push(ParserEvent::FinalResponse(content.trim().to_string()))
            }
            BlockKind::InitialResponse | BlockKind::Thinking => {}
        }
    }
}

/// 去掉可能的 ``` / ```json 包裹
fn strip_code_fence(s: &str) -> &str {
    let s = s.trim();
    let Some(inner) = s.strip_prefix("```") else {
        return s;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// 解析 ACTION 块内容：必须是只有一个键的对象，值为参数对象（或 null）
pub fn parse_action(content: &str) -> Result<ActionCall, AgentError> {
    let payload = strip_code_fence(content);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| AgentError::ActionParse(format!("{e}: {}", preview(payload))))?;
    let Value::Object(map) = value else {
        return Err(AgentError::ActionParse(format!(
            "expected {{\"action_name\": {{...}}}}, got {}",
            preview(payload)
        )));
    };
    if map.len() != 1 {
        return Err(AgentError::ActionParse(format!(
            "expected exactly one action, got {}",
            map.len()
        )));
    }
    let Some((name, args)) = map.into_iter().next() else {
        return Err(AgentError::ActionParse("empty action payload".to_string()));
    };
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        obj @ Value::Object(_) => obj,
        other => {
            return Err(AgentError::ActionParse(format!(
                "arguments of '{name}' must be an object, got {other}"
            )))
        }
    };
    Ok(ActionCall { name, args })
}

fn preview(s: &str) -> String {
    const MAX: usize = 120;
    if s.chars().count() > MAX {
        format!("{}...", s.chars().take(MAX).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed(chunks: &[&str]) -> Vec<ParserEvent> {
        let mut parser = StreamParser::new();
        let mut events = Vec::new();
        for c in chunks {
            events.extend(parser.process_chunk(c));
        }
        events.extend(parser.end());
        events
    }

    fn block_ends(events: &[ParserEvent]) -> Vec<(BlockKind, String)> {
        events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::BlockEnd { kind, content } => Some((*kind, content.clone())),
                _ => None,
            })
            .collect()
    }

    fn tokens(events: &[ParserEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Token(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_split_markers() {
        let events = feed(&["[THI", "NKING]a", "b[/THINK", "ING]"]);
        assert_eq!(block_ends(&events), vec![(BlockKind::Thinking, "ab".to_string())]);
        assert!(tokens(&events).is_empty());
    }

    #[test]
    fn test_any_split_matches_single_chunk() {
        let text = "Sure. [THINKING]look at [3][/THINKING][ACTION]{\"click_element\": {\"index\": 3}}[/ACTION] bye";
        let whole = block_ends(&feed(&[text]));
        for size in 1..8 {
            let chars: Vec<char> = text.chars().collect();
            let pieces: Vec<String> = chars.chunks(size).map(|c| c.iter().collect()).collect();
            let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
            let events = feed(&refs);
            assert_eq!(block_ends(&events), whole, "chunk size {size}");
            assert_eq!(tokens(&events), "Sure.  bye");
        }
    }

    #[test]
    fn test_partial_marker_held_until_end() {
        let mut parser = StreamParser::new();
        let events = parser.process_chunk("hello [THI");
        assert_eq!(events, vec![ParserEvent::Token("hello ".to_string())]);
        let events = parser.end();
        assert_eq!(events, vec![ParserEvent::Token("[THI".to_string())]);
    }

    #[test]
    fn test_disproved_prefix_is_released() {
        let mut parser = StreamParser::new();
        assert_eq!(parser.process_chunk("see [TH"), vec![ParserEvent::Token("see ".into())]);
        assert_eq!(
            parser.process_chunk("e docs]"),
            vec![ParserEvent::Token("[The docs]".into())]
        );
    }

    #[test]
    fn test_block_content_is_incremental() {
        let mut parser = StreamParser::new();
        let mut events = parser.process_chunk("[FINAL_RESPONSE]Hel");
        events.extend(parser.process_chunk("lo[/FIN"));
        events.extend(parser.process_chunk("AL_RESPONSE]"));
        assert_eq!(
            events,
            vec![
                ParserEvent::BlockStart(BlockKind::FinalResponse),
                ParserEvent::BlockContent {
                    kind: BlockKind::FinalResponse,
                    text: "Hel".into(),
                    complete: false
                },
                ParserEvent::BlockContent {
                    kind: BlockKind::FinalResponse,
                    text: "lo".into(),
                    complete: false
                },
                ParserEvent::BlockContent {
                    kind: BlockKind::FinalResponse,
                    text: String::new(),
                    complete: true
                },
                ParserEvent::BlockEnd {
                    kind: BlockKind::FinalResponse,
                    content: "Hello".into()
                },
                ParserEvent::FinalResponse("Hello".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_block_closed_on_end() {
        let events = feed(&["[QUESTION]Which account?"]);
        assert!(events.contains(&ParserEvent::Question("Which account?".into())));
        assert_eq!(
            block_ends(&events),
            vec![(BlockKind::Question, "Which account?".to_string())]
        );
    }

    #[test]
    fn test_action_payload() {
        let events = feed(&["[ACTION]\n```json\n{\"go_to_url\": {\"url\": \"https://a.example\"}}\n```\n[/ACTION]"]);
        assert!(events.contains(&ParserEvent::Action(ActionCall {
            name: "go_to_url".into(),
            args: json!({"url": "https://a.example"}),
        })));
    }

    #[test]
    fn test_malformed_action_dropped() {
        let events = feed(&["[ACTION]not json[/ACTION][FINAL_RESPONSE]ok[/FINAL_RESPONSE]"]);
        assert!(!events.iter().any(|e| matches!(e, ParserEvent::Action(_))));
        assert!(events.contains(&ParserEvent::FinalResponse("ok".into())));
    }

    #[test]
    fn test_parse_action_shapes() {
        assert_eq!(parse_action("{\"go_back\": null}").unwrap().args, json!({}));
        assert!(parse_action("{\"a\": {}, \"b\": {}}").is_err());
        assert!(parse_action("{\"a\": 3}").is_err());
        assert!(parse_action("[1, 2]").is_err());
    }

    #[test]
    fn test_raw_content_accumulates() {
        let mut parser = StreamParser::new();
        parser.process_chunk("[THINKING]x");
        parser.process_chunk("[/THINKING]");
        assert_eq!(parser.raw_content(), "[THINKING]x[/THINKING]");
        assert_eq!(parser.in_block(), None);
    }

    #[test]
    fn test_bracket_inside_block_kept() {
        let events = feed(&["[THINKING]click [12] then [DONE][/THINKING]"]);
        assert_eq!(
            block_ends(&events),
            vec![(BlockKind::Thinking, "click [12] then [DONE]".to_string())]
        );
    }
}
