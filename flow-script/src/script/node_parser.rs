//! # NodeParser
//!
//! 把 Parser 输出的块序列归约为对话条目与节点记录。
//!
//! ## 流程
//!
//! ```text
//! Vec<ParsedBlock> → [chunk 切分] → 对话 chunk → ParsedDialogueEntry
//!                                  → eager chunk → 节点边界（label）
//! ```
//!
//! 对话文本格式为 `显示名(//角色名)?::台词`，分隔符可以是 `::` 或全角 `：：`。

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{BuildError, ScriptResult};

use super::parser::{BlockType, ParsedBlock, parse_chunks};

/// 解析得到的对话条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedDialogueEntry {
    /// chunk 起始行号
    pub line: usize,
    /// 内部角色名（隐藏名）
    pub character_name: String,
    /// 显示名
    pub display_name: String,
    /// 台词
    pub dialogue: String,
    /// 附带的 lazy 代码块
    pub code_blocks: Vec<ParsedBlock>,
}

/// 解析得到的节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedNode {
    pub name: String,
    pub dialogue_entries: Vec<ParsedDialogueEntry>,
    /// 带 label 的起始 eager 块
    pub head_eager_block: ParsedBlock,
    /// 不带 label、结束本节点的 eager 块
    pub tail_eager_block: Option<ParsedBlock>,
}

/// 拆分后的名字与台词（未经过隐藏名推断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameDialogue<'a> {
    pub display_name: &'a str,
    pub hidden_name: &'a str,
    pub dialogue: &'a str,
}

/// 每个节点内的隐藏名记忆表：显示名 → 最近一次使用的隐藏名
///
/// 新节点开始时清空。
#[derive(Debug, Clone, Default)]
pub struct HiddenNameMemo {
    names: HashMap<String, String>,
}

impl HiddenNameMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// 推断隐藏名，显式给出的隐藏名会更新记忆表
    pub fn resolve(&mut self, display_name: &str, hidden_name: &str) -> String {
        if !hidden_name.is_empty() {
            if !display_name.is_empty() {
                self.names
                    .insert(display_name.to_string(), hidden_name.to_string());
            }
            return hidden_name.to_string();
        }

        if display_name.is_empty() {
            return String::new();
        }

        self.names
            .get(display_name)
            .cloned()
            .unwrap_or_else(|| display_name.to_string())
    }
}

fn is_name_separator_char(c: char) -> bool {
    c == ':' || c == '：'
}

/// 拆分 `显示名(//隐藏名)?::台词`
///
/// 显示名中不能含 `/`、`:`、`：`，隐藏名中不能含 `:`、`：`；
/// 不匹配时名字为空，整段文本都是台词。
pub fn split_name_dialogue(text: &str) -> NameDialogue<'_> {
    let no_name = NameDialogue {
        display_name: "",
        hidden_name: "",
        dialogue: text,
    };

    // 名字部分不含冒号，所以分隔符一定在第一个冒号处
    let Some(colon) = text.find(is_name_separator_char) else {
        return no_name;
    };
    let rest = &text[colon..];
    let separator = if rest.starts_with("::") {
        "::"
    } else if rest.starts_with("：：") {
        "：："
    } else {
        return no_name;
    };

    let prefix = &text[..colon];
    let (display_name, hidden_name) = match prefix.find("//") {
        Some(pos) => (&prefix[..pos], &prefix[pos + 2..]),
        None => (prefix, ""),
    };
    if display_name.contains('/') {
        return no_name;
    }

    NameDialogue {
        display_name,
        hidden_name,
        dialogue: &rest[separator.len()..],
    }
}

/// 把 chunk 中所有 Text 块用换行连接
pub fn chunk_text(chunk: &[ParsedBlock]) -> String {
    chunk
        .iter()
        .filter(|block| block.kind == BlockType::Text)
        .map(|block| block.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 把一个对话 chunk 解析为对话条目
pub fn parse_dialogue_entry(chunk: &[ParsedBlock], memo: &mut HiddenNameMemo) -> ParsedDialogueEntry {
    let text = chunk_text(chunk);
    let parts = split_name_dialogue(&text);
    let character_name = memo.resolve(parts.display_name, parts.hidden_name);

    ParsedDialogueEntry {
        line: chunk.first().map_or(0, |block| block.line),
        character_name,
        display_name: parts.display_name.to_string(),
        dialogue: parts.dialogue.to_string(),
        code_blocks: chunk
            .iter()
            .filter(|block| block.kind == BlockType::LazyExecution)
            .cloned()
            .collect(),
    }
}

/// 从 eager 代码中提取 `label('name')` 的名字
///
/// 支持 `label 'a'`、`label("a")`、`label ( 'a' )` 等写法。
pub fn find_label_name(code: &str) -> Option<&str> {
    const KEYWORD: &str = "label";

    let mut search_from = 0;
    while let Some(pos) = code[search_from..].find(KEYWORD) {
        let start = search_from + pos;
        search_from = start + KEYWORD.len();

        let is_word_start = code[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        if !is_word_start {
            continue;
        }

        let rest = code[search_from..].trim_start();
        let rest = rest.strip_prefix('(').unwrap_or(rest).trim_start();
        let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') else {
            continue;
        };
        let body = &rest[1..];
        if let Some(end) = body.find(quote) {
            return Some(&body[..end]);
        }
    }
    None
}

/// 按 label 把 chunk 序列切分为节点
///
/// - 带 label 的 eager 块开启新节点，并结束当前节点
/// - 不带 label 的 eager 块作为当前节点的尾块结束它；没有打开的节点时报错
/// - 对话 chunk 归入当前节点，隐藏名记忆表在每个节点开始时清空
pub fn split_chunks_to_nodes(chunks: Vec<Vec<ParsedBlock>>) -> Result<Vec<ParsedNode>, BuildError> {
    let mut nodes = Vec::new();
    let mut current: Option<ParsedNode> = None;
    let mut memo = HiddenNameMemo::new();

    for chunk in chunks {
        let Some(first) = chunk.first() else {
            continue;
        };

        if first.kind != BlockType::EagerExecution {
            let Some(node) = current.as_mut() else {
                return Err(BuildError::DanglingText { line: first.line });
            };
            node.dialogue_entries
                .push(parse_dialogue_entry(&chunk, &mut memo));
            continue;
        }

        let Some(block) = chunk.into_iter().next() else {
            continue;
        };
        match find_label_name(&block.content).map(str::to_string) {
            Some(name) => {
                nodes.extend(current.take());
                memo.clear();
                current = Some(ParsedNode {
                    name,
                    dialogue_entries: Vec::new(),
                    head_eager_block: block,
                    tail_eager_block: None,
                });
            }
            None => {
                let Some(mut node) = current.take() else {
                    return Err(BuildError::UnmatchedTailEagerBlock { line: block.line });
                };
                node.tail_eager_block = Some(block);
                nodes.push(node);
            }
        }
    }

    nodes.extend(current);
    Ok(nodes)
}

/// 解析脚本文本为节点记录
pub fn parse_nodes(text: &str) -> ScriptResult<Vec<ParsedNode>> {
    let chunks = parse_chunks(text)?;
    Ok(split_chunks_to_nodes(chunks)?)
}
