//! # Parser 模块
//!
//! 把单个脚本文件切分为有序的块序列（手写递归下降，无 regex 依赖）。
//!
//! ## 架构
//!
//! ```text
//! 原始文本 → Tokenizer → [块识别] → Vec<ParsedBlock> → [合并分隔符] → [切分 chunk]
//! ```
//!
//! ## 块的识别顺序
//!
//! 1. 一段空白直到换行/文件结尾：Separator（同时吃掉换行）
//! 2. `@`：EagerExecution 块，`<|` 前可带属性表
//! 3. `[`：带属性表的 LazyExecution 块
//! 4. `<|`：无属性的 LazyExecution 块
//! 5. 其余：到行尾为止的 Text 块
//!
//! ## 模块结构
//!
//! - `helpers`: 字符串反转义等辅助函数

mod helpers;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ParseError;

use super::token::TokenType;
use super::tokenizer::Tokenizer;

pub use helpers::{escape_string, unquote};

/// 属性表：键 → 可选的值
pub type Attributes = BTreeMap<String, Option<String>>;

/// 块类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockType {
    /// `@<| ... |>`，编译期执行
    EagerExecution,
    /// `<| ... |>`，运行时执行
    LazyExecution,
    /// 普通文本行
    Text,
    /// 空行
    Separator,
}

/// 解析得到的块
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedBlock {
    /// 起始行号（从 1 开始）
    pub line: usize,
    pub kind: BlockType,
    /// 块内容（代码块不含 `<|`、`|>`，已去掉 `\r`）
    pub content: String,
    /// 属性表，仅带 `[...]` 的代码块有
    pub attributes: Option<Attributes>,
}

impl ParsedBlock {
    pub fn new(
        line: usize,
        kind: BlockType,
        content: &str,
        attributes: Option<Attributes>,
    ) -> Self {
        Self {
            line,
            kind,
            content: content.replace('\r', ""),
            attributes,
        }
    }

    /// 是否为代码块（eager 或 lazy）
    pub fn is_code(&self) -> bool {
        matches!(
            self.kind,
            BlockType::EagerExecution | BlockType::LazyExecution
        )
    }
}

/// 解析脚本文本为块序列
///
/// 连续的 Separator 合并为一个，首尾的 Separator 被丢弃。
pub fn parse_blocks(text: &str) -> Result<Vec<ParsedBlock>, ParseError> {
    let mut tokenizer = Tokenizer::new(text);
    let mut blocks = Vec::new();
    while tokenizer.peek().kind != TokenType::EndOfFile {
        blocks.push(parse_block(&mut tokenizer)?);
    }
    Ok(merge_consecutive_separators(blocks))
}

/// 解析脚本文本并切分为 chunk
pub fn parse_chunks(text: &str) -> Result<Vec<Vec<ParsedBlock>>, ParseError> {
    Ok(split_blocks_to_chunks(parse_blocks(text)?))
}

/// 在 Separator 处、以及每个 EagerExecution 块前后切分
///
/// 每个 EagerExecution 块单独成为一个 chunk；每个 chunk 至少包含一个块。
pub fn split_blocks_to_chunks(blocks: Vec<ParsedBlock>) -> Vec<Vec<ParsedBlock>> {
    let mut chunks = Vec::new();
    let mut chunk = Vec::new();

    for block in blocks {
        match block.kind {
            BlockType::Separator => flush_chunk(&mut chunks, &mut chunk),
            BlockType::EagerExecution => {
                flush_chunk(&mut chunks, &mut chunk);
                chunks.push(vec![block]);
            }
            _ => chunk.push(block),
        }
    }

    flush_chunk(&mut chunks, &mut chunk);
    chunks
}

fn flush_chunk(chunks: &mut Vec<Vec<ParsedBlock>>, chunk: &mut Vec<ParsedBlock>) {
    if !chunk.is_empty() {
        chunks.push(std::mem::take(chunk));
    }
}

fn merge_consecutive_separators(blocks: Vec<ParsedBlock>) -> Vec<ParsedBlock> {
    let mut merged: Vec<ParsedBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        let is_separator = block.kind == BlockType::Separator;
        let last_is_separator = merged
            .last()
            .is_none_or(|last| last.kind == BlockType::Separator);
        // 开头的 Separator 也在这里被丢弃
        if is_separator && last_is_separator {
            continue;
        }
        merged.push(block);
    }

    if merged
        .last()
        .is_some_and(|last| last.kind == BlockType::Separator)
    {
        merged.pop();
    }
    merged
}

fn parse_block(tokenizer: &mut Tokenizer) -> Result<ParsedBlock, ParseError> {
    let start = tokenizer.peek().index;
    tokenizer.skip_whitespace();

    let token = tokenizer.peek();
    let line = token.line;

    match token.kind {
        TokenType::NewLine | TokenType::EndOfFile => {
            let content = tokenizer.substring(start, token.index);
            tokenizer.parse_next();
            Ok(ParsedBlock::new(line, BlockType::Separator, content, None))
        }
        TokenType::At => parse_eager_execution_block(tokenizer, line),
        TokenType::AttrStart => {
            parse_code_block_with_attributes(tokenizer, line, BlockType::LazyExecution)
        }
        TokenType::BlockStart => parse_code_block(tokenizer, line, BlockType::LazyExecution, None),
        _ => Ok(parse_text_block(tokenizer, line, start)),
    }
}

fn parse_text_block(tokenizer: &mut Tokenizer, line: usize, start: usize) -> ParsedBlock {
    while !matches!(
        tokenizer.peek().kind,
        TokenType::NewLine | TokenType::EndOfFile
    ) {
        tokenizer.parse_next();
    }

    let content = tokenizer.substring(start, tokenizer.peek().index);
    // 吃掉行尾换行
    tokenizer.parse_next();
    ParsedBlock::new(line, BlockType::Text, content, None)
}

fn parse_eager_execution_block(
    tokenizer: &mut Tokenizer,
    line: usize,
) -> Result<ParsedBlock, ParseError> {
    expect_token(tokenizer, TokenType::At, "@")?;
    tokenizer.parse_next();

    match tokenizer.peek().kind {
        TokenType::AttrStart => {
            parse_code_block_with_attributes(tokenizer, line, BlockType::EagerExecution)
        }
        TokenType::BlockStart => parse_code_block(tokenizer, line, BlockType::EagerExecution, None),
        _ => Err(tokenizer.unexpected(&tokenizer.peek(), "@ 之后的 [ 或 <|")),
    }
}

/// 解析 `<| ... |>`
///
/// 注释与字符串原样跳过，其中的 `|>` 不会结束代码块。
fn parse_code_block(
    tokenizer: &mut Tokenizer,
    line: usize,
    kind: BlockType,
    attributes: Option<Attributes>,
) -> Result<ParsedBlock, ParseError> {
    expect_token(tokenizer, TokenType::BlockStart, "<|")?;
    let start_token = tokenizer.peek();
    tokenizer.parse_next();

    let start = tokenizer.peek().index;
    let mut end = None;
    loop {
        let token = tokenizer.peek();
        match token.kind {
            TokenType::EndOfFile => break,
            TokenType::CommentStart => tokenizer.advance_comment()?,
            TokenType::Quote => tokenizer.advance_quoted(true)?,
            TokenType::BlockEnd => {
                end = Some(token.index);
                tokenizer.parse_next();
                break;
            }
            _ => tokenizer.parse_next(),
        }
    }

    let Some(end) = end else {
        return Err(ParseError::UnpairedBlockStart {
            line: start_token.line,
            column: start_token.column,
        });
    };
    let content = tokenizer.substring(start, end);

    tokenizer.skip_whitespace();
    let token = tokenizer.peek();
    if !matches!(token.kind, TokenType::NewLine | TokenType::EndOfFile) {
        return Err(tokenizer.unexpected(&token, "|> 之后的换行或文件结尾"));
    }
    tokenizer.parse_next();

    Ok(ParsedBlock::new(line, kind, content, attributes))
}

/// 解析 `[key=value, key2, 'key 3'="v"] <| ... |>`
fn parse_code_block_with_attributes(
    tokenizer: &mut Tokenizer,
    line: usize,
    kind: BlockType,
) -> Result<ParsedBlock, ParseError> {
    expect_token(tokenizer, TokenType::AttrStart, "[")?;
    tokenizer.parse_next();

    let mut attributes = Attributes::new();
    loop {
        tokenizer.skip_whitespace();
        if tokenizer.peek().kind == TokenType::AttrEnd {
            tokenizer.parse_next();
            break;
        }

        let key = expect_identifier_or_string(tokenizer)?;

        tokenizer.skip_whitespace();
        let value = if tokenizer.peek().kind == TokenType::Equal {
            tokenizer.parse_next();
            tokenizer.skip_whitespace();
            Some(expect_identifier_or_string(tokenizer)?)
        } else {
            None
        };

        tokenizer.skip_whitespace();
        let separator = tokenizer.peek();
        if !matches!(separator.kind, TokenType::Comma | TokenType::AttrEnd) {
            return Err(tokenizer.unexpected(&separator, ", 或 ]"));
        }
        tokenizer.parse_next();

        // 后出现的同名键覆盖前者
        attributes.insert(
            unquote(key.trim()),
            value.map(|value| unquote(value.trim())),
        );

        if separator.kind == TokenType::AttrEnd {
            break;
        }
    }

    parse_code_block(tokenizer, line, kind, Some(attributes))
}

fn expect_identifier_or_string<'a>(tokenizer: &mut Tokenizer<'a>) -> Result<&'a str, ParseError> {
    let token = tokenizer.peek();
    match token.kind {
        TokenType::Character => tokenizer.advance_identifier(),
        TokenType::Quote => tokenizer.advance_quoted(false)?,
        _ => return Err(tokenizer.unexpected(&token, "标识符或字符串")),
    }
    Ok(tokenizer.substring(token.index, tokenizer.peek().index))
}

fn expect_token(
    tokenizer: &Tokenizer,
    kind: TokenType,
    display: &str,
) -> Result<(), ParseError> {
    let token = tokenizer.peek();
    if token.kind != kind {
        return Err(tokenizer.unexpected(&token, display));
    }
    Ok(())
}
