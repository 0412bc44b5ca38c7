//! # Tokenizer
//!
//! 单遍扫描器，只保留一个 token 的前瞻（[`Tokenizer::peek`]），原地推进。
//!
//! 所有字符级规则都在这里：
//!
//! - 单行字符串 `'...'` / `"..."`，遇到换行或文件结尾前未闭合即报错
//! - 长括号字符串 `[[...]]`、`[=[...]=]`，支持任意层级嵌套
//! - 行注释 `-- ...` 与块注释 `--[[ ... ]]`、`--[==[ ... ]==]`

use crate::error::ParseError;

use super::token::{Token, TokenType};

/// 脚本文本扫描器
pub struct Tokenizer<'a> {
    text: &'a str,
    /// 下一个未消费字符的字节偏移（位于 `next` 之后）
    index: usize,
    line: usize,
    column: usize,
    next: Token,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut tokenizer = Self {
            text,
            index: 0,
            line: 1,
            column: 1,
            next: Token {
                kind: TokenType::EndOfFile,
                index: 0,
                length: 0,
                line: 1,
                column: 1,
            },
        };
        tokenizer.parse_next();
        tokenizer
    }

    /// 当前前瞻 token
    pub fn peek(&self) -> Token {
        self.next
    }

    /// 源文本
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// 取源文本的一段（字节区间）
    pub fn substring(&self, start: usize, end: usize) -> &'a str {
        &self.text[start..end]
    }

    /// token 对应的文本
    pub fn token_text(&self, token: &Token) -> &'a str {
        &self.text[token.index..token.end()]
    }

    /// 消费当前 token，扫描下一个
    pub fn parse_next(&mut self) {
        let (kind, length) = self.classify(self.index);
        let token = Token {
            kind,
            index: self.index,
            length,
            line: self.line,
            column: self.column,
        };
        self.advance_to(self.index + length);
        self.next = token;
    }

    /// 跳过连续的空白 token（不含换行）
    pub fn skip_whitespace(&mut self) {
        while self.next.kind == TokenType::WhiteSpace {
            self.parse_next();
        }
    }

    /// 跳过连续的 Character token（即一个标识符）
    pub fn advance_identifier(&mut self) {
        while self.next.kind == TokenType::Character {
            self.parse_next();
        }
    }

    /// 跳过当前的字符串（当前 token 必须是 Quote）
    ///
    /// `allow_multiline` 为 false 时遇到长括号字符串报错。
    pub fn advance_quoted(&mut self, allow_multiline: bool) -> Result<(), ParseError> {
        let token = self.next;
        if token.kind != TokenType::Quote {
            return Err(self.unexpected(&token, "引号"));
        }

        let opener = self.token_text(&token);
        let end = match opener {
            "'" | "\"" => self.scan_single_line(&token, opener.as_bytes()[0])?,
            _ if allow_multiline => {
                let level = opener.len() - 2;
                self.scan_long_bracket(self.index, level)
                    .ok_or(ParseError::UnpairedMultilineString {
                        line: token.line,
                        column: token.column,
                    })?
            }
            _ => return Err(self.unexpected(&token, "单行字符串")),
        };

        self.advance_to(end);
        self.parse_next();
        Ok(())
    }

    /// 跳过当前注释（当前 token 必须是 CommentStart）
    pub fn advance_comment(&mut self) -> Result<(), ParseError> {
        let token = self.next;
        if token.kind != TokenType::CommentStart {
            return Err(self.unexpected(&token, "--"));
        }

        let rest = &self.text[self.index..];
        let end = match self.long_bracket_level(self.index) {
            Some(level) => {
                let closer = format!("]{}]", "=".repeat(level));
                let pos = rest
                    .find(&closer)
                    .ok_or(ParseError::UnpairedBlockComment {
                        line: token.line,
                        column: token.column,
                    })?;
                self.index + pos + closer.len()
            }
            // 行注释不吃掉换行
            None => self.index + rest.find('\n').unwrap_or(rest.len()),
        };

        self.advance_to(end);
        self.parse_next();
        Ok(())
    }

    /// 构造"期望 xxx"错误
    pub fn unexpected(&self, token: &Token, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            line: token.line,
            column: token.column,
            expected: expected.to_string(),
            found: token.kind.to_string(),
        }
    }

    //=========================================================================
    // 字符级扫描
    //=========================================================================

    fn char_at(&self, index: usize) -> Option<char> {
        self.text.get(index..)?.chars().next()
    }

    fn byte_at(&self, index: usize) -> Option<u8> {
        self.text.as_bytes().get(index).copied()
    }

    /// 推进到指定字节偏移，同时更新行列号
    fn advance_to(&mut self, end: usize) {
        for c in self.text[self.index..end].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.index = end;
    }

    /// `index` 处若是长括号开头 `[=*[`，返回 `=` 的个数
    fn long_bracket_level(&self, index: usize) -> Option<usize> {
        if self.byte_at(index)? != b'[' {
            return None;
        }
        let mut level = 0;
        while self.byte_at(index + 1 + level)? == b'=' {
            level += 1;
        }
        (self.byte_at(index + 1 + level)? == b'[').then_some(level)
    }

    /// `index` 处若是长括号结尾 `]=*]`，返回 `=` 的个数
    fn closing_bracket_level(&self, index: usize) -> Option<usize> {
        if self.byte_at(index)? != b']' {
            return None;
        }
        let mut level = 0;
        while self.byte_at(index + 1 + level)? == b'=' {
            level += 1;
        }
        (self.byte_at(index + 1 + level)? == b']').then_some(level)
    }

    /// 扫描单行字符串，返回闭合引号之后的字节偏移
    fn scan_single_line(&self, token: &Token, quote: u8) -> Result<usize, ParseError> {
        let mut escaped = false;
        for (offset, b) in self.text.as_bytes()[self.index..].iter().enumerate() {
            if *b == b'\n' {
                break;
            }
            if !escaped && *b == quote {
                return Ok(self.index + offset + 1);
            }
            escaped = !escaped && *b == b'\\';
        }
        Err(ParseError::UnpairedQuote {
            line: token.line,
            column: token.column,
        })
    }

    /// 从 `start` 开始扫描长括号字符串体，返回匹配结尾之后的字节偏移
    ///
    /// 内部出现的任意层级开括号必须先于外层结尾闭合。
    /// 尚未闭合的层级保存在显式栈中。
    fn scan_long_bracket(&self, start: usize, level: usize) -> Option<usize> {
        let mut open = vec![level];
        let mut i = start;
        while i < self.text.len() {
            if let Some(inner) = self.long_bracket_level(i) {
                open.push(inner);
                i += inner + 2;
                continue;
            }
            let current = *open.last()?;
            if self.closing_bracket_level(i) == Some(current) {
                open.pop();
                i += current + 2;
                if open.is_empty() {
                    return Some(i);
                }
                continue;
            }
            i += 1;
        }
        None
    }

    /// 判断 `index` 处的 token 类型与字节长度
    fn classify(&self, index: usize) -> (TokenType, usize) {
        let Some(c) = self.char_at(index) else {
            return (TokenType::EndOfFile, 0);
        };
        let next = self.char_at(index + c.len_utf8());

        match c {
            '\n' => (TokenType::NewLine, 1),
            c if c.is_whitespace() => (TokenType::WhiteSpace, c.len_utf8()),
            '@' => (TokenType::At, 1),
            ',' => (TokenType::Comma, 1),
            '=' => (TokenType::Equal, 1),
            '\'' | '"' => (TokenType::Quote, 1),
            '[' => match self.long_bracket_level(index) {
                Some(level) => (TokenType::Quote, level + 2),
                None => (TokenType::AttrStart, 1),
            },
            ']' => (TokenType::AttrEnd, 1),
            '<' if next == Some('|') => (TokenType::BlockStart, 2),
            '|' if next == Some('>') => (TokenType::BlockEnd, 2),
            '{' => (TokenType::LeftBrace, 1),
            '}' => (TokenType::RightBrace, 1),
            '-' if next == Some('-') => (TokenType::CommentStart, 2),
            c => (TokenType::Character, c.len_utf8()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenType> {
        let mut tokenizer = Tokenizer::new(text);
        let mut out = Vec::new();
        loop {
            let token = tokenizer.peek();
            out.push(token.kind);
            if token.kind == TokenType::EndOfFile {
                return out;
            }
            tokenizer.parse_next();
        }
    }

    #[test]
    fn test_multi_char_tokens() {
        use TokenType::*;
        assert_eq!(
            kinds("<|a|>--[x]@=,{}"),
            vec![
                BlockStart,
                Character,
                BlockEnd,
                CommentStart,
                AttrStart,
                Character,
                AttrEnd,
                At,
                Equal,
                Comma,
                LeftBrace,
                RightBrace,
                EndOfFile
            ]
        );
        assert_eq!(kinds("[[ [=["), vec![Quote, WhiteSpace, Quote, EndOfFile]);
        assert_eq!(kinds("<a|b-"), [vec![Character; 5], vec![EndOfFile]].concat());
    }

    #[test]
    fn test_position_tracking() {
        let mut tokenizer = Tokenizer::new("ab\n 对c");
        tokenizer.parse_next();
        tokenizer.parse_next();
        let newline = tokenizer.peek();
        assert_eq!((newline.kind, newline.line, newline.column), (TokenType::NewLine, 1, 3));
        tokenizer.parse_next();
        tokenizer.parse_next();
        let wide = tokenizer.peek();
        assert_eq!((wide.line, wide.column, wide.length), (2, 2, 3));
        assert_eq!(tokenizer.token_text(&wide), "对");
        tokenizer.parse_next();
        assert_eq!(tokenizer.peek().column, 3);
    }

    #[test]
    fn test_single_line_quote() {
        let mut tokenizer = Tokenizer::new(r#"'a\'b' x"#);
        tokenizer.advance_quoted(false).unwrap();
        assert_eq!(tokenizer.peek().index, 6);
        assert_eq!(tokenizer.peek().kind, TokenType::WhiteSpace);
    }

    #[test]
    fn test_unpaired_quote_at_newline() {
        let mut tokenizer = Tokenizer::new("x 'abc\ndef'");
        tokenizer.parse_next();
        tokenizer.parse_next();
        assert_eq!(
            tokenizer.advance_quoted(true),
            Err(ParseError::UnpairedQuote { line: 1, column: 3 })
        );

        let mut tokenizer = Tokenizer::new("\"abc");
        assert!(matches!(
            tokenizer.advance_quoted(true),
            Err(ParseError::UnpairedQuote { .. })
        ));
    }

    #[test]
    fn test_nested_long_bracket_is_one_token() {
        let text = "[=[ a [[ b ]] c ]] d ]=]!";
        let mut tokenizer = Tokenizer::new(text);
        let start = tokenizer.peek().index;
        tokenizer.advance_quoted(true).unwrap();
        let end = tokenizer.peek().index;
        assert_eq!(tokenizer.substring(start, end), "[=[ a [[ b ]] c ]] d ]=]");
        assert_eq!(tokenizer.peek().kind, TokenType::Character);
    }

    #[test]
    fn test_inner_opener_must_close_first() {
        // 内层 [=[ 吃掉了外层的 ]]，外层找不到结尾
        let mut tokenizer = Tokenizer::new("[[ [=[ ]] ]=]");
        assert_eq!(
            tokenizer.advance_quoted(true),
            Err(ParseError::UnpairedMultilineString { line: 1, column: 1 })
        );
    }

    #[test]
    fn test_deeply_nested_long_bracket() {
        let text = format!("{}x{}", "[[".repeat(50_000), "]]".repeat(50_000));
        let mut tokenizer = Tokenizer::new(&text);
        tokenizer.advance_quoted(true).unwrap();
        assert_eq!(tokenizer.peek().kind, TokenType::EndOfFile);

        let input = "[[".repeat(100_000);
        let mut tokenizer = Tokenizer::new(&input);
        assert_eq!(
            tokenizer.advance_quoted(true),
            Err(ParseError::UnpairedMultilineString { line: 1, column: 1 })
        );
    }

    #[test]
    fn test_multiline_quote_not_allowed() {
        let mut tokenizer = Tokenizer::new("[[x]]");
        assert!(matches!(
            tokenizer.advance_quoted(false),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_line_comment_keeps_newline() {
        let mut tokenizer = Tokenizer::new("-- hi |>\nx");
        tokenizer.advance_comment().unwrap();
        assert_eq!(tokenizer.peek().kind, TokenType::NewLine);
    }

    #[test]
    fn test_block_comment() {
        let mut tokenizer = Tokenizer::new("--[==[ a ]] \n ]=] ]==]x");
        tokenizer.advance_comment().unwrap();
        let token = tokenizer.peek();
        assert_eq!(tokenizer.token_text(&token), "x");
        assert_eq!(token.line, 2);

        let mut tokenizer = Tokenizer::new("--[[ never closed");
        assert_eq!(
            tokenizer.advance_comment(),
            Err(ParseError::UnpairedBlockComment { line: 1, column: 1 })
        );
    }
}
