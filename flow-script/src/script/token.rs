//! # Token 定义

use std::fmt;

/// Token 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// `<|`
    BlockStart,
    /// `|>`
    BlockEnd,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `[`
    AttrStart,
    /// `]`
    AttrEnd,
    /// `@`
    At,
    /// `=`
    Equal,
    /// `,`
    Comma,
    NewLine,
    /// `'`、`"` 或长括号开头 `[[`、`[=[`
    Quote,
    /// 其他任意单个字符，由调用方合并为标识符
    Character,
    WhiteSpace,
    /// `--`
    CommentStart,
    EndOfFile,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BlockStart => "<|",
            Self::BlockEnd => "|>",
            Self::LeftBrace => "{",
            Self::RightBrace => "}",
            Self::AttrStart => "[",
            Self::AttrEnd => "]",
            Self::At => "@",
            Self::Equal => "=",
            Self::Comma => ",",
            Self::NewLine => "换行",
            Self::Quote => "引号",
            Self::Character => "字符",
            Self::WhiteSpace => "空白",
            Self::CommentStart => "--",
            Self::EndOfFile => "文件结尾",
        };
        f.write_str(s)
    }
}

/// 词法单元
///
/// 只记录位置，不持有文本；内容通过 [`Tokenizer::token_text`](super::Tokenizer::token_text) 取得。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenType,
    /// 在源文本中的字节偏移
    pub index: usize,
    /// 字节长度
    pub length: usize,
    /// 行号（从 1 开始）
    pub line: usize,
    /// 列号（从 1 开始，按字符计）
    pub column: usize,
}

impl Token {
    /// token 结束处的字节偏移
    pub fn end(&self) -> usize {
        self.index + self.length
    }
}
