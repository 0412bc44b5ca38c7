//! # Directive 模块
//!
//! 内置的参考求值器：不执行任意代码，只识别 eager 块中的构建指令。
//!
//! ## 支持的指令
//!
//! | 指令 | 回调 |
//! |------|------|
//! | `label(name)` | `register_new_node`（本地化阶段为 `begin_add_locale_for_node`） |
//! | `jump_to(dest)` | `register_jump` |
//! | `branch(name, dest[, text[, mode[, condition]]])` | `register_branch` |
//! | `end_branch()` | `end_register_branch` |
//! | `is_start([name])` | `set_current_as_startup` |
//! | `is_unlocked_start([name])` | `set_current_as_unlocked_startup` |
//! | `is_default_start([name])` | `set_current_as_default_start` |
//! | `is_end([name])` | `set_current_as_end` |
//!
//! 调用可以写成 `f('a', "b")` 或 `f 'a'`；参数为字符串、`nil` 或标识符。
//! 其余代码（以及 `obj.label(...)` 这样的成员调用）一律忽略。

use tracing::debug;

use crate::error::{BuildError, BuildResult, ParseError};
use crate::flowchart::{BranchMode, BranchOptions, ConditionHandle};
use crate::script::hash::hash_str;
use crate::script::parser::unquote;
use crate::script::{TokenType, Tokenizer};

use super::evaluator::ScriptEvaluator;
use super::session::FlowChartBuilder;

const DIRECTIVES: &[&str] = &[
    "label",
    "jump_to",
    "branch",
    "end_branch",
    "is_start",
    "is_unlocked_start",
    "is_default_start",
    "is_end",
];

/// 指令参数
#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Str(String),
    Word(String),
}

impl Arg {
    fn as_value(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Word(w) if w == "nil" => None,
            Self::Word(w) => Some(w),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Call<'a> {
    name: &'a str,
    args: Vec<Arg>,
}

impl Call<'_> {
    fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Arg::as_value)
    }
}

/// 只识别构建指令的求值器
#[derive(Debug, Default)]
pub struct DirectiveEvaluator {
    file: String,
}

impl DirectiveEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, call: &Call, builder: &mut dyn FlowChartBuilder) -> BuildResult<()> {
        match call.name {
            "label" => {
                let name = call.arg(0).unwrap_or("");
                if builder.pass().is_structural() {
                    builder.register_new_node(name)
                } else {
                    builder.begin_add_locale_for_node(name)
                }
            }
            "jump_to" => builder.register_jump(call.arg(0)),
            "branch" => {
                let mode = match call.arg(3) {
                    Some(mode) => BranchMode::from_name(mode).ok_or_else(|| {
                        BuildError::Evaluator {
                            message: format!("{}: 未知的分支模式 '{}'", self.file, mode),
                        }
                    })?,
                    None => BranchMode::Normal,
                };
                let options = BranchOptions {
                    text: call.arg(2).map(str::to_string),
                    image: None,
                    mode,
                    condition: call.arg(4).map(|cond| ConditionHandle(hash_str(cond))),
                };
                builder.register_branch(call.arg(0).unwrap_or(""), call.arg(1), options)
            }
            "end_branch" => builder.end_register_branch(),
            "is_start" => builder.set_current_as_startup(call.arg(0)),
            "is_unlocked_start" => builder.set_current_as_unlocked_startup(call.arg(0)),
            "is_default_start" => builder.set_current_as_default_start(call.arg(0)),
            "is_end" => builder.set_current_as_end(call.arg(0)),
            _ => Ok(()),
        }
    }
}

impl ScriptEvaluator for DirectiveEvaluator {
    fn begin_file(&mut self, file: &str) -> BuildResult<()> {
        self.file = file.to_string();
        Ok(())
    }

    fn execute(
        &mut self,
        code: &str,
        line: usize,
        builder: &mut dyn FlowChartBuilder,
    ) -> BuildResult<()> {
        let calls = scan_calls(code).map_err(|e| BuildError::Evaluator {
            message: format!("{} 第 {} 行的 eager 块: {}", self.file, line, e),
        })?;
        for call in &calls {
            debug!(file = %self.file, line, directive = call.name, args = ?call.args, "执行指令");
            self.apply(call, builder)?;
        }
        Ok(())
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn first_char(tokenizer: &Tokenizer, kind: TokenType) -> Option<char> {
    let token = tokenizer.peek();
    if token.kind != kind {
        return None;
    }
    tokenizer.token_text(&token).chars().next()
}

/// 扫描代码中的指令调用
fn scan_calls(code: &str) -> Result<Vec<Call<'_>>, ParseError> {
    let mut tokenizer = Tokenizer::new(code);
    let mut calls = Vec::new();
    // 上一个非空白字符，用于排除 `obj.label(...)` / `obj:label(...)`
    let mut previous = None;

    loop {
        let token = tokenizer.peek();
        match token.kind {
            TokenType::EndOfFile => break,
            TokenType::WhiteSpace | TokenType::NewLine => tokenizer.parse_next(),
            TokenType::CommentStart => tokenizer.advance_comment()?,
            TokenType::Quote => {
                tokenizer.advance_quoted(true)?;
                previous = Some('"');
            }
            TokenType::Character
                if first_char(&tokenizer, TokenType::Character).is_some_and(is_ident_char) =>
            {
                let name = read_identifier(&mut tokenizer);
                let is_member = matches!(previous, Some('.' | ':'));
                previous = Some('a');
                if is_member || !DIRECTIVES.contains(&name) {
                    continue;
                }
                if let Some(args) = parse_args(&mut tokenizer)? {
                    calls.push(Call { name, args });
                }
            }
            _ => {
                previous = tokenizer.token_text(&token).chars().next();
                tokenizer.parse_next();
            }
        }
    }

    Ok(calls)
}

fn read_identifier<'a>(tokenizer: &mut Tokenizer<'a>) -> &'a str {
    let start = tokenizer.peek().index;
    while first_char(tokenizer, TokenType::Character).is_some_and(|c| is_ident_char(c) || c == '.')
    {
        tokenizer.parse_next();
    }
    tokenizer.substring(start, tokenizer.peek().index)
}

fn skip_blank(tokenizer: &mut Tokenizer) {
    while matches!(
        tokenizer.peek().kind,
        TokenType::WhiteSpace | TokenType::NewLine
    ) {
        tokenizer.parse_next();
    }
}

/// 读取字符串参数：单行字符串反转义，长括号字符串去掉括号
fn read_string(tokenizer: &mut Tokenizer) -> Result<String, ParseError> {
    let start = tokenizer.peek();
    let opener_len = start.length;
    tokenizer.advance_quoted(true)?;
    let raw = tokenizer.substring(start.index, tokenizer.peek().index);

    if raw.starts_with('[') {
        Ok(raw[opener_len..raw.len() - opener_len].to_string())
    } else {
        Ok(unquote(raw))
    }
}

/// 解析调用参数；后面不是 `(` 或字符串时不算调用
fn parse_args(tokenizer: &mut Tokenizer) -> Result<Option<Vec<Arg>>, ParseError> {
    tokenizer.skip_whitespace();
    match tokenizer.peek().kind {
        TokenType::Quote => return Ok(Some(vec![Arg::Str(read_string(tokenizer)?)])),
        TokenType::Character if first_char(tokenizer, TokenType::Character) == Some('(') => {
            tokenizer.parse_next();
        }
        _ => return Ok(None),
    }

    let mut args = Vec::new();
    loop {
        skip_blank(tokenizer);
        let token = tokenizer.peek();
        match token.kind {
            TokenType::Character if first_char(tokenizer, TokenType::Character) == Some(')') => {
                tokenizer.parse_next();
                return Ok(Some(args));
            }
            TokenType::Quote => args.push(Arg::Str(read_string(tokenizer)?)),
            TokenType::Character
                if first_char(tokenizer, TokenType::Character).is_some_and(is_ident_char) =>
            {
                args.push(Arg::Word(read_identifier(tokenizer).to_string()));
            }
            _ => return Err(tokenizer.unexpected(&token, "字符串、nil 或标识符")),
        }

        skip_blank(tokenizer);
        let token = tokenizer.peek();
        match token.kind {
            TokenType::Comma => tokenizer.parse_next(),
            TokenType::Character if first_char(tokenizer, TokenType::Character) == Some(')') => {}
            _ => return Err(tokenizer.unexpected(&token, ", 或 )")),
        }
    }
}
