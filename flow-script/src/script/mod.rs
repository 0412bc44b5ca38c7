//! # Script 模块
//!
//! 脚本文本的词法、语法与节点切分。
//!
//! ## 模块结构
//!
//! - [`token`]：Token 定义
//! - [`tokenizer`]：单 token 前瞻的字符扫描器
//! - [`parser`]：块级解析（Text / LazyExecution / EagerExecution / Separator）
//! - [`node_parser`]：对话条目与节点切分
//! - [`hash`]：确定性文本哈希

pub mod hash;
pub mod node_parser;
pub mod parser;
pub mod token;
pub mod tokenizer;

pub use node_parser::{
    HiddenNameMemo, NameDialogue, ParsedDialogueEntry, ParsedNode, parse_nodes,
    split_name_dialogue,
};
pub use parser::{Attributes, BlockType, ParsedBlock, parse_blocks, parse_chunks};
pub use token::{Token, TokenType};
pub use tokenizer::Tokenizer;
