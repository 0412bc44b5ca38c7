//! # Flow Script
//!
//! 互动小说剧本的编译核心：把作者写的脚本文本编译为冻结的流程图。
//!
//! ## 架构概述
//!
//! `flow-script` 是纯逻辑核心，不依赖任何 IO。
//! 脚本中的 eager 代码交给外部求值器执行，求值器通过 [`FlowChartBuilder`] 回调构建流程图：
//!
//! ```text
//! ScriptLoader                    ScriptEvaluator
//!   │                                  │
//!   │──── eager 代码 + builder ───────►│
//!   │◄─── register_new_node / ... ─────│
//!   │                                  │
//! ```
//!
//! ## 核心类型
//!
//! - [`ScriptLoader`]：编排一次完整构建
//! - [`FlowChartTree`]：编译产物
//! - [`FlowChartBuilder`]：求值器可调用的构建接口
//! - [`LoaderConfig`]：加载器配置
//!
//! ## 使用示例
//!
//! ```ignore
//! use flow_script::{DirectiveEvaluator, LoaderConfig, ScriptLoader, ScriptSources};
//!
//! let sources = ScriptSources::new().with_file("zh", "ch1", text);
//! let mut loader = ScriptLoader::new(LoaderConfig::default());
//! let tree = loader.init(&sources, &mut DirectiveEvaluator::new())?;
//! ```
//!
//! ## 模块结构
//!
//! - [`script`]：文本切分（块、对话条目、节点）
//! - [`flowchart`]：流程图数据结构
//! - [`builder`]：构建接口与加载器
//! - [`config`]：配置
//! - [`diagnostic`]：诊断
//! - [`error`]：错误类型定义

pub mod builder;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod flowchart;
pub mod script;

// 重导出核心类型
pub use builder::{
    BuildPass, DirectiveEvaluator, FLOWCHART_SCRIPT_ID, FlowChartBuilder, ScriptEvaluator,
    ScriptFile, ScriptLoader, ScriptSources,
};
pub use config::{ConfigError, LoaderConfig};
pub use diagnostic::{Diagnostic, DiagnosticLevel, DiagnosticResult, analyze_tree};
pub use error::{BuildError, BuildResult, ParseError, ScriptError, ScriptResult};
pub use flowchart::{
    Branch, BranchInformation, BranchMode, BranchOptions, DialogueEntry, FlowChartNode,
    FlowChartNodeType, FlowChartTree, NodeId,
};
pub use script::{ParsedNode, parse_nodes};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _config = LoaderConfig::default();
        let _sources = ScriptSources::new().with_file("zh", "ch1", "");
        let _loader = ScriptLoader::new(LoaderConfig::default());
        let _evaluator = DirectiveEvaluator::new();
        let _tree = FlowChartTree::new();
    }
}
