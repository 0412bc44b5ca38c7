//! # 诊断模块
//!
//! 构建过程收集的诊断，以及对冻结流程图的静态检查。

use std::collections::VecDeque;
use std::fmt;

use crate::builder::FLOWCHART_SCRIPT_ID;
use crate::error::ScriptError;
use crate::flowchart::{FlowChartTree, NodeId};

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    /// 流程图结构上的提示，如不可达节点
    Info,
    /// 被忽略的文本、悬空边等可以继续构建的问题
    Warn,
    /// 使构建失败的错误
    Error,
}

impl DiagnosticLevel {
    fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// 脚本文件名，整张图的问题使用 [`FLOWCHART_SCRIPT_ID`]
    pub script_id: String,
    /// 从 1 开始的行号
    pub line: Option<usize>,
    pub message: String,
    /// 补充说明，如出问题的节点与分支
    pub detail: Option<String>,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, script_id: &str, message: String) -> Self {
        Self {
            level,
            script_id: script_id.to_string(),
            line: None,
            message,
            detail: None,
        }
    }

    pub(crate) fn warn(script_id: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warn, script_id, message.into())
    }

    pub(crate) fn info(script_id: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, script_id, message.into())
    }

    /// 把中断构建的错误记录为一条 Error 诊断
    ///
    /// 文件名与行号能从错误中取得时一并记录，否则归到整张流程图。
    pub fn from_error(error: &ScriptError) -> Self {
        let script_id = error.file().unwrap_or(FLOWCHART_SCRIPT_ID);
        Self {
            line: error.line(),
            ..Self::new(DiagnosticLevel::Error, script_id, error.root().to_string())
        }
    }

    pub(crate) fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub(crate) fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = self.level.label();
        match self.line {
            Some(line) => write!(f, "[{level}] {}:{line}: {}", self.script_id, self.message)?,
            None => write!(f, "[{level}] {}: {}", self.script_id, self.message)?,
        }
        match &self.detail {
            Some(detail) => write!(f, "\n  | {detail}"),
            None => Ok(()),
        }
    }
}

/// 一次构建收集到的全部诊断，按产生顺序排列
#[derive(Debug, Clone, Default)]
pub struct DiagnosticResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn merge(&mut self, other: DiagnosticResult) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// 指定级别的条目数
    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    pub fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    pub fn warn_count(&self) -> usize {
        self.count(DiagnosticLevel::Warn)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

//=============================================================================
// 流程图分析
//=============================================================================

/// 分析已构建的流程图
///
/// - 悬空边（跳转目标未定义）：Warn
/// - 从任何起始点都无法到达的节点：Info
pub fn analyze_tree(tree: &FlowChartTree) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();

    for (id, branch) in tree.dangling_branches() {
        result.push(
            Diagnostic::warn(
                FLOWCHART_SCRIPT_ID,
                format!("未定义的跳转目标: '{}'", branch.destination),
            )
            .with_detail(format!(
                "节点 '{}' 的分支 '{}'",
                tree.node(id).name(),
                branch.info.name()
            )),
        );
    }

    let reachable = reachable_nodes(tree);
    for (id, node) in tree.nodes() {
        if !reachable[id.index()] {
            result.push(Diagnostic::info(
                FLOWCHART_SCRIPT_ID,
                format!("节点 '{}' 无法从任何起始点到达", node.name()),
            ));
        }
    }

    result
}

/// 从所有起始点出发的广度优先遍历
fn reachable_nodes(tree: &FlowChartTree) -> Vec<bool> {
    let mut visited = vec![false; tree.len()];
    let mut queue: VecDeque<NodeId> = tree
        .startup_names()
        .into_iter()
        .filter_map(|name| tree.startup(name))
        .chain(
            tree.unlocked_startup_names()
                .into_iter()
                .filter_map(|name| tree.unlocked_startup(name)),
        )
        .collect();

    while let Some(id) = queue.pop_front() {
        if std::mem::replace(&mut visited[id.index()], true) {
            continue;
        }
        queue.extend(
            tree.node(id)
                .branches()
                .iter()
                .filter_map(|branch| branch.target),
        );
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::flowchart::BranchInformation;

    #[test]
    fn test_display_with_line_and_detail() {
        let diag = Diagnostic::warn("ch1", "未定义的跳转目标: 'missing'")
            .with_line(10)
            .with_detail("节点 'start' 的分支 '去看看'".to_string());

        assert_eq!(
            diag.to_string(),
            "[WARN] ch1:10: 未定义的跳转目标: 'missing'\n  | 节点 'start' 的分支 '去看看'"
        );
        assert_eq!(
            Diagnostic::info(FLOWCHART_SCRIPT_ID, "x").to_string(),
            "[INFO] <flowchart>: x"
        );
    }

    #[test]
    fn test_from_error_keeps_file_and_line() {
        let error = ScriptError::from(BuildError::DanglingText { line: 7 }).in_file("ch2");
        let diag = Diagnostic::from_error(&error);

        assert_eq!(diag.level, DiagnosticLevel::Error);
        assert_eq!(diag.script_id, "ch2");
        assert_eq!(diag.line, Some(7));
        assert_eq!(diag.message, "构建错误: 第 7 行：文本不属于任何节点");
    }

    #[test]
    fn test_from_error_without_file() {
        let error = ScriptError::from(BuildError::NoStartupNode);
        let diag = Diagnostic::from_error(&error);

        assert_eq!(diag.script_id, FLOWCHART_SCRIPT_ID);
        assert_eq!(diag.line, None);
    }

    #[test]
    fn test_result_counts_by_level() {
        let mut result = DiagnosticResult::new();
        result.push(Diagnostic::warn("a", "警告"));
        result.push(Diagnostic::info("a", "提示"));
        let mut other = DiagnosticResult::new();
        other.push(Diagnostic::from_error(&BuildError::NoStartupNode.into()));
        result.merge(other);

        assert_eq!(result.error_count(), 1);
        assert_eq!(result.warn_count(), 1);
        assert_eq!(result.count(DiagnosticLevel::Info), 1);
        assert_eq!(result.diagnostics.last().unwrap().level, DiagnosticLevel::Error);
    }

    fn chain_tree() -> FlowChartTree {
        // start -> middle -> (missing)，island 孤立
        let mut tree = FlowChartTree::new();
        let start = tree.add_node("start").unwrap();
        let middle = tree.add_node("middle").unwrap();
        tree.add_node("island").unwrap();
        tree.add_startup("start", start).unwrap();
        tree.node_mut(start)
            .add_branch(BranchInformation::default_branch(), "middle", Some(middle))
            .unwrap();
        tree.node_mut(middle)
            .add_branch(BranchInformation::default_branch(), "missing", None)
            .unwrap();
        tree
    }

    #[test]
    fn test_analyze_tree_dangling_branch() {
        let result = analyze_tree(&chain_tree());

        assert_eq!(result.error_count(), 0);
        assert_eq!(result.warn_count(), 1);
        let warn = &result.diagnostics[0];
        assert_eq!(warn.script_id, FLOWCHART_SCRIPT_ID);
        assert!(warn.message.contains("missing"));
        assert!(warn.detail.as_deref().unwrap().contains("middle"));
    }

    #[test]
    fn test_analyze_tree_unreachable_node() {
        let result = analyze_tree(&chain_tree());

        assert_eq!(result.count(DiagnosticLevel::Info), 1);
        let info = result.diagnostics.last().unwrap();
        assert!(info.message.contains("island"));
    }

    #[test]
    fn test_analyze_tree_unlocked_startup_is_root() {
        let mut tree = chain_tree();
        let island = tree.node_id("island").unwrap();
        tree.add_unlocked_startup("extra", island).unwrap();

        let result = analyze_tree(&tree);
        assert_eq!(result.count(DiagnosticLevel::Info), 0);
    }

    #[test]
    fn test_analyze_tree_handles_cycles() {
        let mut tree = FlowChartTree::new();
        let a = tree.add_node("a").unwrap();
        let b = tree.add_node("b").unwrap();
        tree.add_startup("a", a).unwrap();
        tree.node_mut(a)
            .add_branch(BranchInformation::default_branch(), "b", Some(b))
            .unwrap();
        tree.node_mut(b)
            .add_branch(BranchInformation::default_branch(), "a", Some(a))
            .unwrap();

        assert!(analyze_tree(&tree).is_empty());
    }
}
