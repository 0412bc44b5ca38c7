//! # FlowChart 模块
//!
//! 编译产物：由节点与带名边组成的有向图。
//!
//! ## 模块结构
//!
//! - [`branch`]：分支信息与出边
//! - [`dialogue`]：对话条目
//! - [`node`]：节点
//! - [`tree`]：整张流程图

pub mod branch;
pub mod dialogue;
pub mod node;
pub mod tree;

use serde::Serialize;

pub use branch::{
    Branch, BranchImageInformation, BranchInformation, BranchMode, BranchOptions,
    ConditionHandle, DEFAULT_BRANCH_NAME,
};
pub use dialogue::{DialogueActionStage, DialogueEntry, LocalizedDialogueEntry};
pub use node::{FlowChartNode, FlowChartNodeType};
pub use tree::FlowChartTree;

/// 节点在 [`FlowChartTree`] 中的索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}
