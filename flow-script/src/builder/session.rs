//! # Session 模块
//!
//! 构建状态机。外部求值器执行 eager 代码时，通过 [`FlowChartBuilder`] 回调修改流程图。
//!
//! ## 状态
//!
//! - [`BuilderState`]：当前节点游标、隐藏名记忆表、本地化进度，跨文件保留
//! - [`LazyBinding`]：延迟到所有文件解析完成后才解析的出边
//! - [`BuildSession`]：借用上面的状态与流程图，处理一个 eager 块或一个对话 chunk
//!
//! ## 两种阶段
//!
//! | 回调 | Structural | Localization |
//! |------|------------|--------------|
//! | `register_new_node` | 注册节点 | 报错 |
//! | `begin_add_locale_for_node` | 报错 | 切换游标 |
//! | `register_jump` / `end_register_branch` / `set_current_as_end` | 正常处理 | 只关闭游标 |
//! | `register_branch` / `set_current_as_*startup` / `set_current_as_default_start` | 正常处理 | 忽略 |

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{BuildError, BuildResult};
use crate::flowchart::{
    BranchInformation, BranchOptions, DEFAULT_BRANCH_NAME, DialogueEntry, FlowChartNodeType,
    FlowChartTree, LocalizedDialogueEntry, NodeId,
};
use crate::script::node_parser::{chunk_text, parse_dialogue_entry};
use crate::script::{HiddenNameMemo, ParsedBlock, split_name_dialogue};

/// 构建阶段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildPass {
    /// 默认语言：建立节点与边
    Structural,
    /// 其他语言：只为已有节点附加译文
    Localization(String),
}

impl BuildPass {
    pub fn locale(&self) -> Option<&str> {
        match self {
            Self::Structural => None,
            Self::Localization(locale) => Some(locale),
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural)
    }
}

/// eager 代码可调用的构建接口
pub trait FlowChartBuilder {
    /// 当前阶段
    fn pass(&self) -> &BuildPass;

    /// 注册新节点并设为当前节点；当前节点为 Normal 时自动连一条默认边
    fn register_new_node(&mut self, name: &str) -> BuildResult<()>;

    /// 本地化阶段：把游标指向已有节点
    fn begin_add_locale_for_node(&mut self, name: &str) -> BuildResult<()>;

    /// 当前节点跳转到 `destination`，并关闭当前节点
    fn register_jump(&mut self, destination: Option<&str>) -> BuildResult<()>;

    /// 为当前节点添加分支，节点变为 Branching，游标保持不变
    fn register_branch(
        &mut self,
        name: &str,
        destination: Option<&str>,
        options: BranchOptions,
    ) -> BuildResult<()>;

    /// 结束分支注册，关闭当前节点
    fn end_register_branch(&mut self) -> BuildResult<()>;

    /// 当前节点注册为起始点，名字默认为节点名
    fn set_current_as_startup(&mut self, name: Option<&str>) -> BuildResult<()>;

    /// 当前节点注册为起始点与解锁起始点
    fn set_current_as_unlocked_startup(&mut self, name: Option<&str>) -> BuildResult<()>;

    /// 当前节点注册为解锁起始点，并占用唯一的默认起始点
    fn set_current_as_default_start(&mut self, name: Option<&str>) -> BuildResult<()>;

    /// 当前节点标记为 End 并注册为结束点，关闭当前节点
    fn set_current_as_end(&mut self, name: Option<&str>) -> BuildResult<()>;
}

/// 延迟解析的出边
#[derive(Debug, Clone)]
pub struct LazyBinding {
    pub from: NodeId,
    pub branch: BranchInformation,
    pub destination: String,
}

/// 构建游标
#[derive(Debug, Clone, Default)]
pub struct BuilderState {
    current: Option<NodeId>,
    memo: HiddenNameMemo,
    /// 本地化阶段访问过的节点 → 已填充的条目数
    localized: BTreeMap<NodeId, usize>,
}

impl BuilderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    /// 开始新的阶段
    pub fn reset(&mut self) {
        self.current = None;
        self.memo.clear();
        self.localized.clear();
    }

    /// 本地化阶段各节点已填充的条目数
    pub fn localized_counts(&self) -> impl Iterator<Item = (NodeId, usize)> + '_ {
        self.localized.iter().map(|(id, count)| (*id, *count))
    }

    fn open(&mut self, node: NodeId) {
        self.current = Some(node);
        self.memo.clear();
    }

    fn close(&mut self) {
        self.current = None;
    }
}

/// 一次回调处理所需的全部可变借用
pub struct BuildSession<'a> {
    tree: &'a mut FlowChartTree,
    state: &'a mut BuilderState,
    bindings: &'a mut Vec<LazyBinding>,
    pass: &'a BuildPass,
}

impl<'a> BuildSession<'a> {
    pub fn new(
        tree: &'a mut FlowChartTree,
        state: &'a mut BuilderState,
        bindings: &'a mut Vec<LazyBinding>,
        pass: &'a BuildPass,
    ) -> Self {
        Self {
            tree,
            state,
            bindings,
            pass,
        }
    }

    /// 把一个对话 chunk 追加到当前节点
    ///
    /// 结构阶段生成新条目；本地化阶段按顺序填充已有条目的译文。
    pub fn append_chunk(&mut self, chunk: &[ParsedBlock]) -> BuildResult<()> {
        let Some(first) = chunk.first() else {
            return Ok(());
        };
        let Some(current) = self.state.current else {
            return Err(BuildError::DanglingText { line: first.line });
        };

        match self.pass {
            BuildPass::Structural => {
                let parsed = parse_dialogue_entry(chunk, &mut self.state.memo);
                let entry = DialogueEntry::from_parsed(parsed);
                self.tree.node_mut(current).add_dialogue_entries([entry])
            }
            BuildPass::Localization(locale) => {
                let text = chunk_text(chunk);
                let parts = split_name_dialogue(&text);
                if !parts.hidden_name.is_empty() {
                    return Err(BuildError::LocalizedHiddenName {
                        node: self.node_name(current),
                        locale: locale.clone(),
                        line: first.line,
                    });
                }
                let index = self.state.localized.entry(current).or_insert(0);
                self.tree.node_mut(current).add_locale_entry(
                    locale,
                    *index,
                    LocalizedDialogueEntry {
                        display_name: parts.display_name.to_string(),
                        dialogue: parts.dialogue.to_string(),
                    },
                )?;
                *index += 1;
                Ok(())
            }
        }
    }

    fn current(&self, action: &str) -> BuildResult<NodeId> {
        self.state.current.ok_or_else(|| BuildError::NoCurrentNode {
            action: action.to_string(),
        })
    }

    fn node_name(&self, id: NodeId) -> String {
        self.tree.node(id).name().to_string()
    }

    fn add_startup(&mut self, name: Option<&str>, unlocked: bool) -> BuildResult<NodeId> {
        let action = if unlocked {
            "set_current_as_unlocked_startup"
        } else {
            "set_current_as_startup"
        };
        let current = self.current(action)?;
        let name = name.map_or_else(|| self.node_name(current), str::to_string);

        self.tree.add_startup(&name, current)?;
        if unlocked {
            self.tree.add_unlocked_startup(&name, current)?;
        }
        Ok(current)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

impl FlowChartBuilder for BuildSession<'_> {
    fn pass(&self) -> &BuildPass {
        self.pass
    }

    fn register_new_node(&mut self, name: &str) -> BuildResult<()> {
        if let BuildPass::Localization(locale) = self.pass {
            return Err(BuildError::StructuralCallInLocalePass {
                locale: locale.clone(),
                action: "register_new_node".to_string(),
            });
        }

        let id = self.tree.add_node(name)?;
        if let Some(current) = self.state.current
            && self.tree.node(current).kind() == FlowChartNodeType::Normal
        {
            self.tree
                .node_mut(current)
                .add_branch(BranchInformation::default_branch(), name, Some(id))?;
        }

        debug!(node = name, "注册节点");
        self.state.open(id);
        Ok(())
    }

    fn begin_add_locale_for_node(&mut self, name: &str) -> BuildResult<()> {
        if self.pass.is_structural() {
            return Err(BuildError::LocaleCallInStructuralPass {
                action: "begin_add_locale_for_node".to_string(),
            });
        }

        let id = self.tree.node_id(name).ok_or_else(|| BuildError::UnknownNode {
            name: name.to_string(),
        })?;
        self.state.localized.entry(id).or_insert(0);
        self.state.open(id);
        Ok(())
    }

    fn register_jump(&mut self, destination: Option<&str>) -> BuildResult<()> {
        if !self.pass.is_structural() {
            self.state.close();
            return Ok(());
        }

        let current = self.current("register_jump")?;
        let Some(destination) = non_empty(destination) else {
            return Err(BuildError::MissingDestination {
                node: self.node_name(current),
                action: "register_jump".to_string(),
            });
        };
        if self.tree.node(current).kind() == FlowChartNodeType::Branching {
            return Err(BuildError::JumpFromBranchingNode {
                node: self.node_name(current),
            });
        }

        self.bindings.push(LazyBinding {
            from: current,
            branch: BranchInformation::default_branch(),
            destination: destination.to_string(),
        });
        self.state.close();
        Ok(())
    }

    fn register_branch(
        &mut self,
        name: &str,
        destination: Option<&str>,
        options: BranchOptions,
    ) -> BuildResult<()> {
        if !self.pass.is_structural() {
            return Ok(());
        }

        let current = self.current("register_branch")?;
        let Some(destination) = non_empty(destination) else {
            return Err(BuildError::MissingDestination {
                node: self.node_name(current),
                action: "register_branch".to_string(),
            });
        };
        if name == DEFAULT_BRANCH_NAME {
            return Err(BuildError::ReservedBranchName {
                node: self.node_name(current),
            });
        }
        options
            .validate()
            .map_err(|message| BuildError::InvalidBranch {
                node: self.node_name(current),
                destination: destination.to_string(),
                message: message.to_string(),
            })?;

        self.tree
            .node_mut(current)
            .set_kind(FlowChartNodeType::Branching)?;
        self.bindings.push(LazyBinding {
            from: current,
            branch: BranchInformation::new(name, options),
            destination: destination.to_string(),
        });
        Ok(())
    }

    fn end_register_branch(&mut self) -> BuildResult<()> {
        self.state.close();
        Ok(())
    }

    fn set_current_as_startup(&mut self, name: Option<&str>) -> BuildResult<()> {
        if !self.pass.is_structural() {
            return Ok(());
        }
        self.add_startup(name, false).map(|_| ())
    }

    fn set_current_as_unlocked_startup(&mut self, name: Option<&str>) -> BuildResult<()> {
        if !self.pass.is_structural() {
            return Ok(());
        }
        self.add_startup(name, true).map(|_| ())
    }

    fn set_current_as_default_start(&mut self, name: Option<&str>) -> BuildResult<()> {
        if !self.pass.is_structural() {
            return Ok(());
        }
        let current = self.add_startup(name, true)?;
        self.tree.set_default_startup(current)
    }

    fn set_current_as_end(&mut self, name: Option<&str>) -> BuildResult<()> {
        if !self.pass.is_structural() {
            self.state.close();
            return Ok(());
        }

        let current = self.current("set_current_as_end")?;
        let name = name.map_or_else(|| self.node_name(current), str::to_string);
        self.tree.node_mut(current).set_kind(FlowChartNodeType::End)?;
        self.tree.add_end(&name, current)?;
        self.state.close();
        Ok(())
    }
}
