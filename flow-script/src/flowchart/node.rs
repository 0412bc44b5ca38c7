//! # Node 模块
//!
//! 流程图节点。冻结后所有修改操作都返回 [`BuildError::Frozen`]。

use serde::Serialize;

use crate::error::{BuildError, BuildResult};
use crate::script::hash;

use super::NodeId;
use super::branch::{Branch, BranchInformation};
use super::dialogue::{DialogueEntry, LocalizedDialogueEntry};

/// 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum FlowChartNodeType {
    /// 只有一个（隐式或显式的）后继
    #[default]
    Normal,
    /// 注册过显式分支
    Branching,
    /// 终点
    End,
}

/// 流程图节点
#[derive(Debug, Clone, Serialize)]
pub struct FlowChartNode {
    name: String,
    #[serde(rename = "type")]
    kind: FlowChartNodeType,
    dialogue_entries: Vec<DialogueEntry>,
    branches: Vec<Branch>,
    text_hash: u64,
    #[serde(skip)]
    frozen: bool,
}

impl FlowChartNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FlowChartNodeType::Normal,
            dialogue_entries: Vec::new(),
            branches: Vec::new(),
            text_hash: 0,
            frozen: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FlowChartNodeType {
        self.kind
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn check_frozen(&self) -> BuildResult<()> {
        if self.frozen {
            return Err(BuildError::Frozen {
                target: format!("节点 '{}'", self.name),
            });
        }
        Ok(())
    }

    pub fn set_kind(&mut self, kind: FlowChartNodeType) -> BuildResult<()> {
        self.check_frozen()?;
        self.kind = kind;
        Ok(())
    }

    //=========================================================================
    // 对话条目
    //=========================================================================

    pub fn dialogue_entries(&self) -> &[DialogueEntry] {
        &self.dialogue_entries
    }

    pub fn entry_count(&self) -> usize {
        self.dialogue_entries.len()
    }

    /// 追加默认语言的对话条目
    pub fn add_dialogue_entries(
        &mut self,
        entries: impl IntoIterator<Item = DialogueEntry>,
    ) -> BuildResult<()> {
        self.check_frozen()?;
        self.dialogue_entries.extend(entries);
        self.text_hash = hash::fold(self.dialogue_entries.iter().map(DialogueEntry::text_hash));
        Ok(())
    }

    /// 为第 `index` 个条目添加译文
    ///
    /// `index` 超出条目数量时报错。
    pub fn add_locale_entry(
        &mut self,
        locale: &str,
        index: usize,
        entry: LocalizedDialogueEntry,
    ) -> BuildResult<()> {
        self.check_frozen()?;
        let expected = self.dialogue_entries.len();
        let Some(target) = self.dialogue_entries.get_mut(index) else {
            return Err(BuildError::LocaleEntryCountMismatch {
                node: self.name.clone(),
                locale: locale.to_string(),
                expected,
                actual: index + 1,
            });
        };
        target.add_localized(locale, entry);
        Ok(())
    }

    /// 所有对话条目哈希的折叠值
    pub fn text_hash(&self) -> u64 {
        self.text_hash
    }

    //=========================================================================
    // 分支
    //=========================================================================

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// 添加一条出边，分支名在节点内唯一
    pub fn add_branch(
        &mut self,
        info: BranchInformation,
        destination: impl Into<String>,
        target: Option<NodeId>,
    ) -> BuildResult<()> {
        self.check_frozen()?;
        if self.branches.iter().any(|branch| branch.info == info) {
            return Err(BuildError::DuplicateBranch {
                node: self.name.clone(),
                branch: info.name().to_string(),
            });
        }
        self.branches.push(Branch {
            info,
            destination: destination.into(),
            target,
        });
        Ok(())
    }

    /// 按分支名查找出边
    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|branch| branch.info.name() == name)
    }

    /// 分支指向的节点
    pub fn target_of(&self, name: &str) -> Option<NodeId> {
        self.branch(name).and_then(|branch| branch.target)
    }

    /// Normal 节点的后继（默认分支）
    pub fn next(&self) -> Option<&Branch> {
        if self.kind != FlowChartNodeType::Normal {
            return None;
        }
        self.branches.iter().find(|branch| branch.info.is_default())
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::flowchart::branch::BranchOptions;

    fn entry(dialogue: &str) -> DialogueEntry {
        DialogueEntry::new(
            1,
            "",
            LocalizedDialogueEntry {
                display_name: String::new(),
                dialogue: dialogue.to_string(),
            },
            BTreeMap::new(),
        )
    }

    fn localized(dialogue: &str) -> LocalizedDialogueEntry {
        LocalizedDialogueEntry {
            display_name: String::new(),
            dialogue: dialogue.to_string(),
        }
    }

    #[test]
    fn test_duplicate_branch_rejected() {
        let mut node = FlowChartNode::new("a");
        node.add_branch(
            BranchInformation::new("x", BranchOptions::default()),
            "b",
            Some(NodeId(1)),
        )
        .unwrap();

        let err = node
            .add_branch(
                BranchInformation::new(
                    "x",
                    BranchOptions {
                        text: Some("另一个".to_string()),
                        ..Default::default()
                    },
                ),
                "c",
                Some(NodeId(2)),
            )
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateBranch {
                node: "a".to_string(),
                branch: "x".to_string()
            }
        );
        assert_eq!(node.branch_count(), 1);
        assert_eq!(node.target_of("x"), Some(NodeId(1)));
    }

    #[test]
    fn test_next_only_for_normal() {
        let mut node = FlowChartNode::new("a");
        node.add_branch(BranchInformation::default_branch(), "b", Some(NodeId(1)))
            .unwrap();
        assert_eq!(node.next().and_then(|branch| branch.target), Some(NodeId(1)));

        node.set_kind(FlowChartNodeType::Branching).unwrap();
        assert!(node.next().is_none());
    }

    #[test]
    fn test_locale_overlay() {
        let mut node = FlowChartNode::new("a");
        node.add_dialogue_entries([entry("一"), entry("二")]).unwrap();
        node.add_locale_entry("en", 0, localized("one")).unwrap();
        node.add_locale_entry("en", 1, localized("two")).unwrap();

        let err = node.add_locale_entry("en", 2, localized("three")).unwrap_err();
        assert_eq!(
            err,
            BuildError::LocaleEntryCountMismatch {
                node: "a".to_string(),
                locale: "en".to_string(),
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(node.dialogue_entries()[1].text("en").dialogue, "two");
    }

    #[test]
    fn test_text_hash_follows_entries() {
        let mut a = FlowChartNode::new("a");
        let mut b = FlowChartNode::new("b");
        assert_eq!(a.text_hash(), 0);
        a.add_dialogue_entries([entry("一")]).unwrap();
        b.add_dialogue_entries([entry("一")]).unwrap();
        assert_eq!(a.text_hash(), b.text_hash());
        b.add_dialogue_entries([entry("二")]).unwrap();
        assert_ne!(a.text_hash(), b.text_hash());
    }

    #[test]
    fn test_frozen_node_rejects_mutation() {
        let mut node = FlowChartNode::new("a");
        node.freeze();
        assert!(matches!(
            node.set_kind(FlowChartNodeType::End),
            Err(BuildError::Frozen { .. })
        ));
        assert!(matches!(
            node.add_dialogue_entries([entry("x")]),
            Err(BuildError::Frozen { .. })
        ));
        assert!(matches!(
            node.add_branch(BranchInformation::default_branch(), "b", None),
            Err(BuildError::Frozen { .. })
        ));
        assert!(matches!(
            node.add_locale_entry("en", 0, localized("x")),
            Err(BuildError::Frozen { .. })
        ));
        assert_eq!(node.kind(), FlowChartNodeType::Normal);
    }
}
