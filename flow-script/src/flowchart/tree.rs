//! # Tree 模块
//!
//! 整张流程图：节点注册表、起始点/结束点表、默认起始点，以及冻结与完整性检查。
//!
//! 节点存放在 arena 中，以 [`NodeId`] 索引；节点一旦加入就不会被移除或改名。

use std::collections::{BTreeMap, HashMap};

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::{BuildError, BuildResult};

use super::NodeId;
use super::branch::Branch;
use super::node::{FlowChartNode, FlowChartNodeType};

/// 流程图
#[derive(Debug, Clone, Default)]
pub struct FlowChartTree {
    nodes: Vec<FlowChartNode>,
    index: HashMap<String, NodeId>,
    /// 起始点，保持注册顺序
    startups: Vec<(String, NodeId)>,
    unlocked_startups: Vec<(String, NodeId)>,
    /// 结束点：节点与名字一一对应
    ends: Vec<(NodeId, String)>,
    default_startup: Option<NodeId>,
    frozen: bool,
}

impl FlowChartTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn check_frozen(&self) -> BuildResult<()> {
        if self.frozen {
            return Err(BuildError::Frozen {
                target: "流程图".to_string(),
            });
        }
        Ok(())
    }

    //=========================================================================
    // 节点注册表
    //=========================================================================

    /// 注册新节点
    pub fn add_node(&mut self, name: &str) -> BuildResult<NodeId> {
        self.check_frozen()?;
        if name.is_empty() {
            return Err(BuildError::EmptyLabel);
        }
        if self.index.contains_key(name) {
            return Err(BuildError::DuplicateNode {
                name: name.to_string(),
            });
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(FlowChartNode::new(name));
        self.index.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 按 id 取节点
    ///
    /// `NodeId` 只由本树分配，越界说明混用了不同的树。
    pub fn node(&self, id: NodeId) -> &FlowChartNode {
        &self.nodes[id.0]
    }

    /// 节点的修改操作在冻结后会失败
    pub fn node_mut(&mut self, id: NodeId) -> &mut FlowChartNode {
        &mut self.nodes[id.0]
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn node_by_name(&self, name: &str) -> Option<&FlowChartNode> {
        self.node_id(name).map(|id| self.node(id))
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按注册顺序遍历节点
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FlowChartNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    //=========================================================================
    // 起始点
    //=========================================================================

    /// 注册起始点
    ///
    /// 同名指向同一节点时无操作，指向不同节点时报错。
    pub fn add_startup(&mut self, name: &str, node: NodeId) -> BuildResult<()> {
        self.check_frozen()?;
        Self::insert_startup(&mut self.startups, &self.nodes, name, node)
    }

    /// 注册"一开始就解锁"的起始点
    pub fn add_unlocked_startup(&mut self, name: &str, node: NodeId) -> BuildResult<()> {
        self.check_frozen()?;
        Self::insert_startup(&mut self.unlocked_startups, &self.nodes, name, node)
    }

    fn insert_startup(
        table: &mut Vec<(String, NodeId)>,
        nodes: &[FlowChartNode],
        name: &str,
        node: NodeId,
    ) -> BuildResult<()> {
        if name.is_empty() {
            return Err(BuildError::EmptyStartupName);
        }
        match table.iter().find(|(existing, _)| existing == name) {
            Some((_, existing)) if *existing == node => Ok(()),
            Some((_, existing)) => Err(BuildError::DuplicateStartup {
                name: name.to_string(),
                existing: nodes[existing.0].name().to_string(),
                node: nodes[node.0].name().to_string(),
            }),
            None => {
                table.push((name.to_string(), node));
                Ok(())
            }
        }
    }

    pub fn startup(&self, name: &str) -> Option<NodeId> {
        find_by_name(&self.startups, name)
    }

    pub fn unlocked_startup(&self, name: &str) -> Option<NodeId> {
        find_by_name(&self.unlocked_startups, name)
    }

    pub fn startup_names(&self) -> Vec<&str> {
        self.startups.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn unlocked_startup_names(&self) -> Vec<&str> {
        self.unlocked_startups
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// 设置默认起始点，只能赋值一次
    ///
    /// 重复赋值为同一节点时无操作。
    pub fn set_default_startup(&mut self, node: NodeId) -> BuildResult<()> {
        self.check_frozen()?;
        match self.default_startup {
            Some(existing) if existing != node => Err(BuildError::DuplicateDefaultStartup {
                existing: self.node(existing).name().to_string(),
                node: self.node(node).name().to_string(),
            }),
            _ => {
                self.default_startup = Some(node);
                Ok(())
            }
        }
    }

    /// 默认起始点
    ///
    /// 未显式指定时取第一个注册的起始点。
    pub fn default_startup(&self) -> Option<NodeId> {
        self.default_startup
            .or_else(|| self.startups.first().map(|(_, node)| *node))
    }

    /// 未显式指定默认起始点、却有多个起始点
    pub fn is_default_startup_ambiguous(&self) -> bool {
        self.default_startup.is_none() && self.startups.len() > 1
    }

    //=========================================================================
    // 结束点
    //=========================================================================

    /// 注册结束点，节点与名字保持一一对应
    ///
    /// - 同一 (节点, 名字) 重复注册：无操作
    /// - 名字已属于其他节点：报错
    /// - 节点已有其他结束名：报错
    pub fn add_end(&mut self, name: &str, node: NodeId) -> BuildResult<()> {
        self.check_frozen()?;
        if name.is_empty() {
            return Err(BuildError::EmptyEndName);
        }

        if let Some(existing) = self.end_name(node) {
            if existing == name {
                return Ok(());
            }
            return Err(BuildError::ConflictingEndName {
                node: self.node(node).name().to_string(),
                existing: existing.to_string(),
                name: name.to_string(),
            });
        }

        if let Some(existing) = self.end(name) {
            return Err(BuildError::DuplicateEndName {
                name: name.to_string(),
                existing: self.node(existing).name().to_string(),
                node: self.node(node).name().to_string(),
            });
        }

        self.ends.push((node, name.to_string()));
        Ok(())
    }

    pub fn end_name(&self, node: NodeId) -> Option<&str> {
        self.ends
            .iter()
            .find(|(id, _)| *id == node)
            .map(|(_, name)| name.as_str())
    }

    pub fn end(&self, name: &str) -> Option<NodeId> {
        self.ends
            .iter()
            .find(|(_, existing)| existing == name)
            .map(|(node, _)| *node)
    }

    pub fn end_names(&self) -> Vec<&str> {
        self.ends.iter().map(|(_, name)| name.as_str()).collect()
    }

    //=========================================================================
    // 生命周期
    //=========================================================================

    /// 完整性检查
    ///
    /// - 至少有一个起始点
    /// - 没有出边且不是 End 的节点被提升为 End，并以自身名字注册为结束点
    ///
    /// 返回被提升的节点名。
    pub fn sanity_check(&mut self) -> BuildResult<Vec<String>> {
        self.check_frozen()?;
        if self.startups.is_empty() {
            return Err(BuildError::NoStartupNode);
        }

        let promoted: Vec<NodeId> = self
            .nodes()
            .filter(|(_, node)| node.branch_count() == 0 && node.kind() != FlowChartNodeType::End)
            .map(|(id, _)| id)
            .collect();

        let mut names = Vec::with_capacity(promoted.len());
        for id in promoted {
            let name = self.node(id).name().to_string();
            self.node_mut(id).set_kind(FlowChartNodeType::End)?;
            self.add_end(&name, id)?;
            names.push(name);
        }
        Ok(names)
    }

    /// 冻结整棵树，级联到每个节点
    pub fn freeze(&mut self) {
        self.frozen = true;
        for node in &mut self.nodes {
            node.freeze();
        }
    }

    /// 目标未定义的出边
    pub fn dangling_branches(&self) -> Vec<(NodeId, &Branch)> {
        self.nodes()
            .flat_map(|(id, node)| {
                node.branches()
                    .iter()
                    .filter(|branch| branch.is_dangling())
                    .map(move |branch| (id, branch))
            })
            .collect()
    }
}

impl FlowChartTree {
    /// 起始点名 → 节点名
    fn startup_targets<'a>(&'a self, table: &'a [(String, NodeId)]) -> BTreeMap<&'a str, &'a str> {
        table
            .iter()
            .map(|(name, id)| (name.as_str(), self.node(*id).name()))
            .collect()
    }
}

fn find_by_name(table: &[(String, NodeId)], name: &str) -> Option<NodeId> {
    table
        .iter()
        .find(|(existing, _)| existing == name)
        .map(|(_, node)| *node)
}

/// 序列化时用节点名代替 `NodeId`
impl Serialize for FlowChartTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ends: BTreeMap<&str, &str> = self
            .ends
            .iter()
            .map(|(id, name)| (self.node(*id).name(), name.as_str()))
            .collect();

        let mut state = serializer.serialize_struct("FlowChartTree", 5)?;
        state.serialize_field("nodes", &self.nodes)?;
        state.serialize_field("startups", &self.startup_targets(&self.startups))?;
        state.serialize_field(
            "unlocked_startups",
            &self.startup_targets(&self.unlocked_startups),
        )?;
        state.serialize_field(
            "default_startup",
            &self.default_startup().map(|id| self.node(id).name()),
        )?;
        state.serialize_field("ends", &ends)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowchart::branch::BranchInformation;

    fn tree_with(names: &[&str]) -> (FlowChartTree, Vec<NodeId>) {
        let mut tree = FlowChartTree::new();
        let ids = names.iter().map(|name| tree.add_node(name).unwrap()).collect();
        (tree, ids)
    }

    #[test]
    fn test_add_node() {
        let (mut tree, ids) = tree_with(&["a", "b"]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.node_id("b"), Some(ids[1]));
        assert_eq!(tree.node(ids[0]).name(), "a");
        assert_eq!(tree.add_node(""), Err(BuildError::EmptyLabel));
        assert_eq!(
            tree.add_node("a"),
            Err(BuildError::DuplicateNode {
                name: "a".to_string()
            })
        );
        let names: Vec<&str> = tree.nodes().map(|(_, node)| node.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_startup_registration() {
        let (mut tree, ids) = tree_with(&["a", "b"]);
        tree.add_startup("s", ids[0]).unwrap();
        // 同名同节点：无操作
        tree.add_startup("s", ids[0]).unwrap();
        assert_eq!(tree.startup_names(), vec!["s"]);

        assert!(matches!(
            tree.add_startup("s", ids[1]),
            Err(BuildError::DuplicateStartup { .. })
        ));
        assert_eq!(tree.add_startup("", ids[1]), Err(BuildError::EmptyStartupName));
        assert_eq!(tree.startup("s"), Some(ids[0]));
    }

    #[test]
    fn test_default_startup_single_assignment() {
        let (mut tree, ids) = tree_with(&["a", "b"]);
        assert_eq!(tree.default_startup(), None);

        tree.add_startup("b", ids[1]).unwrap();
        tree.add_startup("a", ids[0]).unwrap();
        // 未指定时取第一个注册的起始点
        assert_eq!(tree.default_startup(), Some(ids[1]));
        assert!(tree.is_default_startup_ambiguous());

        tree.set_default_startup(ids[0]).unwrap();
        tree.set_default_startup(ids[0]).unwrap();
        assert_eq!(tree.default_startup(), Some(ids[0]));
        assert!(!tree.is_default_startup_ambiguous());
        assert_eq!(
            tree.set_default_startup(ids[1]),
            Err(BuildError::DuplicateDefaultStartup {
                existing: "a".to_string(),
                node: "b".to_string()
            })
        );
    }

    #[test]
    fn test_add_end_is_bijection() {
        let (mut tree, ids) = tree_with(&["a", "b"]);
        tree.add_end("good", ids[0]).unwrap();
        tree.add_end("good", ids[0]).unwrap();
        assert_eq!(tree.end_names(), vec!["good"]);

        assert_eq!(
            tree.add_end("good", ids[1]),
            Err(BuildError::DuplicateEndName {
                name: "good".to_string(),
                existing: "a".to_string(),
                node: "b".to_string()
            })
        );
        assert_eq!(
            tree.add_end("bad", ids[0]),
            Err(BuildError::ConflictingEndName {
                node: "a".to_string(),
                existing: "good".to_string(),
                name: "bad".to_string()
            })
        );
        assert_eq!(tree.add_end("", ids[1]), Err(BuildError::EmptyEndName));
        assert_eq!(tree.end("good"), Some(ids[0]));
        assert_eq!(tree.end_name(ids[1]), None);
    }

    #[test]
    fn test_sanity_check_requires_startup() {
        let (mut tree, _) = tree_with(&["a"]);
        assert_eq!(tree.sanity_check(), Err(BuildError::NoStartupNode));
    }

    #[test]
    fn test_sanity_check_promotes_leaf_nodes() {
        let (mut tree, ids) = tree_with(&["a", "b", "c"]);
        tree.add_startup("a", ids[0]).unwrap();
        tree.node_mut(ids[0])
            .add_branch(BranchInformation::default_branch(), "b", Some(ids[1]))
            .unwrap();
        tree.node_mut(ids[2]).set_kind(FlowChartNodeType::End).unwrap();
        tree.add_end("c_end", ids[2]).unwrap();

        let promoted = tree.sanity_check().unwrap();
        assert_eq!(promoted, vec!["b".to_string()]);
        assert_eq!(tree.node(ids[1]).kind(), FlowChartNodeType::End);
        assert_eq!(tree.end_name(ids[1]), Some("b"));
        assert_eq!(tree.end_name(ids[2]), Some("c_end"));
        assert_eq!(tree.node(ids[0]).kind(), FlowChartNodeType::Normal);
    }

    #[test]
    fn test_frozen_tree_rejects_mutation() {
        let (mut tree, ids) = tree_with(&["a"]);
        tree.add_startup("a", ids[0]).unwrap();
        tree.freeze();

        assert!(tree.is_frozen());
        assert!(tree.node(ids[0]).is_frozen());
        assert!(matches!(tree.add_node("b"), Err(BuildError::Frozen { .. })));
        assert!(matches!(
            tree.add_startup("x", ids[0]),
            Err(BuildError::Frozen { .. })
        ));
        assert!(matches!(
            tree.add_end("x", ids[0]),
            Err(BuildError::Frozen { .. })
        ));
        assert!(matches!(
            tree.set_default_startup(ids[0]),
            Err(BuildError::Frozen { .. })
        ));
        assert!(matches!(tree.sanity_check(), Err(BuildError::Frozen { .. })));
        assert!(matches!(
            tree.node_mut(ids[0]).set_kind(FlowChartNodeType::End),
            Err(BuildError::Frozen { .. })
        ));
    }

    #[test]
    fn test_dangling_branches() {
        let (mut tree, ids) = tree_with(&["a"]);
        tree.node_mut(ids[0])
            .add_branch(BranchInformation::default_branch(), "missing", None)
            .unwrap();
        let dangling = tree.dangling_branches();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].0, ids[0]);
        assert_eq!(dangling[0].1.destination, "missing");
    }

    #[test]
    fn test_serialize_uses_names() {
        let (mut tree, ids) = tree_with(&["a", "b"]);
        tree.add_startup("开始", ids[0]).unwrap();
        tree.add_end("结局", ids[1]).unwrap();

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["startups"]["开始"], "a");
        assert_eq!(json["default_startup"], "a");
        assert_eq!(json["ends"]["b"], "结局");
        assert_eq!(json["nodes"][1]["name"], "b");
        assert_eq!(json["nodes"][1]["type"], "Normal");
    }
}
