//! # Branch 模块
//!
//! 节点之间的带名边。

use std::hash::{Hash, Hasher};

use serde::Serialize;

use super::NodeId;

/// 默认分支名，作者定义的分支不能使用
pub const DEFAULT_BRANCH_NAME: &str = "default";

/// 分支模式（渲染与选择语义由运行时解释）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchMode {
    /// 普通选项
    #[default]
    Normal,
    /// 条件满足时直接跳转，不显示选项
    Jump,
    /// 条件满足时才显示
    Show,
    /// 条件满足时才可选
    Enable,
}

impl BranchMode {
    /// 从脚本中的名字解析（不区分大小写）
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "jump" => Some(Self::Jump),
            "show" => Some(Self::Show),
            "enable" => Some(Self::Enable),
            _ => None,
        }
    }
}

/// 分支条件的不透明句柄，由外部求值器分配和解释
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConditionHandle(pub u64);

/// 分支按钮上的图片
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchImageInformation {
    pub name: String,
    pub position_x: f32,
    pub position_y: f32,
    pub scale: f32,
}

/// 注册分支时的可选参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchOptions {
    pub text: Option<String>,
    pub image: Option<BranchImageInformation>,
    pub mode: BranchMode,
    pub condition: Option<ConditionHandle>,
}

impl BranchOptions {
    /// 检查模式与其余参数是否匹配
    pub fn validate(&self) -> Result<(), &'static str> {
        match self.mode {
            BranchMode::Normal if self.condition.is_some() => {
                Err("Normal 模式的分支不能带条件")
            }
            BranchMode::Jump if self.text.is_some() || self.image.is_some() => {
                Err("Jump 模式的分支不能带文本或图片")
            }
            BranchMode::Show | BranchMode::Enable if self.condition.is_none() => {
                Err("Show/Enable 模式的分支必须带条件")
            }
            _ => Ok(()),
        }
    }
}

/// 分支信息，创建后不可变
///
/// 相等与哈希只看名字。
#[derive(Debug, Clone, Serialize)]
pub struct BranchInformation {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<BranchImageInformation>,
    mode: BranchMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<ConditionHandle>,
}

impl BranchInformation {
    pub fn new(name: impl Into<String>, options: BranchOptions) -> Self {
        Self {
            name: name.into(),
            text: options.text,
            image: options.image,
            mode: options.mode,
            condition: options.condition,
        }
    }

    /// 默认分支：Normal 节点到下一个节点的隐式边
    pub fn default_branch() -> Self {
        Self::new(DEFAULT_BRANCH_NAME, BranchOptions::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn image(&self) -> Option<&BranchImageInformation> {
        self.image.as_ref()
    }

    pub fn mode(&self) -> BranchMode {
        self.mode
    }

    pub fn condition(&self) -> Option<ConditionHandle> {
        self.condition
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_BRANCH_NAME
    }
}

impl PartialEq for BranchInformation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for BranchInformation {}

impl Hash for BranchInformation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// 节点的一条出边
///
/// `target` 为 `None` 表示目标名从未被定义（宽松模式下保留的悬空边）。
#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub info: BranchInformation,
    /// 脚本中写的目标节点名
    pub destination: String,
    pub target: Option<NodeId>,
}

impl Branch {
    pub fn is_dangling(&self) -> bool {
        self.target.is_none()
    }
}
