//! # Error 模块
//!
//! 定义 flow-script 中使用的错误类型。
//!
//! 两类错误都会中止整个编译过程：
//!
//! - [`ParseError`]：词法/语法错误（Tokenizer、Parser），携带行列号
//! - [`BuildError`]：结构/构建错误（NodeParser、ScriptLoader、FlowChartTree），携带出错的名称

use thiserror::Error;

/// 解析错误（词法/语法）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// 单行引号未闭合
    #[error("第 {line} 行，第 {column} 列：引号未闭合")]
    UnpairedQuote { line: usize, column: usize },

    /// 长括号字符串未闭合
    #[error("第 {line} 行，第 {column} 列：多行字符串未闭合")]
    UnpairedMultilineString { line: usize, column: usize },

    /// 块注释未闭合
    #[error("第 {line} 行，第 {column} 列：块注释未闭合")]
    UnpairedBlockComment { line: usize, column: usize },

    /// 代码块缺少 `|>`
    #[error("第 {line} 行，第 {column} 列：代码块起始符 <| 未配对")]
    UnpairedBlockStart { line: usize, column: usize },

    /// 遇到非预期的 token
    #[error("第 {line} 行，第 {column} 列：期望 {expected}，实际为 {found}")]
    UnexpectedToken {
        line: usize,
        column: usize,
        expected: String,
        found: String,
    },
}

impl ParseError {
    /// 错误所在的行列号
    pub fn position(&self) -> (usize, usize) {
        match self {
            Self::UnpairedQuote { line, column }
            | Self::UnpairedMultilineString { line, column }
            | Self::UnpairedBlockComment { line, column }
            | Self::UnpairedBlockStart { line, column }
            | Self::UnexpectedToken { line, column, .. } => (*line, *column),
        }
    }
}

/// 构建错误（结构性）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// label 名为空
    #[error("label 必须有名字")]
    EmptyLabel,

    /// 节点重复定义
    #[error("label '{name}' 重复定义")]
    DuplicateNode { name: String },

    /// 节点不存在
    #[error("节点 '{name}' 不存在")]
    UnknownNode { name: String },

    /// 起始点名称为空
    #[error("起始点名称不能为空")]
    EmptyStartupName,

    /// 同一起始点名称指向了不同节点
    #[error("起始点 '{name}' 重复定义：已指向 '{existing}'，又指向 '{node}'")]
    DuplicateStartup {
        name: String,
        existing: String,
        node: String,
    },

    /// 默认起始点被赋值为两个不同节点
    #[error("默认起始点被赋值为两个不同节点：'{existing}' 与 '{node}'")]
    DuplicateDefaultStartup { existing: String, node: String },

    /// 结束点名称为空
    #[error("结束点名称不能为空")]
    EmptyEndName,

    /// 结束点名称已被其他节点使用
    #[error("结束点 '{name}' 重复定义：已属于 '{existing}'，又被用于 '{node}'")]
    DuplicateEndName {
        name: String,
        existing: String,
        node: String,
    },

    /// 同一节点被赋予两个不同的结束点名称
    #[error("节点 '{node}' 被赋予两个不同的结束点名称：'{existing}' 与 '{name}'")]
    ConflictingEndName {
        node: String,
        existing: String,
        name: String,
    },

    /// 同一节点内分支名重复
    #[error("节点 '{node}' 中分支 '{branch}' 重复定义")]
    DuplicateBranch { node: String, branch: String },

    /// 作者分支使用了保留名 `default`
    #[error("节点 '{node}' 中的分支不能使用保留名 'default'")]
    ReservedBranchName { node: String },

    /// 分支参数不合法
    #[error("节点 '{node}' 中跳转到 '{destination}' 的分支不合法：{message}")]
    InvalidBranch {
        node: String,
        destination: String,
        message: String,
    },

    /// 跳转/分支缺少目标
    #[error("节点 '{node}' 中的 {action} 缺少目标")]
    MissingDestination { node: String, action: String },

    /// 没有正在构建的节点
    #[error("{action} 必须在注册当前节点之后调用")]
    NoCurrentNode { action: String },

    /// 对分支节点调用跳转
    #[error("不能对分支节点 '{node}' 使用 jump_to")]
    JumpFromBranchingNode { node: String },

    /// 跳转目标未定义（严格模式）
    #[error("节点 '{node}' 的分支 '{branch}' 指向未定义的节点 '{destination}'")]
    UndefinedDestination {
        node: String,
        branch: String,
        destination: String,
    },

    /// 流程图中没有起始点
    #[error("流程图中至少需要一个起始点")]
    NoStartupNode,

    /// 修改已冻结的对象
    #[error("{target} 已冻结，不能再修改")]
    Frozen { target: String },

    /// 在本地化阶段调用了结构性操作
    #[error("本地化阶段（{locale}）不能调用 {action}")]
    StructuralCallInLocalePass { locale: String, action: String },

    /// 在结构阶段调用了本地化操作
    #[error("结构阶段不能调用 {action}")]
    LocaleCallInStructuralPass { action: String },

    /// 本地化条目数量与默认语言不一致
    #[error("节点 '{node}' 在 {locale} 中的对话条目数 {actual} 与默认语言的 {expected} 不一致")]
    LocaleEntryCountMismatch {
        node: String,
        locale: String,
        expected: usize,
        actual: usize,
    },

    /// 译文中不能指定隐藏角色名
    #[error("第 {line} 行：节点 '{node}' 的 {locale} 译文不能指定隐藏角色名")]
    LocalizedHiddenName {
        node: String,
        locale: String,
        line: usize,
    },

    /// 没有所属节点的文本
    #[error("第 {line} 行：文本不属于任何节点")]
    DanglingText { line: usize },

    /// 没有匹配 label 的尾部 eager 块
    #[error("第 {line} 行：未匹配的尾部 eager 块")]
    UnmatchedTailEagerBlock { line: usize },

    /// 外部脚本求值器报错
    #[error("脚本求值失败: {message}")]
    Evaluator { message: String },
}

/// flow-script 统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),

    /// 构建错误
    #[error("构建错误: {0}")]
    Build(#[from] BuildError),

    /// 某个脚本文件中的错误
    #[error("解析 {file} 失败: {source}")]
    InFile {
        file: String,
        #[source]
        source: Box<ScriptError>,
    },
}

impl ScriptError {
    /// 附加文件名
    pub fn in_file(self, file: impl Into<String>) -> Self {
        Self::InFile {
            file: file.into(),
            source: Box::new(self),
        }
    }

    /// 出错的文件名（如果有）
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::InFile { file, .. } => Some(file),
            _ => None,
        }
    }

    /// 出错的行号（如果可定位）
    pub fn line(&self) -> Option<usize> {
        match self.root() {
            Self::Parse(error) => Some(error.position().0),
            Self::Build(
                BuildError::DanglingText { line }
                | BuildError::UnmatchedTailEagerBlock { line }
                | BuildError::LocalizedHiddenName { line, .. },
            ) => Some(*line),
            _ => None,
        }
    }

    /// 去掉文件包装后的根错误
    pub fn root(&self) -> &ScriptError {
        match self {
            Self::InFile { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result 类型别名
pub type ScriptResult<T> = Result<T, ScriptError>;

/// 构建阶段 Result 类型别名
pub type BuildResult<T> = Result<T, BuildError>;
