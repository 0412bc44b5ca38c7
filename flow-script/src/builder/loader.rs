//! # Loader 模块
//!
//! 编译流程的编排者：驱动外部求值器、延迟解析前向引用、组装并冻结流程图。
//!
//! ## 构建顺序
//!
//! 1. 默认语言的全部文件（结构阶段）
//! 2. 其他语言的文件（本地化阶段，只附加文本）
//! 3. 解析延迟的出边
//! 4. 完整性检查
//! 5. 冻结

use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};

use crate::config::LoaderConfig;
use crate::diagnostic::{Diagnostic, DiagnosticResult, analyze_tree};
use crate::error::{BuildError, ScriptResult};
use crate::flowchart::FlowChartTree;
use crate::script::{BlockType, ParsedBlock, parse_chunks};

use super::evaluator::ScriptEvaluator;
use super::session::{BuildPass, BuildSession, BuilderState, LazyBinding};

/// 诊断中用于整张流程图的来源名
pub const FLOWCHART_SCRIPT_ID: &str = "<flowchart>";

/// 已解码的脚本文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    /// 文件名（不含扩展名），用于 include 列表与错误信息
    pub name: String,
    pub text: String,
}

impl ScriptFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// 各语言的脚本文件集合，文件按添加顺序处理
#[derive(Debug, Clone, Default)]
pub struct ScriptSources {
    files: BTreeMap<String, Vec<ScriptFile>>,
}

impl ScriptSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, locale: &str, file: ScriptFile) {
        self.files.entry(locale.to_string()).or_default().push(file);
    }

    /// 链式添加
    pub fn with_file(mut self, locale: &str, name: &str, text: &str) -> Self {
        self.add_file(locale, ScriptFile::new(name, text));
        self
    }

    pub fn files(&self, locale: &str) -> &[ScriptFile] {
        self.files.get(locale).map_or(&[], Vec::as_slice)
    }
}

/// 脚本加载器
///
/// 整个构建只执行一次，之后的 [`init`](Self::init) 直接返回已冻结的流程图。
#[derive(Debug, Default)]
pub struct ScriptLoader {
    config: LoaderConfig,
    tree: Option<FlowChartTree>,
    diagnostics: DiagnosticResult,
}

impl ScriptLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            tree: None,
            diagnostics: DiagnosticResult::new(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.tree.is_some()
    }

    /// 构建流程图；已构建过时无操作
    pub fn init(
        &mut self,
        sources: &ScriptSources,
        evaluator: &mut dyn ScriptEvaluator,
    ) -> ScriptResult<&FlowChartTree> {
        let tree = match self.tree.take() {
            Some(tree) => tree,
            None => self.build(sources, evaluator)?,
        };
        Ok(self.tree.insert(tree))
    }

    /// 丢弃已有结果，从头构建
    ///
    /// 失败时不保留任何部分结果。
    pub fn force_init(
        &mut self,
        sources: &ScriptSources,
        evaluator: &mut dyn ScriptEvaluator,
    ) -> ScriptResult<&FlowChartTree> {
        self.tree = None;
        let tree = self.build(sources, evaluator)?;
        Ok(self.tree.insert(tree))
    }

    fn build(
        &mut self,
        sources: &ScriptSources,
        evaluator: &mut dyn ScriptEvaluator,
    ) -> ScriptResult<FlowChartTree> {
        let mut build = Build::new(&self.config);
        let result = build.run(sources, evaluator);

        self.diagnostics = build.diagnostics;
        if let Err(e) = &result {
            error!(error = %e, "流程图构建失败");
            self.diagnostics.push(Diagnostic::from_error(e));
        }
        result.map(|()| build.tree)
    }

    /// 已冻结的流程图
    pub fn tree(&self) -> Option<&FlowChartTree> {
        self.tree.as_ref()
    }

    pub fn into_tree(self) -> Option<FlowChartTree> {
        self.tree
    }

    /// 最近一次构建的诊断
    ///
    /// 构建失败时，最后一条是描述失败原因的 Error 诊断。
    pub fn diagnostics(&self) -> &DiagnosticResult {
        &self.diagnostics
    }
}

/// 一次构建过程中的全部状态
struct Build<'c> {
    config: &'c LoaderConfig,
    tree: FlowChartTree,
    state: BuilderState,
    bindings: Vec<LazyBinding>,
    diagnostics: DiagnosticResult,
}

impl<'c> Build<'c> {
    fn new(config: &'c LoaderConfig) -> Self {
        Self {
            config,
            tree: FlowChartTree::new(),
            state: BuilderState::new(),
            bindings: Vec::new(),
            diagnostics: DiagnosticResult::new(),
        }
    }

    fn run(
        &mut self,
        sources: &ScriptSources,
        evaluator: &mut dyn ScriptEvaluator,
    ) -> ScriptResult<()> {
        let config = self.config;
        for locale in config.locales() {
            let pass = if locale == config.default_locale {
                BuildPass::Structural
            } else {
                BuildPass::Localization(locale.to_string())
            };
            self.run_pass(&pass, sources.files(locale), evaluator)?;
        }

        self.bind_all()?;

        for name in self.tree.sanity_check()? {
            warn!(node = %name, "节点没有后继，已标记为结束点");
            self.diagnostics.push(Diagnostic::warn(
                FLOWCHART_SCRIPT_ID,
                format!("节点 '{name}' 没有后继，已标记为名为 '{name}' 的结束点"),
            ));
        }

        if self.tree.is_default_startup_ambiguous() {
            let chosen = self
                .tree
                .default_startup()
                .map(|id| self.tree.node(id).name().to_string())
                .unwrap_or_default();
            warn!(node = %chosen, "存在多个起始点但未指定默认起始点，使用第一个");
            self.diagnostics.push(Diagnostic::warn(
                FLOWCHART_SCRIPT_ID,
                format!("存在多个起始点但未指定默认起始点，使用第一个注册的 '{chosen}'"),
            ));
        }

        self.tree.freeze();
        self.diagnostics.merge(analyze_tree(&self.tree));
        info!(
            nodes = self.tree.len(),
            startups = self.tree.startup_names().len(),
            ends = self.tree.end_names().len(),
            "流程图构建完成"
        );
        Ok(())
    }

    fn run_pass(
        &mut self,
        pass: &BuildPass,
        files: &[ScriptFile],
        evaluator: &mut dyn ScriptEvaluator,
    ) -> ScriptResult<()> {
        self.state.reset();

        for file in files {
            if !self.config.includes(&file.name) {
                debug!(file = %file.name, "不在 include 列表中，跳过");
                continue;
            }
            debug!(file = %file.name, ?pass, "解析脚本");
            self.parse_script(pass, file, evaluator)
                .map_err(|e| e.in_file(&file.name))?;
        }

        if let BuildPass::Localization(locale) = pass {
            self.check_locale_coverage(locale)?;
        }
        Ok(())
    }

    fn parse_script(
        &mut self,
        pass: &BuildPass,
        file: &ScriptFile,
        evaluator: &mut dyn ScriptEvaluator,
    ) -> ScriptResult<()> {
        evaluator.begin_file(&file.name)?;

        let chunks = parse_chunks(&file.text)?;
        let Some(first_eager) = chunks.iter().position(|chunk| is_eager(chunk)) else {
            if !chunks.is_empty() {
                self.warn_discarded(
                    file,
                    chunks[0][0].line,
                    "文件中没有 eager 块，全部文本被忽略",
                );
            }
            return Ok(());
        };
        if first_eager > 0 {
            self.warn_discarded(
                file,
                chunks[0][0].line,
                "文件不以 eager 块开头，第一个 eager 块之前的文本被忽略",
            );
        }
        let last_eager = chunks
            .iter()
            .rposition(|chunk| is_eager(chunk))
            .unwrap_or(first_eager);
        if let Some(trailing) = chunks.get(last_eager + 1) {
            self.warn_discarded(
                file,
                trailing[0].line,
                "文件应以 eager 块结尾，最后一个 eager 块之后的文本被忽略",
            );
        }

        let mut session = BuildSession::new(
            &mut self.tree,
            &mut self.state,
            &mut self.bindings,
            pass,
        );
        for chunk in &chunks[first_eager..=last_eager] {
            if let [block] = chunk.as_slice()
                && block.kind == BlockType::EagerExecution
            {
                evaluator.execute(&block.content, block.line, &mut session)?;
            } else {
                session.append_chunk(chunk)?;
            }
        }
        Ok(())
    }

    fn warn_discarded(&mut self, file: &ScriptFile, line: usize, message: &str) {
        warn!(file = %file.name, line, "{message}");
        self.diagnostics
            .push(Diagnostic::warn(&file.name, message).with_line(line));
    }

    /// 本地化阶段访问过的节点必须被完整覆盖
    fn check_locale_coverage(&self, locale: &str) -> ScriptResult<()> {
        for (id, count) in self.state.localized_counts() {
            let node = self.tree.node(id);
            if count != node.entry_count() {
                return Err(BuildError::LocaleEntryCountMismatch {
                    node: node.name().to_string(),
                    locale: locale.to_string(),
                    expected: node.entry_count(),
                    actual: count,
                }
                .into());
            }
        }
        Ok(())
    }

    /// 解析所有延迟的出边
    fn bind_all(&mut self) -> ScriptResult<()> {
        for binding in std::mem::take(&mut self.bindings) {
            let target = self.tree.node_id(&binding.destination);
            if target.is_none() {
                let node = self.tree.node(binding.from).name().to_string();
                if self.config.strict_destinations {
                    return Err(BuildError::UndefinedDestination {
                        node,
                        branch: binding.branch.name().to_string(),
                        destination: binding.destination,
                    }
                    .into());
                }
                warn!(
                    node = %node,
                    destination = %binding.destination,
                    "跳转目标未定义，保留为悬空边"
                );
            }

            self.tree
                .node_mut(binding.from)
                .add_branch(binding.branch, binding.destination, target)?;
        }
        Ok(())
    }
}

fn is_eager(chunk: &[ParsedBlock]) -> bool {
    chunk
        .first()
        .is_some_and(|block| block.kind == BlockType::EagerExecution)
}
