//! # Evaluator 模块
//!
//! eager 代码由外部求值器执行，求值器通过 [`FlowChartBuilder`] 回调构建流程图。

use crate::error::BuildResult;

use super::session::FlowChartBuilder;

/// 脚本求值器
///
/// 一个 [`ScriptLoader`](super::ScriptLoader) 在构建期间独占、串行地使用它。
pub trait ScriptEvaluator {
    /// 开始处理新文件
    fn begin_file(&mut self, _file: &str) -> BuildResult<()> {
        Ok(())
    }

    /// 执行一个 eager 块
    ///
    /// `line` 为块在文件中的起始行号。
    fn execute(
        &mut self,
        code: &str,
        line: usize,
        builder: &mut dyn FlowChartBuilder,
    ) -> BuildResult<()>;
}
