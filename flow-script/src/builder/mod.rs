//! # Builder 模块
//!
//! 把脚本文本编译为冻结的 [`FlowChartTree`](crate::flowchart::FlowChartTree)。
//!
//! ## 模块结构
//!
//! - [`session`]：构建接口与单次构建的可变状态
//! - [`evaluator`]：外部求值器接口
//! - [`directive`]：内置的指令求值器
//! - [`loader`]：编排整个构建流程

pub mod directive;
pub mod evaluator;
pub mod loader;
pub mod session;

pub use directive::DirectiveEvaluator;
pub use evaluator::ScriptEvaluator;
pub use loader::{FLOWCHART_SCRIPT_ID, ScriptFile, ScriptLoader, ScriptSources};
pub use session::{BuildPass, BuildSession, BuilderState, FlowChartBuilder, LazyBinding};
