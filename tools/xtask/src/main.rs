//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与剧本检查命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `script-check`: 编译剧本并输出诊断
//! - `dump`: 以 JSON 输出编译后的流程图
//!
//! ```bash
//! cargo run -p xtask -- check-all
//! cargo run -p xtask -- script-check assets --config assets/flowchart.json
//! cargo run -p xtask -- -v dump assets > flowchart.json
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{Level, debug};
use walkdir::WalkDir;

use flow_script::{
    DiagnosticLevel, DiagnosticResult, DirectiveEvaluator, LoaderConfig, ScriptFile, ScriptLoader,
    ScriptSources,
};

/// 剧本文件扩展名
const SCRIPT_EXTENSION: &str = "txt";

/// 资源根目录下的默认配置文件名
const DEFAULT_CONFIG_FILE: &str = "flowchart.json";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "开发辅助工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,

    /// 编译剧本并输出诊断
    ScriptCheck {
        #[command(flatten)]
        input: ScriptInput,
    },

    /// 以 JSON 输出编译后的流程图
    Dump {
        #[command(flatten)]
        input: ScriptInput,

        /// 紧凑输出（默认缩进）
        #[arg(long)]
        compact: bool,
    },
}

#[derive(clap::Args)]
struct ScriptInput {
    /// 资源根目录（默认：assets）
    #[arg(default_value = "assets")]
    root: PathBuf,

    /// 加载器配置文件（默认：<root>/flowchart.json，不存在时使用默认配置）
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main(cli.command) {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::CheckAll => check_all(),
        Commands::ScriptCheck { input } => script_check(&input),
        Commands::Dump { input, compact } => dump(&input, compact),
    }
}

fn run(step: &str, cmd: &mut Command) -> anyhow::Result<()> {
    eprintln!("\n==> {step}");
    let status = cmd.status().with_context(|| format!("无法启动 {step}"))?;
    if !status.success() {
        anyhow::bail!("{step} failed with {status}");
    }
    Ok(())
}

fn check_all() -> anyhow::Result<()> {
    let mut fmt = Command::new("cargo");
    fmt.args(["fmt", "--all", "--", "--check"]);
    run("cargo fmt --all -- --check", &mut fmt)?;

    let mut clippy = Command::new("cargo");
    clippy.args(["clippy", "--workspace", "--all-targets"]);
    run("cargo clippy --workspace --all-targets", &mut clippy)?;

    let mut test = Command::new("cargo");
    test.args(["test", "--workspace"]);
    run("cargo test --workspace", &mut test)
}

//=============================================================================
// 剧本编译
//=============================================================================

impl ScriptInput {
    fn load_config(&self) -> anyhow::Result<LoaderConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| self.root.join(DEFAULT_CONFIG_FILE));
        LoaderConfig::load(&path).with_context(|| format!("加载配置失败: {}", path.display()))
    }

    /// 读取每个语言目录下的剧本，按路径排序
    fn collect_sources(&self, config: &LoaderConfig) -> anyhow::Result<ScriptSources> {
        let mut sources = ScriptSources::new();
        for locale in config.locales() {
            let dir = self.root.join(config.script_dir_for(locale));
            if !dir.is_dir() {
                if locale == config.default_locale {
                    anyhow::bail!("默认语言的脚本目录不存在: {}", dir.display());
                }
                eprintln!("[WARN] 语言 {locale} 的脚本目录不存在: {}", dir.display());
                continue;
            }

            for path in collect_script_files(&dir)? {
                debug!(locale, path = %path.display(), "读取剧本");
                sources.add_file(locale, read_script_file(&path)?);
            }
        }
        Ok(sources)
    }

    /// 构建失败时仍返回加载器，失败原因记录在它的诊断中
    fn compile(&self) -> anyhow::Result<ScriptLoader> {
        let config = self.load_config()?;
        let sources = self.collect_sources(&config)?;

        let mut loader = ScriptLoader::new(config);
        if let Err(e) = loader.init(&sources, &mut DirectiveEvaluator::new()) {
            debug!(error = %e, "流程图构建失败");
        }
        Ok(loader)
    }
}

fn collect_script_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("遍历目录失败: {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn read_script_file(path: &Path) -> anyhow::Result<ScriptFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取文件: {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .with_context(|| format!("无效的文件名: {}", path.display()))?;
    Ok(ScriptFile::new(name, text))
}

//=============================================================================
// script-check / dump
//=============================================================================

fn script_check(input: &ScriptInput) -> anyhow::Result<()> {
    let loader = input.compile()?;
    let diagnostics = loader.diagnostics();

    eprintln!("─────────────────────────────────────────────────────");
    match loader.tree() {
        Some(tree) => eprintln!(
            "编译完成: {} 个节点, {} 个起始点, {} 个结束点",
            tree.len(),
            tree.startup_names().len(),
            tree.end_names().len()
        ),
        None => eprintln!("编译失败"),
    }
    eprintln!();

    print_diagnostics(diagnostics, DiagnosticLevel::Info);

    let error_count = diagnostics.error_count();
    let warn_count = diagnostics.warn_count();
    eprintln!();
    if error_count > 0 {
        eprintln!("❌ {} 个错误, {} 个警告", error_count, warn_count);
        anyhow::bail!("剧本检查发现错误");
    } else if warn_count > 0 {
        eprintln!("⚠️  0 个错误, {} 个警告", warn_count);
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
    Ok(())
}

fn dump(input: &ScriptInput, compact: bool) -> anyhow::Result<()> {
    let loader = input.compile()?;
    let Some(tree) = loader.tree() else {
        print_diagnostics(loader.diagnostics(), DiagnosticLevel::Error);
        anyhow::bail!("编译失败，没有可输出的流程图");
    };
    let json = if compact {
        serde_json::to_string(tree)?
    } else {
        serde_json::to_string_pretty(tree)?
    };
    println!("{json}");
    Ok(())
}

fn print_diagnostics(diagnostics: &DiagnosticResult, min_level: DiagnosticLevel) {
    for diag in diagnostics.diagnostics.iter().filter(|d| d.level >= min_level) {
        eprintln!("{diag}");
    }
}
