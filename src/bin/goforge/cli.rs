//! CLI definitions using clap.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use goforge::util::shell::{ColorChoice, Shell};
use goforge::util::GlobalContext;

/// goforge - cross-compile Go modules for every target in a matrix
#[derive(Parser)]
#[command(name = "goforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Path to GoForge.toml (default: search upward from the current directory)
    #[arg(long, global = true)]
    pub manifest_path: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn shell(&self, json: bool) -> Shell {
        Shell::from_flags(self.quiet, self.verbose, self.color, json)
    }

    pub fn context(&self) -> Result<GlobalContext> {
        Ok(GlobalContext::new()?.with_manifest_path(self.manifest_path.clone()))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile the configured variants
    Build(BuildArgs),

    /// List the tasks a build registers
    Tasks(TasksArgs),

    /// Show the resolved Go toolchain for each variant
    Toolchain(ToolchainArgs),

    /// Remove build outputs and cache entries
    Clean(CleanArgs),

    /// Create a GoForge.toml in an existing directory
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

/// Options selecting which units to work on.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Variants (or task names) to build; all when omitted
    pub variants: Vec<String>,

    /// Only variants for this os/arch pair (repeatable, or `all`)
    #[arg(long = "target", value_name = "OS/ARCH")]
    pub targets: Vec<String>,
}

/// Toolchain locations overriding GoForge.toml and the global config.
#[derive(Args, Debug, Clone)]
pub struct ToolchainOverrideArgs {
    /// Path to the go binary
    #[arg(long, value_name = "PATH")]
    pub go: Option<PathBuf>,

    /// Path to the Android NDK
    #[arg(long, value_name = "PATH")]
    pub ndk: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub toolchain: ToolchainOverrideArgs,

    /// Number of units to build in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Per-unit timeout in seconds (0 disables it)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Stop after the first failed unit
    #[arg(long, conflicts_with = "keep_going")]
    pub fail_fast: bool,

    /// Keep building independent units after a failure
    #[arg(long)]
    pub keep_going: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct TasksArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Args)]
pub struct ToolchainArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub toolchain: ToolchainOverrideArgs,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Only drop cache entries, keep built artifacts
    #[arg(long)]
    pub cache: bool,
}

#[derive(Args)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,

    /// Go module directory, relative to the project
    #[arg(long, default_value = "src/main/golang")]
    pub module_dir: String,

    /// Module path for a newly created go.mod
    #[arg(long)]
    pub module_path: Option<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
