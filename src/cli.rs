use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the spec-locked code generation workflow.
#[derive(Parser, Debug)]
#[command(
    name = "vibesafe",
    version,
    about = "Spec-locked LLM code generation with content-addressed checkpoints",
    after_help = "Commands:\n  init                      Write a starter vibesafe.toml and store directories\n  scan                      List units with their pipeline status\n  compile [--target ID]     Generate checkpoints (provider cache honoured)\n  test [--target ID]        Run example/lint/type gates against checkpoints\n  save [--target ID]        Verify and activate checkpoints\n  diff [--target ID]        Show hash deltas between source and active checkpoints\n  status                    Summarise coverage and drift\n  check                     Gates plus drift detection; nonzero exit on failure\n\nExamples:\n  vibesafe init\n  vibesafe compile --target app.math.ops/add_strs\n  vibesafe test\n  vibesafe save --target app.math.ops/add_strs\n  VIBESAFE_ENV=prod vibesafe check",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Project root; defaults to discovering vibesafe.toml upward from the
    /// working directory
    #[arg(long, value_name = "DIR", global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Scan(ScanArgs),
    Compile(CompileArgs),
    Test(TestArgs),
    Save(SaveArgs),
    Diff(DiffArgs),
    Status(StatusArgs),
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Write a starter vibesafe.toml and prepare store directories")]
pub struct InitArgs {
    /// Overwrite an existing vibesafe.toml
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "List units with completeness and drift status")]
pub struct ScanArgs {}

#[derive(Parser, Debug)]
#[command(about = "Generate code for units and write checkpoints")]
pub struct CompileArgs {
    /// Unit id or module-path prefix to compile
    #[arg(long, value_name = "ID")]
    pub target: Option<String>,

    /// Bypass the provider cache
    #[arg(long)]
    pub force: bool,

    /// Worker pool size for parallel compilation
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(about = "Run verification gates against checkpoints")]
pub struct TestArgs {
    /// Unit id or module-path prefix to test
    #[arg(long, value_name = "ID")]
    pub target: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Verify checkpoints and activate them in the index")]
pub struct SaveArgs {
    /// Unit id or module-path prefix to save
    #[arg(long, value_name = "ID")]
    pub target: Option<String>,

    /// Record interpreter dependency pins into activated checkpoint metadata
    #[arg(long)]
    pub freeze_http_deps: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Show prompt/spec hash deltas against active checkpoints")]
pub struct DiffArgs {
    /// Unit id to diff
    #[arg(long, value_name = "ID")]
    pub target: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Summarise coverage and drift across all units")]
pub struct StatusArgs {}

#[derive(Parser, Debug)]
#[command(about = "Run gates and drift detection; nonzero exit on any failure")]
pub struct CheckArgs {}
