//! Command line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use interpreter::{EvalConfig, VmConfig};

/// Corten bytecode VM
#[derive(Debug, Parser)]
#[command(name = "corten-vm", version, about = "Run compiled bytecode programs")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `interpreter=trace`. Falls back to `RUST_LOG`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a program file
    Run(RunArgs),
}

/// Options of `run`
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Program in chunk JSON form
    pub program: PathBuf,

    /// Skip teardown of persistent state after the run
    #[arg(long)]
    pub single_run: bool,

    /// Keep static state across evaluations
    #[arg(long)]
    pub reload: bool,

    /// Resolve stack traces by exact pc
    #[arg(long)]
    pub gen_all_debug_syms: bool,

    /// Allow the host to load file modules
    #[arg(long)]
    pub enable_file_modules: bool,

    /// Print execution counters as JSON on stderr
    #[arg(long)]
    pub trace: bool,

    /// Stack slot limit per fiber
    #[arg(long, value_name = "SLOTS")]
    pub max_stack: Option<usize>,
}

impl RunArgs {
    /// Evaluation options selected by the flags
    pub fn eval_config(&self) -> EvalConfig {
        EvalConfig {
            single_run: self.single_run,
            enable_file_modules: self.enable_file_modules,
            reload: self.reload,
            gen_all_debug_syms: self.gen_all_debug_syms,
        }
    }

    /// Interpreter options selected by the flags
    pub fn vm_config(&self) -> VmConfig {
        let mut config = VmConfig::default()
            .with_trace(self.trace)
            .with_echo_print(true);
        if let Some(n) = self.max_stack {
            config = config.with_max_stack_len(n);
        }
        config
    }
}
