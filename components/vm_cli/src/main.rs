//! Corten bytecode VM CLI
//!
//! Entry point for the VM. Parses CLI arguments, sets up logging and
//! delegates to the Runtime for execution.

use clap::Parser as ClapParser;
use tracing_subscriber::EnvFilter;
use vm_cli::{Cli, CliError, Command, Runtime};

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::try_new(l).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Command::Run(args) => {
            let mut runtime = Runtime::new(args.vm_config(), args.eval_config());
            let report = match runtime.run_file(&args.program) {
                Ok(report) => report,
                Err(CliError::Io(e)) => {
                    eprintln!("Error: Could not read file '{}': {}", args.program.display(), e);
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = runtime.finish() {
                eprintln!("Error: {}", e);
            }
            if let Some(panic) = &report.panic {
                eprint!("{panic}");
            }
            if let Some(trace) = &report.trace {
                match serde_json::to_string_pretty(trace) {
                    Ok(json) => eprintln!("{json}"),
                    Err(e) => eprintln!("Error: {}", CliError::from(e)),
                }
            }
            std::process::exit(report.exit_code());
        }
    }
}
