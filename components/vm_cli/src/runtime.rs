//! Program loading and execution for the CLI
//!
//! The Runtime owns one [`Vm`], reads chunk files, runs them and renders the
//! outcome: result code, captured output, panic report and trace counters.

use std::fmt::Write as _;
use std::path::Path;

use bytecode_system::BytecodeChunk;
use core_types::{Panic, ResultCode};
use interpreter::{EvalConfig, Trace, Vm, VmConfig};
use tracing::{info, warn};

use crate::error::CliResult;

/// Outcome of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Terminal result code
    pub code: ResultCode,
    /// Lines printed by the program
    pub output: Vec<String>,
    /// Rendered panic, for `ResultCode::Panic`
    pub panic: Option<String>,
    /// Counters, when tracing was enabled
    pub trace: Option<Trace>,
}

impl RunReport {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

/// Loads and runs programs on a persistent VM
pub struct Runtime {
    vm: Vm,
}

impl Runtime {
    /// Create a runtime
    ///
    /// # Example
    /// ```
    /// use interpreter::{EvalConfig, VmConfig};
    /// use vm_cli::Runtime;
    ///
    /// let runtime = Runtime::new(VmConfig::default(), EvalConfig::default());
    /// assert!(runtime.vm().panic_payload().is_none());
    /// ```
    pub fn new(config: VmConfig, eval_config: EvalConfig) -> Self {
        Self {
            vm: Vm::new(config, eval_config),
        }
    }

    /// Read and validate a chunk file
    pub fn load_program(path: &Path) -> CliResult<BytecodeChunk> {
        let json = std::fs::read_to_string(path)?;
        Ok(BytecodeChunk::from_json(&json)?)
    }

    /// Run a chunk file
    ///
    /// # Errors
    /// Returns `CliError` if the file cannot be read or the VM rejects the program.
    /// Program failures are reported through [`RunReport::code`].
    pub fn run_file(&mut self, path: &Path) -> CliResult<RunReport> {
        let chunk = Self::load_program(path)?;
        info!(path = %path.display(), "running program");
        self.run_chunk(chunk)
    }

    /// Run an in-memory chunk
    pub fn run_chunk(&mut self, chunk: BytecodeChunk) -> CliResult<RunReport> {
        let code = self.vm.eval(chunk)?;
        let report = RunReport {
            code,
            output: self.vm.output().to_vec(),
            panic: self.panic_report(),
            trace: self.vm.config().trace.then(|| self.vm.trace()),
        };
        Ok(report)
    }

    /// Tear the VM down, returning how many objects were still alive
    pub fn finish(&mut self) -> CliResult<usize> {
        let cycles = self.vm.deinit()?;
        if !cycles.leaked.is_empty() {
            warn!(
                leaked = cycles.leaked.len(),
                groups = cycles.groups,
                "objects still alive after teardown"
            );
        }
        Ok(cycles.leaked.len())
    }

    /// Render the recorded panic with its stack trace
    pub fn panic_report(&self) -> Option<String> {
        let payload = self.vm.panic_payload()?;
        let message = match &payload.panic {
            Panic::UncaughtError(v) => format!("uncaught error: {}", self.vm.value_to_string(*v)),
            Panic::NativeThrow(v) => format!("uncaught error from native call: {}", self.vm.value_to_string(*v)),
            other => other.to_string(),
        };
        let mut out = format!("panic: {message}\n");
        for frame in &payload.frames {
            let _ = writeln!(out, "  at {frame}");
        }
        Some(out)
    }

    /// The VM
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// The VM, mutably
    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }
}
