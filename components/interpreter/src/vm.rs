//! The VM context object.
//!
//! A [`Vm`] owns everything an execution touches: the heap, the running
//! fiber's registers and stack, the symbol tables, the inline cache arena
//! and the panic payload. Every core operation takes it explicitly; there is
//! no global state.

use std::rc::Rc;

use bytecode_system::{BytecodeChunk, Local, OpKind};
use core_types::{
    CompactFrame, ObjectId, Panic, ResultCode, StackFrame, SymbolId, Value,
};
use memory_manager::{CycleReport, ExecState, Heap};
use tracing::{debug, error, trace};

use crate::config::{EvalConfig, VmConfig};
use crate::error::{Interrupt, PanicPayload, VmError};
use crate::inline_cache::InlineCaches;
use crate::natives::{NativeFn, NativeRegistry};
use crate::symbols::{FuncBinding, Symbols};
use crate::trace::Trace;

/// Slots addressable from one frame pointer
pub(crate) const LOCAL_WINDOW: usize = 256;

/// What the dispatch loop does after an instruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Flow {
    /// Continue at `exec.pc`
    Next,
    /// A host-entered frame returned this owned value
    Return(Value),
    /// The top-level program ended
    End,
}

/// A fiber being run, innermost last
#[derive(Debug, Clone, Copy)]
pub(crate) struct FiberLink {
    pub(crate) fiber: ObjectId,
    /// Host entries active when the fiber was resumed
    pub(crate) host_depth: usize,
}

/// A host re-entry into the dispatch loop
#[derive(Debug, Clone, Copy)]
pub(crate) struct HostEntry {
    /// Frame count before the host frame was pushed
    pub(crate) floor: usize,
    /// Fiber depth at entry
    pub(crate) fiber_depth: usize,
}

/// Bytecode virtual machine.
///
/// # Examples
///
/// ```
/// use bytecode_system::{BytecodeChunk, Opcode};
/// use core_types::{ResultCode, Value};
/// use interpreter::Vm;
///
/// let mut chunk = BytecodeChunk::new();
/// chunk.main_stack_size = 4;
/// chunk.emit(Opcode::ConstI8 { val: 2, dst: 1 });
/// chunk.emit(Opcode::ConstI8 { val: 3, dst: 2 });
/// chunk.emit(Opcode::AddInt { left: 1, right: 2, dst: 3 });
/// chunk.emit(Opcode::End);
///
/// let mut vm = Vm::default();
/// assert_eq!(vm.eval(chunk).unwrap(), ResultCode::Success);
/// assert_eq!(vm.local(3), Value::Integer(5));
/// ```
#[derive(Debug)]
pub struct Vm {
    pub(crate) config: VmConfig,
    pub(crate) eval_config: EvalConfig,
    pub(crate) heap: Heap,
    pub(crate) chunk: Rc<BytecodeChunk>,
    pub(crate) loaded: bool,
    pub(crate) exec: ExecState,
    pub(crate) fiber_stack: Vec<FiberLink>,
    pub(crate) host_entries: Vec<HostEntry>,
    /// First free slot for frames pushed by host calls
    pub(crate) host_base: u32,
    pub(crate) symbols: Symbols,
    pub(crate) natives: NativeRegistry,
    pub(crate) caches: InlineCaches,
    pub(crate) static_vars: Vec<Value>,
    /// Static string key of each field name, for map field access
    pub(crate) field_keys: Vec<Value>,
    pub(crate) panic: Option<PanicPayload>,
    panic_reserved: usize,
    pub(crate) throw_trace: Vec<CompactFrame>,
    pub(crate) pending_trace: Option<Vec<CompactFrame>>,
    pub(crate) throw_from_native: bool,
    pub(crate) trace: Trace,
    output: Vec<String>,
    last_result: Option<ResultCode>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmConfig::default(), EvalConfig::default())
    }
}

impl Vm {
    /// Create a VM with builtin natives and no program
    pub fn new(config: VmConfig, eval_config: EvalConfig) -> Self {
        Self {
            heap: Heap::new(config.heap),
            exec: ExecState::with_stack_len(config.initial_stack_len.max(LOCAL_WINDOW)),
            config,
            eval_config,
            chunk: Rc::new(BytecodeChunk::new()),
            loaded: false,
            fiber_stack: Vec::new(),
            host_entries: Vec::new(),
            host_base: 0,
            symbols: Symbols::default(),
            natives: NativeRegistry::with_builtins(),
            caches: InlineCaches::default(),
            static_vars: Vec::new(),
            field_keys: Vec::new(),
            panic: None,
            panic_reserved: 0,
            throw_trace: Vec::new(),
            pending_trace: None,
            throw_from_native: false,
            trace: Trace::default(),
            output: Vec::new(),
            last_result: None,
        }
    }

    /// Register a native before loading the program that names it
    pub fn register_native(&mut self, name: &str, num_params: u8, func: NativeFn) -> u32 {
        let idx = self.natives.register(name, num_params, func);
        self.symbols.bump_generation();
        idx
    }

    /// Install a program.
    ///
    /// With `reload` enabled, static variables and rebound function symbols
    /// whose names survive into the new program keep their values.
    pub fn load(&mut self, chunk: BytecodeChunk) -> Result<(), VmError> {
        chunk.validate()?;
        let mut chunk = chunk;
        let names = chunk.field_names.clone();
        let field_keys: Vec<Value> = names.iter().map(|n| chunk.intern_str(n)).collect();
        let mut symbols = Symbols::load(&chunk, &self.natives)?;
        let keep = self.eval_config.reload && self.loaded;

        let old_statics = std::mem::take(&mut self.static_vars);
        let mut carried: Vec<(String, Value)> = self
            .chunk
            .static_vars
            .iter()
            .map(|d| d.name.clone())
            .zip(old_statics)
            .collect();
        let mut statics = Vec::with_capacity(chunk.static_vars.len());
        for decl in &chunk.static_vars {
            let kept = if keep {
                carried
                    .iter()
                    .position(|(n, _)| *n == decl.name)
                    .map(|i| carried.swap_remove(i).1)
            } else {
                None
            };
            let init = decl
                .init
                .and_then(|idx| chunk.constant(idx))
                .unwrap_or_default();
            statics.push(kept.unwrap_or(init));
        }
        for (_, v) in carried {
            self.heap.release(v)?;
        }

        for (name, v) in self.symbols.take_bound_values() {
            match symbols.func_id(&name) {
                Some(id) if keep => {
                    symbols.rebind(id, FuncBinding::Value(v));
                }
                _ => self.heap.release(v)?,
            }
        }
        symbols.bump_generation();
        self.clear_panic()?;

        debug!(
            instructions = chunk.len(),
            funcs = chunk.funcs.len(),
            reload = keep,
            "program loaded"
        );
        self.caches = InlineCaches::new(chunk.len());
        self.exec = ExecState::with_stack_len(
            self.config
                .initial_stack_len
                .max(LOCAL_WINDOW + chunk.main_stack_size as usize),
        );
        self.fiber_stack.clear();
        self.host_entries.clear();
        self.host_base = chunk.main_stack_size as u32;
        self.static_vars = statics;
        self.field_keys = field_keys;
        self.symbols = symbols;
        self.chunk = Rc::new(chunk);
        self.loaded = true;
        Ok(())
    }

    /// Run the loaded program from its first instruction.
    ///
    /// Never panics; every failure is encoded in the returned code plus the
    /// payload behind [`Vm::panic_payload`].
    pub fn execute(&mut self) -> ResultCode {
        if !self.loaded {
            error!("execute called without a program");
            return ResultCode::Unknown;
        }
        if let Err(e) = self.clear_panic() {
            error!(error = %e, "stale panic payload");
        }
        self.throw_trace.clear();
        self.pending_trace = None;
        self.throw_from_native = false;
        self.reset_fibers();
        self.host_entries.clear();
        self.host_base = self.chunk.main_stack_size as u32;
        self.exec.pc = 0;
        self.exec.fp = 0;
        self.exec.frames.clear();
        self.exec.try_frames.clear();

        let code = match self.run() {
            Ok(_) => ResultCode::Success,
            Err(i) => self.fail(i),
        };
        debug!(?code, "execution finished");
        self.last_result = Some(code);
        code
    }

    /// Load and run a program
    pub fn eval(&mut self, chunk: BytecodeChunk) -> Result<ResultCode, VmError> {
        self.load(chunk)?;
        Ok(self.execute())
    }

    fn fail(&mut self, interrupt: Interrupt) -> ResultCode {
        match interrupt {
            Interrupt::Panic(p) => {
                self.set_panic(p);
                ResultCode::Panic
            }
            Interrupt::Throw(v) => {
                self.set_panic(Panic::UncaughtError(v));
                ResultCode::Panic
            }
            Interrupt::StackOverflow => ResultCode::StackOverflow,
            Interrupt::OutOfMemory => ResultCode::OutOfMemory,
            Interrupt::Fatal(e) => {
                error!(error = %e, "heap invariant violated");
                self.set_panic(Panic::Msg(e.to_string()));
                ResultCode::Unknown
            }
        }
    }

    /// Record the payload of a failed execution.
    ///
    /// The trace and message are accounted on the heap. If that reservation
    /// fails the payload becomes [`Panic::InflightOom`] and the original
    /// error value is released.
    pub(crate) fn set_panic(&mut self, panic: Panic) {
        let compact = match self.pending_trace.take() {
            Some(frames) => frames,
            None => self.capture_trace(),
        };
        let bytes = compact.len() * std::mem::size_of::<StackFrame>() + panic.to_string().len();
        match self.heap.reserve_external(bytes) {
            Ok(()) => {
                self.panic_reserved = bytes;
                let frames = self.symbolize(&compact);
                self.panic = Some(PanicPayload { panic, frames });
            }
            Err(e) => {
                debug!(error = %e, "out of memory while building panic");
                if let Some(v) = panic.error_value() {
                    if let Err(e) = self.heap.release(v) {
                        error!(error = %e, "releasing masked error value");
                    }
                }
                self.panic = Some(PanicPayload {
                    panic: Panic::InflightOom,
                    frames: Vec::new(),
                });
            }
        }
    }

    fn clear_panic(&mut self) -> Result<(), VmError> {
        self.heap.unreserve_external(self.panic_reserved);
        self.panic_reserved = 0;
        if let Some(payload) = self.panic.take() {
            if let Some(v) = payload.panic.error_value() {
                self.heap.release(v)?;
            }
        }
        Ok(())
    }

    /// Compact frames of the running fiber, innermost first
    pub(crate) fn capture_trace(&self) -> Vec<CompactFrame> {
        let mut out = vec![CompactFrame {
            pc: self.exec.pc,
            fp: self.exec.fp,
        }];
        out.extend(self.exec.frames.iter().rev().map(|f| CompactFrame {
            pc: f.call_pc,
            fp: f.prev_fp,
        }));
        out
    }

    /// Resolve compact frames against the debug table
    pub fn symbolize(&self, frames: &[CompactFrame]) -> Vec<StackFrame> {
        frames
            .iter()
            .map(|f| {
                let sym = if self.eval_config.gen_all_debug_syms {
                    self.chunk.debug.lookup_exact(f.pc)
                } else {
                    self.chunk.debug.lookup_nearest(f.pc)
                };
                let function_name = sym
                    .and_then(|s| s.func)
                    .and_then(|id| self.chunk.funcs.get(id as usize))
                    .map(|d| d.name.clone());
                StackFrame {
                    function_name,
                    source_url: self.chunk.source_url.clone(),
                    line: sym.map(|s| s.pos.line).unwrap_or_default(),
                    column: sym.map(|s| s.pos.column).unwrap_or_default(),
                    pc: f.pc,
                }
            })
            .collect()
    }

    /// Tear down persistent state and report what is left alive.
    ///
    /// In single-run mode nothing is released one by one; the heap is
    /// simply emptied.
    pub fn deinit(&mut self) -> Result<CycleReport, VmError> {
        if self.eval_config.single_run {
            self.panic = None;
            self.heap.force_release_all();
            return Ok(CycleReport::default());
        }
        self.clear_panic()?;
        for v in std::mem::take(&mut self.static_vars) {
            self.heap.release(v)?;
        }
        for (_, v) in self.symbols.take_bound_values() {
            self.heap.release(v)?;
        }
        let report = self.heap.cycle_report();
        self.heap.force_release_all();
        Ok(report)
    }

    /// Heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable heap
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Interpreter configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Evaluation options
    pub fn eval_config(&self) -> &EvalConfig {
        &self.eval_config
    }

    /// Loaded program
    pub fn chunk(&self) -> &BytecodeChunk {
        &self.chunk
    }

    pub(crate) fn chunk_rc(&self) -> Rc<BytecodeChunk> {
        Rc::clone(&self.chunk)
    }

    /// Symbol tables
    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    /// Inline cache arena
    pub fn caches(&self) -> &InlineCaches {
        &self.caches
    }

    /// Payload of the last panic
    pub fn panic_payload(&self) -> Option<&PanicPayload> {
        self.panic.as_ref()
    }

    /// Code of the last execution
    pub fn last_result(&self) -> Option<ResultCode> {
        self.last_result
    }

    /// Lines written by `print`
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub(crate) fn print_line(&mut self, line: String) {
        if self.config.echo_print {
            println!("{line}");
        }
        self.output.push(line);
    }

    /// Counters gathered so far
    pub fn trace(&self) -> Trace {
        let mut t = self.trace.clone();
        t.rc = *self.heap.counters();
        t.ic_hits = self.caches.hits();
        t.ic_misses = self.caches.misses();
        t
    }

    /// Current value of a static variable by name
    pub fn static_var(&self, name: &str) -> Option<Value> {
        let idx = self.chunk.static_vars.iter().position(|d| d.name == name)?;
        self.static_vars.get(idx).copied()
    }

    /// Value in a local of the current frame
    #[inline]
    pub fn local(&self, l: Local) -> Value {
        self.exec.stack[self.slot(l)]
    }

    #[inline]
    pub(crate) fn slot(&self, l: Local) -> usize {
        self.exec.fp as usize + l as usize
    }

    #[inline]
    pub(crate) fn set_local(&mut self, l: Local, v: Value) {
        let i = self.slot(l);
        self.exec.stack[i] = v;
    }

    #[inline]
    pub(crate) fn take_local(&mut self, l: Local) -> Value {
        let i = self.slot(l);
        std::mem::take(&mut self.exec.stack[i])
    }

    pub(crate) fn release_local(&mut self, l: Local) -> Result<(), Interrupt> {
        let v = self.take_local(l);
        Ok(self.heap.release(v)?)
    }

    /// Release the locals of the current frame registered at `pc`
    pub(crate) fn release_set_at(&mut self, pc: u32) -> Result<(), Interrupt> {
        let chunk = self.chunk_rc();
        for l in chunk.release_set(pc) {
            self.release_local(*l)?;
        }
        Ok(())
    }

    /// Make room for a frame of `stack_size` locals at `fp`
    pub(crate) fn ensure_frame(&mut self, fp: u32, stack_size: u8) -> Result<(), Interrupt> {
        let need = fp as usize + stack_size as usize;
        if need > self.config.max_stack_len || self.exec.frames.len() >= self.config.max_stack_len {
            return Err(Interrupt::StackOverflow);
        }
        let physical = fp as usize + LOCAL_WINDOW;
        if self.exec.stack.len() < physical {
            let mut len = self.exec.stack.len().max(LOCAL_WINDOW);
            while len < physical {
                len *= 2;
            }
            debug!(from = self.exec.stack.len(), to = len, "stack grew");
            self.exec.stack.resize(len, Value::None);
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn count(&mut self, kind: OpKind) {
        if self.config.trace {
            trace!(?kind, pc = self.exec.pc, "op");
            self.trace.record(kind);
        }
    }

    /// Text of a string value, static or heap allocated
    pub fn str_of(&self, v: Value) -> Option<&str> {
        match v {
            Value::StaticAstring(_) | Value::StaticUstring(_) => self.chunk.str_of(v),
            Value::Heap(_) => self.heap.str_of(v),
            _ => None,
        }
    }

    /// Catchable error value for a symbol
    pub fn throw_error(&self, sym: SymbolId) -> Interrupt {
        Interrupt::Throw(Value::Error(sym))
    }

    /// `error.InvalidArgument`
    pub fn throw_invalid_argument(&self) -> Interrupt {
        self.throw_error(self.symbols.errors().invalid_argument)
    }

    /// `error.OutOfBounds`
    pub fn throw_out_of_bounds(&self) -> Interrupt {
        self.throw_error(self.symbols.errors().out_of_bounds)
    }
}
