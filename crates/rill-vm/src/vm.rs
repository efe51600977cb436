//! Interpreter state and the embedding surface.
//!
//! A `Vm` is one interpreter instance: a flat register file, a call
//! stack, the open-upvalue list, the global table, the native registry,
//! and the heap. Instances are independent; hosts wanting parallelism
//! create one per thread.
//!
//! Every register slot owns one reference to its current value:
//! [`Vm::set_reg`] retains the incoming value and releases the old one,
//! [`Vm::take_reg`] installs an already-owned value. All other
//! ownership points (globals, array slots, upvalue cells) follow the
//! same retain-incoming/release-outgoing rule.

use crate::dispatch;
use crate::error::{NativeError, VmError};
use crate::frame::Frame;
use indexmap::IndexMap;
use rill_compiler::compiler::CompileErrors;
use rill_core::heap::{GcIdx, Heap, UpVal, UpValLocation};
use rill_core::string::StrId;
use rill_core::value::{NativeId, Value};

/// Size of the flat register file.
pub const REGISTER_FILE_SIZE: usize = 256;
/// Maximum call depth.
pub const MAX_FRAMES: usize = 64;
/// Maximum number of registered native functions.
pub const MAX_NATIVES: usize = 64;

/// Context handed to a native function.
///
/// `args` holds exactly the call's arguments; absent arguments read as
/// `None` via [`NativeCtx::arg`]. The value a native returns must be
/// *owned*: freshly allocated, or explicitly retained if it aliases an
/// argument or other live value.
pub struct NativeCtx<'a> {
    pub args: &'a [Value],
    pub heap: &'a mut Heap,
}

impl<'a> NativeCtx<'a> {
    pub fn arg(&self, i: usize) -> Value {
        self.args.get(i).copied().unwrap_or(Value::None)
    }

    /// Intern `bytes` and return an owned string value.
    pub fn make_str(&mut self, bytes: &[u8]) -> Value {
        let id = self.heap.strings.intern(bytes);
        self.heap.strings.retain(id);
        Value::Str(id)
    }
}

pub type NativeFn = fn(&mut NativeCtx) -> Result<Value, NativeError>;

pub struct Vm {
    pub regs: Vec<Value>,
    pub frames: Vec<Frame>,
    /// Open upvalues, sorted by register slot descending so closing
    /// everything at or above a slot is a prefix operation.
    pub open_upvals: Vec<(usize, GcIdx<UpVal>)>,
    pub globals: IndexMap<StrId, Value>,
    pub natives: Vec<(StrId, NativeFn)>,
    pub heap: Heap,
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            regs: vec![Value::None; REGISTER_FILE_SIZE],
            frames: Vec::new(),
            open_upvals: Vec::new(),
            globals: IndexMap::new(),
            natives: Vec::new(),
            heap: Heap::new(),
        }
    }

    // ---- Register ownership ----

    /// Store a borrowed value: retain it, release what the slot held.
    /// Retain-before-release keeps a self-assignment alive.
    pub fn set_reg(&mut self, slot: usize, val: Value) {
        let old = self.regs[slot];
        self.heap.retain(val);
        self.regs[slot] = val;
        self.heap.release(old);
    }

    /// Store an owned value (fresh allocation or transferred result)
    /// without an extra retain.
    pub fn take_reg(&mut self, slot: usize, val: Value) {
        let old = self.regs[slot];
        self.regs[slot] = val;
        self.heap.release(old);
    }

    // ---- Open upvalues ----

    /// Find the open upvalue for a register slot, or splice a new cell
    /// into the slot-descending list. The list holds one reference to
    /// every open cell; callers retain separately for each closure that
    /// shares it.
    pub fn capture_upvalue(&mut self, slot: usize) -> GcIdx<UpVal> {
        let pos = self.open_upvals.partition_point(|&(s, _)| s > slot);
        if let Some(&(s, uv)) = self.open_upvals.get(pos) {
            if s == slot {
                return uv;
            }
        }
        let uv = self.heap.alloc_upval(UpValLocation::Open(slot));
        self.open_upvals.insert(pos, (slot, uv));
        uv
    }

    /// Close every open upvalue at or above `level`: copy the register
    /// value into the cell (retaining it), flip the cell to closed, and
    /// drop the list's reference. Closing is idempotent and O(k) in the
    /// number of cells actually closed.
    pub fn close_upvalues(&mut self, level: usize) {
        while let Some(&(slot, uv)) = self.open_upvals.first() {
            if slot < level {
                break;
            }
            self.open_upvals.remove(0);
            let val = self.regs[slot];
            self.heap.retain(val);
            self.heap.get_upval_mut(uv).location = UpValLocation::Closed(val);
            self.heap.release_upval(uv);
        }
    }

    /// Read through an upvalue cell.
    pub fn upval_get(&self, uv: GcIdx<UpVal>) -> Value {
        match self.heap.get_upval(uv).location {
            UpValLocation::Open(slot) => self.regs[slot],
            UpValLocation::Closed(val) => val,
        }
    }

    /// Write through an upvalue cell. An open cell writes the register
    /// (which owns the value); a closed cell owns its storage directly.
    pub fn upval_set(&mut self, uv: GcIdx<UpVal>, val: Value) {
        match self.heap.get_upval(uv).location {
            UpValLocation::Open(slot) => self.set_reg(slot, val),
            UpValLocation::Closed(old) => {
                self.heap.retain(val);
                self.heap.get_upval_mut(uv).location = UpValLocation::Closed(val);
                self.heap.release(old);
            }
        }
    }

    // ---- Natives and globals ----

    /// Register a named native. A full registry is reported and the
    /// registration ignored.
    pub fn register_native(&mut self, name: &str, func: NativeFn) {
        if self.natives.len() >= MAX_NATIVES {
            log::error!("too many native functions (dropping '{name}')");
            return;
        }
        let id = self.heap.strings.intern(name.as_bytes());
        self.natives.push((id, func));
    }

    pub fn find_native(&self, name: StrId) -> Option<NativeId> {
        self.natives
            .iter()
            .position(|&(n, _)| n == name)
            .map(|i| NativeId(i as u32))
    }

    /// Insert or overwrite a global: retains the new value, releases
    /// any previous one, and retains the name on first insert. Both the
    /// `STORE_GLOBAL` opcode and the host `set_global` go through here.
    pub fn set_global_value(&mut self, name: StrId, val: Value) {
        self.heap.retain(val);
        if let Some(slot) = self.globals.get_mut(&name) {
            let old = *slot;
            *slot = val;
            self.heap.release(old);
        } else {
            self.heap.strings.retain(name);
            self.globals.insert(name, val);
        }
    }

    pub fn set_global(&mut self, name: &str, val: Value) {
        let id = self.heap.strings.intern(name.as_bytes());
        self.set_global_value(id, val);
    }

    /// Read a global by name; missing names read as `None`. The
    /// returned value is borrowed — retain it before storing it
    /// anywhere that owns.
    pub fn get_global(&self, name: &str) -> Value {
        match self.heap.strings.lookup(name.as_bytes()) {
            Some(id) => self.globals.get(&id).copied().unwrap_or(Value::None),
            None => Value::None,
        }
    }

    // ---- Compile and run ----

    /// Compile `source` and, on success, push a ready-to-run top-level
    /// frame. Repeated calls stack additional frames; `run` drains them
    /// all.
    pub fn compile(&mut self, source: &str) -> Result<(), CompileErrors> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(CompileErrors(vec![rill_compiler::CompileError {
                message: "too many pending top-level frames".to_string(),
                line: 0,
            }]));
        }
        let proto = rill_compiler::compile(source.as_bytes(), &mut self.heap.strings)?;
        let closure = self.heap.alloc_closure(proto.clone(), Vec::new());
        self.frames.push(Frame::new(closure, proto, 0, 0));
        Ok(())
    }

    /// Drive the dispatch loop until the frame stack empties or a
    /// runtime error stops execution (leaving the stack for teardown).
    pub fn run(&mut self) -> Result<(), VmError> {
        dispatch::execute(self)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
