//! rill virtual machine: register-file dispatch loop, call frames,
//! upvalue management, and the host embedding surface.

pub mod arith;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod vm;

pub use error::{NativeError, VmError};
pub use vm::{NativeCtx, NativeFn, Vm};
