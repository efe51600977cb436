//! Bytecode dispatch loop.
//!
//! Executes the top frame's byte stream until the frame stack empties.
//! Operand bytes are window-relative register indices; jump offsets are
//! big-endian `i16`, relative to the byte after the offset. The ip is
//! written back to the frame as soon as an instruction's operands are
//! decoded, so `CALL` resumes the caller correctly.

use crate::arith::{self, ArithOp, CmpOp};
use crate::error::VmError;
use crate::frame::Frame;
use crate::vm::{NativeCtx, Vm, MAX_FRAMES, REGISTER_FILE_SIZE};
use rill_compiler::opcode::OpCode;
use rill_core::heap::{Array, GcIdx, IterState};
use rill_core::proto::Constant;
use rill_core::value::Value;

#[inline]
fn rb(code: &[u8], pc: &mut usize) -> usize {
    let v = code[*pc];
    *pc += 1;
    v as usize
}

#[inline]
fn rs16(code: &[u8], pc: &mut usize) -> i32 {
    let v = i16::from_be_bytes([code[*pc], code[*pc + 1]]);
    *pc += 2;
    v as i32
}

fn as_array(v: Value) -> Result<GcIdx<Array>, VmError> {
    match v {
        Value::Array(idx) => Ok(idx),
        _ => Err(VmError::Runtime(format!(
            "not an array (got {})",
            v.type_name()
        ))),
    }
}

fn as_iter(v: Value) -> Result<GcIdx<IterState>, VmError> {
    match v {
        Value::Iter(idx) => Ok(idx),
        _ => Err(VmError::Runtime(format!(
            "not an iterator (got {})",
            v.type_name()
        ))),
    }
}

fn array_index(v: Value, len: usize) -> Result<usize, VmError> {
    let idx = match v {
        Value::Int(i) => i,
        _ => {
            return Err(VmError::Runtime(format!(
                "array index must be an integer (got {})",
                v.type_name()
            )))
        }
    };
    if idx < 0 || idx as usize >= len {
        return Err(VmError::Runtime(format!(
            "array index out of bounds: {idx}"
        )));
    }
    Ok(idx as usize)
}

/// Return from the current frame with `result` (a borrowed register
/// value or `None`): close this frame's upvalues, pop it, release its
/// closure reference, and deliver the result to the caller's slot.
fn do_return(vm: &mut Vm, result: Value) {
    vm.heap.retain(result);
    let frame = vm.frames.pop().expect("returning without a frame");
    vm.close_upvalues(frame.base);
    vm.heap.release(Value::Closure(frame.closure));
    if vm.frames.is_empty() {
        vm.heap.release(result);
    } else {
        vm.take_reg(frame.ret_reg, result);
    }
}

/// Run until the frame stack empties. On error the stack is left as-is
/// for the host to tear down.
pub fn execute(vm: &mut Vm) -> Result<(), VmError> {
    while !vm.frames.is_empty() {
        let fi = vm.frames.len() - 1;
        let base = vm.frames[fi].base;
        let proto = vm.frames[fi].proto.clone();
        let code = &proto.code;
        let mut pc = vm.frames[fi].ip;

        if pc >= code.len() {
            // The compiler always terminates code with RET; a stacked
            // chunk that somehow fell off the end returns none.
            do_return(vm, Value::None);
            continue;
        }

        let byte = code[pc];
        pc += 1;
        let op = OpCode::from_u8(byte)
            .ok_or_else(|| VmError::Runtime(format!("unknown opcode: {byte}")))?;

        match op {
            OpCode::Nop => {
                vm.frames[fi].ip = pc;
            }

            OpCode::LoadConst => {
                let k = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let val = match proto.constants.get(k) {
                    Some(Constant::None) => Value::None,
                    Some(Constant::Bool(b)) => Value::Bool(*b),
                    Some(Constant::Int(i)) => Value::Int(*i),
                    Some(Constant::Float(f)) => Value::Float(*f),
                    Some(Constant::Str(id)) => Value::Str(*id),
                    Some(Constant::Proto(_)) | None => {
                        return Err(VmError::Runtime(format!("malformed constant {k}")))
                    }
                };
                vm.set_reg(base + d, val);
            }

            OpCode::LoadLocal | OpCode::Move => {
                let s = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                vm.set_reg(base + d, vm.regs[base + s]);
            }

            OpCode::StoreLocal => {
                let i = rb(code, &mut pc);
                let s = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                vm.set_reg(base + i, vm.regs[base + s]);
            }

            OpCode::LoadUpval => {
                let u = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let closure = vm.frames[fi].closure;
                let uv = *vm
                    .heap
                    .get_closure(closure)
                    .upvalues
                    .get(u)
                    .ok_or_else(|| VmError::Runtime(format!("invalid upvalue index {u}")))?;
                let val = vm.upval_get(uv);
                vm.set_reg(base + d, val);
            }

            OpCode::StoreUpval => {
                let u = rb(code, &mut pc);
                let s = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let closure = vm.frames[fi].closure;
                let uv = *vm
                    .heap
                    .get_closure(closure)
                    .upvalues
                    .get(u)
                    .ok_or_else(|| VmError::Runtime(format!("invalid upvalue index {u}")))?;
                vm.upval_set(uv, vm.regs[base + s]);
            }

            OpCode::LoadGlobal => {
                let k = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let name = match proto.constants.get(k) {
                    Some(Constant::Str(id)) => *id,
                    _ => return Err(VmError::Runtime(format!("malformed constant {k}"))),
                };
                if let Some(&val) = vm.globals.get(&name) {
                    vm.set_reg(base + d, val);
                } else if let Some(native) = vm.find_native(name) {
                    vm.set_reg(base + d, Value::Native(native));
                } else {
                    return Err(VmError::Runtime(format!(
                        "undefined variable: {}",
                        vm.heap.strings.get_str(name)
                    )));
                }
            }

            OpCode::StoreGlobal => {
                let k = rb(code, &mut pc);
                let s = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let name = match proto.constants.get(k) {
                    Some(Constant::Str(id)) => *id,
                    _ => return Err(VmError::Runtime(format!("malformed constant {k}"))),
                };
                vm.set_global_value(name, vm.regs[base + s]);
            }

            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod => {
                let a = rb(code, &mut pc);
                let b = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let aop = match op {
                    OpCode::Add => ArithOp::Add,
                    OpCode::Sub => ArithOp::Sub,
                    OpCode::Mul => ArithOp::Mul,
                    OpCode::Div => ArithOp::Div,
                    _ => ArithOp::Mod,
                };
                let result = arith::arith(aop, vm.regs[base + a], vm.regs[base + b])?;
                vm.set_reg(base + d, result);
            }

            OpCode::Neg => {
                let s = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let result = arith::negate(vm.regs[base + s])?;
                vm.set_reg(base + d, result);
            }

            OpCode::Eq | OpCode::Ne => {
                let a = rb(code, &mut pc);
                let b = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let eq = vm.regs[base + a] == vm.regs[base + b];
                let result = if op == OpCode::Eq { eq } else { !eq };
                vm.set_reg(base + d, Value::Bool(result));
            }

            OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge => {
                let a = rb(code, &mut pc);
                let b = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let cop = match op {
                    OpCode::Lt => CmpOp::Lt,
                    OpCode::Le => CmpOp::Le,
                    OpCode::Gt => CmpOp::Gt,
                    _ => CmpOp::Ge,
                };
                let result = arith::compare(cop, vm.regs[base + a], vm.regs[base + b])?;
                vm.set_reg(base + d, Value::Bool(result));
            }

            OpCode::Jmp => {
                let off = rs16(code, &mut pc);
                let target = pc as i64 + off as i64;
                if target < 0 || target > code.len() as i64 {
                    return Err(VmError::Runtime("jump out of range".to_string()));
                }
                vm.frames[fi].ip = target as usize;
            }

            OpCode::JmpIf | OpCode::JmpIfNot => {
                let r = rb(code, &mut pc);
                let off = rs16(code, &mut pc);
                let truthy = vm.regs[base + r].is_truthy();
                let jump = if op == OpCode::JmpIf { truthy } else { !truthy };
                if jump {
                    let target = pc as i64 + off as i64;
                    if target < 0 || target > code.len() as i64 {
                        return Err(VmError::Runtime("jump out of range".to_string()));
                    }
                    pc = target as usize;
                }
                vm.frames[fi].ip = pc;
            }

            OpCode::Call => {
                let f = rb(code, &mut pc);
                let n = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;

                let func = vm.regs[base + f];
                match func {
                    Value::Native(id) => {
                        let args: Vec<Value> =
                            (0..n).map(|i| vm.regs[base + f + 1 + i]).collect();
                        let native = vm.natives[id.0 as usize].1;
                        let result = {
                            let mut ctx = NativeCtx {
                                args: &args,
                                heap: &mut vm.heap,
                            };
                            native(&mut ctx).map_err(|e| VmError::Runtime(e.0))?
                        };
                        // Natives return owned values.
                        vm.take_reg(base + d, result);
                    }
                    Value::Closure(idx) => {
                        if vm.frames.len() >= MAX_FRAMES {
                            return Err(VmError::StackOverflow);
                        }
                        let child_proto = vm.heap.get_closure(idx).proto.clone();
                        let max_regs = child_proto.max_regs as usize;
                        let new_base = base + f + 1;
                        if new_base + max_regs.max(n) > REGISTER_FILE_SIZE {
                            return Err(VmError::StackOverflow);
                        }
                        // The window past the arguments may hold stale
                        // values from dead frames; clear them.
                        for i in n..max_regs {
                            vm.set_reg(new_base + i, Value::None);
                        }
                        // The frame holds its own closure reference for
                        // the duration of the call.
                        vm.heap.retain(func);
                        vm.frames
                            .push(Frame::new(idx, child_proto, new_base, base + d));
                    }
                    _ => {
                        return Err(VmError::Runtime(format!(
                            "not a function (got {})",
                            func.type_name()
                        )));
                    }
                }
            }

            OpCode::Ret => {
                let n = rb(code, &mut pc);
                let result = if n > 0 {
                    let r = rb(code, &mut pc);
                    vm.regs[base + r]
                } else {
                    Value::None
                };
                vm.frames[fi].ip = pc;
                do_return(vm, result);
            }

            OpCode::Closure => {
                let k = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                let count = rb(code, &mut pc);
                let child = match proto.constants.get(k) {
                    Some(Constant::Proto(p)) => proto
                        .protos
                        .get(*p)
                        .cloned()
                        .ok_or_else(|| VmError::Runtime(format!("malformed prototype {p}")))?,
                    _ => return Err(VmError::Runtime(format!("malformed constant {k}"))),
                };
                let parent = vm.frames[fi].closure;
                let mut upvalues = Vec::with_capacity(count);
                for _ in 0..count {
                    let in_stack = rb(code, &mut pc) != 0;
                    let index = rb(code, &mut pc);
                    let uv = if in_stack {
                        vm.capture_upvalue(base + index)
                    } else {
                        *vm.heap
                            .get_closure(parent)
                            .upvalues
                            .get(index)
                            .ok_or_else(|| {
                                VmError::Runtime(format!("invalid upvalue index {index}"))
                            })?
                    };
                    // One reference per sharing closure.
                    vm.heap.retain_upval(uv);
                    upvalues.push(uv);
                }
                vm.frames[fi].ip = pc;
                let closure = vm.heap.alloc_closure(child, upvalues);
                vm.take_reg(base + d, Value::Closure(closure));
            }

            OpCode::CloseUpval => {
                let slot = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                vm.close_upvalues(base + slot);
            }

            OpCode::ArrayNew => {
                let cap = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let arr = vm.heap.alloc_array(cap);
                vm.take_reg(base + d, Value::Array(arr));
            }

            OpCode::ArrayGet => {
                let a = rb(code, &mut pc);
                let i = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let arr = as_array(vm.regs[base + a])?;
                let len = vm.heap.get_array(arr).items.len();
                let idx = array_index(vm.regs[base + i], len)?;
                let val = vm.heap.get_array(arr).items[idx];
                vm.set_reg(base + d, val);
            }

            OpCode::ArraySet => {
                let a = rb(code, &mut pc);
                let i = rb(code, &mut pc);
                let s = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let arr = as_array(vm.regs[base + a])?;
                let len = vm.heap.get_array(arr).items.len();
                let idx = array_index(vm.regs[base + i], len)?;
                vm.heap.array_set(arr, idx, vm.regs[base + s]);
            }

            OpCode::ArrayLen => {
                let a = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let arr = as_array(vm.regs[base + a])?;
                let len = vm.heap.get_array(arr).items.len();
                vm.set_reg(base + d, Value::Int(len as i32));
            }

            OpCode::ArrayPush => {
                let a = rb(code, &mut pc);
                let s = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let arr = as_array(vm.regs[base + a])?;
                vm.heap.array_push(arr, vm.regs[base + s]);
            }

            OpCode::IterNew => {
                let s = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                // The iterator retains its source before the (possibly
                // aliased) destination register is overwritten.
                let iter = vm.heap.alloc_iter(vm.regs[base + s]);
                vm.take_reg(base + d, Value::Iter(iter));
            }

            OpCode::IterNext => {
                let i = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let iter = as_iter(vm.regs[base + i])?;
                let val = vm.heap.iter_next(iter);
                vm.set_reg(base + d, val);
            }

            OpCode::IterHasNext => {
                let i = rb(code, &mut pc);
                let d = rb(code, &mut pc);
                vm.frames[fi].ip = pc;
                let iter = as_iter(vm.regs[base + i])?;
                let has = vm.heap.iter_has_next(iter);
                vm.set_reg(base + d, Value::Bool(has));
            }
        }
    }
    Ok(())
}
