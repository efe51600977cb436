//! Built-in native functions registered by the CLI host.
//!
//! These are deliberately thin: they reach the interpreter only through
//! the native-call surface (`NativeCtx`) like any other host function.

use rill_core::value::Value;
use rill_vm::{NativeCtx, NativeError, Vm};

fn native_print(ctx: &mut NativeCtx) -> Result<Value, NativeError> {
    let mut first = true;
    for &arg in ctx.args {
        if !first {
            print!(" ");
        }
        first = false;
        print!("{}", ctx.heap.display(arg));
    }
    println!();
    Ok(Value::None)
}

fn native_len(ctx: &mut NativeCtx) -> Result<Value, NativeError> {
    match ctx.arg(0) {
        Value::Array(idx) => Ok(Value::Int(ctx.heap.get_array(idx).items.len() as i32)),
        _ => Ok(Value::Int(0)),
    }
}

fn native_assert(ctx: &mut NativeCtx) -> Result<Value, NativeError> {
    if ctx.args.is_empty() || ctx.arg(0).is_falsy() {
        let mut message = String::from("assertion failed");
        if let Value::Str(id) = ctx.arg(1) {
            message.push_str(": ");
            message.push_str(&ctx.heap.strings.get_str(id));
        }
        return Err(NativeError(message));
    }
    Ok(Value::None)
}

fn native_type_of(ctx: &mut NativeCtx) -> Result<Value, NativeError> {
    let name = ctx.arg(0).type_name().as_bytes().to_vec();
    Ok(ctx.make_str(&name))
}

fn native_str(ctx: &mut NativeCtx) -> Result<Value, NativeError> {
    let text = match ctx.arg(0) {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::None => "None".to_string(),
        _ => "<object>".to_string(),
    };
    Ok(ctx.make_str(text.as_bytes()))
}

fn native_abs(ctx: &mut NativeCtx) -> Result<Value, NativeError> {
    match ctx.arg(0) {
        Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        _ => Ok(Value::Int(0)),
    }
}

fn native_sqrt(ctx: &mut NativeCtx) -> Result<Value, NativeError> {
    match ctx.arg(0) {
        Value::Int(i) => Ok(Value::Float((i as f32).sqrt())),
        Value::Float(f) => Ok(Value::Float(f.sqrt())),
        _ => Ok(Value::Float(0.0)),
    }
}

fn native_floor(ctx: &mut NativeCtx) -> Result<Value, NativeError> {
    match ctx.arg(0) {
        Value::Float(f) => Ok(Value::Int(f.floor() as i32)),
        Value::Int(i) => Ok(Value::Int(i)),
        _ => Ok(Value::Int(0)),
    }
}

/// Register the standard host functions on a fresh interpreter.
pub fn register(vm: &mut Vm) {
    vm.register_native("print", native_print);
    vm.register_native("len", native_len);
    vm.register_native("assert", native_assert);
    vm.register_native("type_of", native_type_of);
    vm.register_native("str", native_str);
    vm.register_native("abs", native_abs);
    vm.register_native("sqrt", native_sqrt);
    vm.register_native("floor", native_floor);
}
