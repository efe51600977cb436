//! Bytecode disassembler, for tests and `RILL_DUMP=1`.

use crate::opcode::OpCode;
use rill_core::proto::{Constant, Proto};
use rill_core::string::StringInterner;
use std::fmt::Write;

/// Render a prototype (and its nested prototypes) as one instruction
/// per line.
pub fn disassemble(proto: &Proto, name: &str, strings: &StringInterner) -> String {
    let mut out = String::new();
    disasm_into(proto, name, strings, &mut out);
    out
}

fn disasm_into(proto: &Proto, name: &str, strings: &StringInterner, out: &mut String) {
    let _ = writeln!(
        out,
        "== {} (arity {}, regs {}, upvalues {}) ==",
        name,
        proto.arity,
        proto.max_regs,
        proto.upvalues.len()
    );

    let code = &proto.code;
    let mut pc = 0;
    while pc < code.len() {
        let at = pc;
        let op = match OpCode::from_u8(code[pc]) {
            Some(op) => op,
            None => {
                let _ = writeln!(out, "{at:04}  ??? {}", code[pc]);
                pc += 1;
                continue;
            }
        };
        pc += 1;
        let _ = write!(out, "{at:04}  {:<14}", op.name());

        match op {
            OpCode::Nop => {}
            OpCode::LoadConst => {
                let k = code[pc] as usize;
                let d = code[pc + 1];
                pc += 2;
                let _ = write!(out, "k{k} r{d}    ; {}", fmt_constant(proto, k, strings));
            }
            OpCode::LoadGlobal | OpCode::StoreGlobal => {
                let k = code[pc] as usize;
                let r = code[pc + 1];
                pc += 2;
                let _ = write!(out, "k{k} r{r}    ; {}", fmt_constant(proto, k, strings));
            }
            OpCode::LoadLocal
            | OpCode::StoreLocal
            | OpCode::Move
            | OpCode::Neg
            | OpCode::ArrayNew
            | OpCode::ArrayLen
            | OpCode::ArrayPush
            | OpCode::IterNew
            | OpCode::IterNext
            | OpCode::IterHasNext => {
                let a = code[pc];
                let b = code[pc + 1];
                pc += 2;
                let _ = write!(out, "{a} {b}");
            }
            OpCode::LoadUpval | OpCode::StoreUpval => {
                let u = code[pc];
                let r = code[pc + 1];
                pc += 2;
                let _ = write!(out, "u{u} r{r}");
            }
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge
            | OpCode::ArrayGet
            | OpCode::ArraySet
            | OpCode::Call => {
                let a = code[pc];
                let b = code[pc + 1];
                let c = code[pc + 2];
                pc += 3;
                let _ = write!(out, "{a} {b} {c}");
            }
            OpCode::Jmp => {
                let off = proto.read_short(pc);
                pc += 2;
                let _ = write!(out, "{off:+}    ; -> {:04}", pc as i64 + off as i64);
            }
            OpCode::JmpIf | OpCode::JmpIfNot => {
                let r = code[pc];
                let off = proto.read_short(pc + 1);
                pc += 3;
                let _ = write!(out, "r{r} {off:+}    ; -> {:04}", pc as i64 + off as i64);
            }
            OpCode::Ret => {
                let n = code[pc];
                pc += 1;
                if n > 0 {
                    let r = code[pc];
                    pc += 1;
                    let _ = write!(out, "1 r{r}");
                } else {
                    let _ = write!(out, "0");
                }
            }
            OpCode::Closure => {
                let k = code[pc] as usize;
                let d = code[pc + 1];
                let count = code[pc + 2] as usize;
                pc += 3;
                let _ = write!(out, "k{k} r{d} u{count}");
                for _ in 0..count {
                    let in_stack = code[pc];
                    let index = code[pc + 1];
                    pc += 2;
                    let _ = write!(
                        out,
                        " ({} {})",
                        if in_stack != 0 { "local" } else { "upval" },
                        index
                    );
                }
            }
            OpCode::CloseUpval => {
                let slot = code[pc];
                pc += 1;
                let _ = write!(out, "r{slot}");
            }
        }
        let _ = writeln!(out);
    }

    for (i, child) in proto.protos.iter().enumerate() {
        let child_name = match child.name {
            Some(id) => strings.get_str(id).into_owned(),
            None => format!("{name}.p{i}"),
        };
        let _ = writeln!(out);
        disasm_into(child, &child_name, strings, out);
    }
}

fn fmt_constant(proto: &Proto, k: usize, strings: &StringInterner) -> String {
    match proto.constants.get(k) {
        Some(Constant::None) => "None".to_string(),
        Some(Constant::Bool(b)) => b.to_string(),
        Some(Constant::Int(i)) => i.to_string(),
        Some(Constant::Float(f)) => f.to_string(),
        Some(Constant::Str(id)) => format!("\"{}\"", strings.get_str(*id)),
        Some(Constant::Proto(p)) => format!("<proto {p}>"),
        None => "<bad constant>".to_string(),
    }
}
