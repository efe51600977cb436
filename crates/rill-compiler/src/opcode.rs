//! Bytecode instruction set.
//!
//! Instructions are byte-encoded: a one-byte opcode followed by
//! opcode-specific operand bytes. Register operands are indices relative
//! to the executing frame's base. Jump opcodes carry a big-endian signed
//! 16-bit offset, relative to the byte immediately after the offset.
//! `CLOSURE` and `RET` are variable-length.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Nop = 0,
    /// k, d: R[d] <- constants[k]
    LoadConst,
    /// i, d: R[d] <- R[i]
    LoadLocal,
    /// i, s: R[i] <- R[s]
    StoreLocal,
    /// s, d: R[d] <- R[s]
    Move,
    /// u, d: R[d] <- upvalue cell u
    LoadUpval,
    /// u, s: upvalue cell u <- R[s]
    StoreUpval,
    /// k, d: R[d] <- globals[constants[k]], falling back to the native
    /// registry
    LoadGlobal,
    /// k, s: globals[constants[k]] <- R[s]
    StoreGlobal,
    /// a, b, d
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// s, d
    Neg,
    /// a, b, d
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// off16
    Jmp,
    /// r, off16
    JmpIf,
    JmpIfNot,
    /// f, n, d
    Call,
    /// n [, r]
    Ret,
    /// k, d, u, (is_local, index) * u
    Closure,
    /// i: close open upvalues at or above slot i
    CloseUpval,
    /// cap, d
    ArrayNew,
    /// a, i, d
    ArrayGet,
    /// a, i, s
    ArraySet,
    /// a, d
    ArrayLen,
    /// a, s
    ArrayPush,
    /// s, d
    IterNew,
    /// it, d
    IterNext,
    IterHasNext,
}

impl OpCode {
    pub const COUNT: usize = 36;

    pub fn from_u8(val: u8) -> Option<OpCode> {
        if (val as usize) < Self::COUNT {
            // Safety: OpCode is repr(u8), dense from 0, and the range is
            // checked above.
            Some(unsafe { std::mem::transmute::<u8, OpCode>(val) })
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        use OpCode::*;
        match self {
            Nop => "NOP",
            LoadConst => "LOAD_CONST",
            LoadLocal => "LOAD_LOCAL",
            StoreLocal => "STORE_LOCAL",
            Move => "MOVE",
            LoadUpval => "LOAD_UPVAL",
            StoreUpval => "STORE_UPVAL",
            LoadGlobal => "LOAD_GLOBAL",
            StoreGlobal => "STORE_GLOBAL",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Neg => "NEG",
            Eq => "EQ",
            Ne => "NE",
            Lt => "LT",
            Le => "LE",
            Gt => "GT",
            Ge => "GE",
            Jmp => "JMP",
            JmpIf => "JMP_IF",
            JmpIfNot => "JMP_IF_NOT",
            Call => "CALL",
            Ret => "RET",
            Closure => "CLOSURE",
            CloseUpval => "CLOSE_UPVAL",
            ArrayNew => "ARRAY_NEW",
            ArrayGet => "ARRAY_GET",
            ArraySet => "ARRAY_SET",
            ArrayLen => "ARRAY_LEN",
            ArrayPush => "ARRAY_PUSH",
            IterNew => "ITER_NEW",
            IterNext => "ITER_NEXT",
            IterHasNext => "ITER_HAS_NEXT",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
