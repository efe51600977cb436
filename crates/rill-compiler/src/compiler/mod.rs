//! AST → bytecode compiler.
//!
//! One `FuncState` per nested function, stacked so name resolution can
//! walk outward: local in the current function, then upvalue (marking
//! the enclosing local as captured), then global. Diagnostics are
//! collected rather than short-circuiting so a single pass reports as
//! many errors as it can; any collected diagnostic fails the compile.
//! The host-policy locals limit is logged, the offending declaration is
//! dropped, and compilation proceeds; a capture past the upvalue cap is
//! a collected error instead, because no placeholder descriptor index
//! exists that does not alias another cell.

pub mod scope;

use crate::ast::{AssignTarget, BinOp, Expr, ExprKind, LambdaBody, Stmt, StmtKind, UnOp};
use crate::opcode::OpCode;
use crate::parser;
use rill_core::proto::{Constant, Proto, UpvalDesc};
use rill_core::string::{StrId, StringInterner};
use scope::{FuncScope, LoopCtx, MAX_UPVALUES};
use std::fmt;
use std::rc::Rc;

/// A compile-time diagnostic with its source line.
#[derive(Clone, Debug)]
pub struct CompileError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] error: {}", self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Every diagnostic collected by one compile call.
#[derive(Clone, Debug)]
pub struct CompileErrors(pub Vec<CompileError>);

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

struct FuncState {
    proto: Proto,
    scope: FuncScope,
    upvalues: Vec<UpvalDesc>,
}

impl FuncState {
    fn new(name: Option<StrId>) -> Self {
        let mut proto = Proto::new();
        proto.name = name;
        FuncState {
            proto,
            scope: FuncScope::new(),
            upvalues: Vec::new(),
        }
    }
}

enum FnBody<'a> {
    Expr(&'a Expr),
    Block(&'a [Stmt]),
}

pub struct Compiler<'a> {
    strings: &'a mut StringInterner,
    func_stack: Vec<FuncState>,
    errors: Vec<CompileError>,
}

/// Compile a source buffer into a top-level prototype.
///
/// Lexer and parser errors fail the compile immediately; compiler
/// diagnostics are collected across the whole program first.
pub fn compile(source: &[u8], strings: &mut StringInterner) -> Result<Rc<Proto>, CompileErrors> {
    let (program, parse_errors) = parser::parse(source, strings);
    if !parse_errors.is_empty() {
        return Err(CompileErrors(parse_errors));
    }

    let main_name = strings.intern(b"<main>");
    let mut compiler = Compiler {
        strings,
        func_stack: vec![FuncState::new(Some(main_name))],
        errors: Vec::new(),
    };
    for stmt in &program {
        compiler.stmt(stmt);
    }
    compiler.emit_op(OpCode::Ret);
    compiler.emit_byte(0);

    let mut fs = compiler.func_stack.pop().expect("top-level function state");
    fs.proto.upvalues = fs.upvalues;
    fs.proto.max_regs = fs.scope.max_reg;

    if compiler.errors.is_empty() {
        Ok(Rc::new(fs.proto))
    } else {
        Err(CompileErrors(compiler.errors))
    }
}

impl<'a> Compiler<'a> {
    fn fs(&self) -> &FuncState {
        self.func_stack.last().expect("function state")
    }

    fn fs_mut(&mut self) -> &mut FuncState {
        self.func_stack.last_mut().expect("function state")
    }

    fn error(&mut self, message: impl Into<String>, line: u32) {
        self.errors.push(CompileError {
            message: message.into(),
            line,
        });
    }

    // ---- Emission ----

    fn emit_op(&mut self, op: OpCode) {
        self.fs_mut().proto.emit_byte(op as u8);
    }

    fn emit_byte(&mut self, byte: u8) {
        self.fs_mut().proto.emit_byte(byte);
    }

    fn code_len(&self) -> usize {
        self.fs().proto.code_len()
    }

    /// Emit a jump with a placeholder offset; returns the offset
    /// position for [`patch_jump`](Self::patch_jump).
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.fs_mut().proto.emit_short(0)
    }

    /// Point a forward jump at the current position.
    fn patch_jump(&mut self, at: usize, line: u32) {
        let offset = self.code_len() as i64 - (at as i64 + 2);
        if offset > i16::MAX as i64 {
            self.error("jump too far", line);
            return;
        }
        self.fs_mut().proto.patch_short(at, offset as i16);
    }

    /// Emit a backward jump to `head`.
    fn emit_back_jump(&mut self, head: usize, line: u32) {
        self.emit_op(OpCode::Jmp);
        let offset = head as i64 - (self.code_len() as i64 + 2);
        if offset < i16::MIN as i64 {
            self.error("loop body too large", line);
            self.fs_mut().proto.emit_short(0);
            return;
        }
        self.fs_mut().proto.emit_short(offset as i16);
    }

    // ---- Registers, constants, scopes ----

    fn alloc_reg(&mut self, line: u32) -> u8 {
        match self.fs_mut().scope.alloc_reg() {
            Some(reg) => reg,
            None => {
                self.error("expression requires too many registers", line);
                0
            }
        }
    }

    fn free_regs(&mut self, n: u16) {
        self.fs_mut().scope.free_regs(n);
    }

    fn settle(&mut self) {
        self.fs_mut().scope.settle();
    }

    fn constant(&mut self, k: Constant, line: u32) -> u8 {
        let idx = self.fs_mut().proto.add_constant(k);
        if idx > u8::MAX as usize {
            self.error("too many constants in one function", line);
            return 0;
        }
        idx as u8
    }

    fn name_constant(&mut self, name: StrId, line: u32) -> u8 {
        self.constant(Constant::Str(name), line)
    }

    fn declare_local(&mut self, name: StrId, mutable: bool) -> u8 {
        match self.fs_mut().scope.declare_local(name, mutable) {
            Some(slot) => slot,
            None => {
                // Host-policy limit: report, drop the declaration, and
                // keep compiling.
                log::error!(
                    "too many local variables in function (dropping '{}')",
                    self.strings.get_str(name)
                );
                0
            }
        }
    }

    fn begin_scope(&mut self) {
        self.fs_mut().scope.begin_scope();
    }

    fn end_scope(&mut self) {
        let fs = self.fs_mut();
        fs.scope.scope_depth -= 1;
        while let Some(local) = fs.scope.locals.last() {
            if local.depth <= fs.scope.scope_depth {
                break;
            }
            let slot = (fs.scope.locals.len() - 1) as u8;
            if local.captured {
                fs.proto.emit_byte(OpCode::CloseUpval as u8);
                fs.proto.emit_byte(slot);
            }
            fs.scope.locals.pop();
        }
        fs.scope.settle();
    }

    fn scoped_block(&mut self, stmts: &[Stmt]) {
        self.begin_scope();
        for s in stmts {
            self.stmt(s);
        }
        self.end_scope();
    }

    // ---- Name resolution ----

    fn resolve_upvalue(&mut self, level: usize, name: StrId, line: u32) -> Option<usize> {
        if level == 0 {
            return None;
        }
        if let Some(local) = self.func_stack[level - 1].scope.resolve_local(name) {
            self.func_stack[level - 1].scope.locals[local].captured = true;
            return self.add_upvalue(level, local as u8, true, name, line);
        }
        if let Some(upvalue) = self.resolve_upvalue(level - 1, name, line) {
            return self.add_upvalue(level, upvalue as u8, false, name, line);
        }
        None
    }

    /// Memoized descriptor lookup, deduplicating by (in_stack, index).
    /// A capture past the cap is a compile error: handing out a
    /// placeholder index would silently alias another variable's cell.
    fn add_upvalue(
        &mut self,
        level: usize,
        index: u8,
        in_stack: bool,
        name: StrId,
        line: u32,
    ) -> Option<usize> {
        let upvalues = &mut self.func_stack[level].upvalues;
        for (i, desc) in upvalues.iter().enumerate() {
            if desc.index == index && desc.in_stack == in_stack {
                return Some(i);
            }
        }
        if upvalues.len() >= MAX_UPVALUES {
            let text = self.strings.get_str(name).into_owned();
            self.error(
                format!("too many upvalues in function (capturing '{text}')"),
                line,
            );
            return None;
        }
        upvalues.push(UpvalDesc { in_stack, index });
        Some(upvalues.len() - 1)
    }

    // ---- Statements ----

    fn stmt(&mut self, s: &Stmt) {
        match &s.kind {
            StmtKind::Let {
                name,
                mutable,
                init,
            } => self.stmt_let(*name, *mutable, init, s.line),
            StmtKind::Assign { target, value } => self.stmt_assign(target, value, s.line),
            StmtKind::Fn { name, params, body } => self.stmt_fn(*name, params, body, s.line),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.stmt_if(cond, then_branch, else_branch.as_deref(), s.line),
            StmtKind::While { cond, body } => self.stmt_while(cond, body, s.line),
            StmtKind::For {
                var,
                iterable,
                body,
            } => self.stmt_for(*var, iterable, body, s.line),
            StmtKind::Loop { body } => self.stmt_loop(body, s.line),
            StmtKind::Break => self.stmt_break(s.line),
            StmtKind::Return(value) => self.stmt_return(value.as_ref(), s.line),
            StmtKind::Block(stmts) => self.scoped_block(stmts),
            StmtKind::Expr(e) => {
                self.expr(e);
                self.settle();
            }
        }
    }

    fn stmt_let(&mut self, name: StrId, mutable: bool, init: &Expr, line: u32) {
        if self.fs().scope.scope_depth == 0 {
            let reg = self.expr(init);
            let k = self.name_constant(name, line);
            self.emit_op(OpCode::StoreGlobal);
            self.emit_byte(k);
            self.emit_byte(reg);
            self.settle();
        } else {
            // Declare first so the slot is fixed, then compile the
            // initializer into it: `free_reg` still points at the slot.
            let slot = self.declare_local(name, mutable);
            let reg = self.expr(init);
            if reg != slot {
                self.emit_op(OpCode::Move);
                self.emit_byte(reg);
                self.emit_byte(slot);
            }
            self.settle();
        }
    }

    fn stmt_assign(&mut self, target: &AssignTarget, value: &Expr, line: u32) {
        match target {
            AssignTarget::Name(name) => {
                let reg = self.expr(value);
                let level = self.func_stack.len() - 1;
                if let Some(local) = self.fs().scope.resolve_local(*name) {
                    if !self.fs().scope.locals[local].mutable {
                        let text = self.strings.get_str(*name).into_owned();
                        self.error(
                            format!("cannot assign to immutable variable: {text}"),
                            line,
                        );
                    }
                    self.emit_op(OpCode::StoreLocal);
                    self.emit_byte(local as u8);
                    self.emit_byte(reg);
                } else if let Some(upvalue) = self.resolve_upvalue(level, *name, line) {
                    self.emit_op(OpCode::StoreUpval);
                    self.emit_byte(upvalue as u8);
                    self.emit_byte(reg);
                } else {
                    let k = self.name_constant(*name, line);
                    self.emit_op(OpCode::StoreGlobal);
                    self.emit_byte(k);
                    self.emit_byte(reg);
                }
                self.settle();
            }
            AssignTarget::Index { target, index } => {
                let arr = self.expr(target);
                let idx = self.expr(index);
                let val = self.expr(value);
                self.emit_op(OpCode::ArraySet);
                self.emit_byte(arr);
                self.emit_byte(idx);
                self.emit_byte(val);
                self.settle();
            }
        }
    }

    fn stmt_fn(&mut self, name: StrId, params: &[StrId], body: &[Stmt], line: u32) {
        if self.fs().scope.scope_depth == 0 {
            let reg = self.function(Some(name), params, FnBody::Block(body), line);
            let k = self.name_constant(name, line);
            self.emit_op(OpCode::StoreGlobal);
            self.emit_byte(k);
            self.emit_byte(reg);
            self.settle();
        } else {
            // Bind the name before compiling the body so the function
            // can capture itself for recursion.
            let slot = self.declare_local(name, false);
            let reg = self.function(Some(name), params, FnBody::Block(body), line);
            if reg != slot {
                self.emit_op(OpCode::Move);
                self.emit_byte(reg);
                self.emit_byte(slot);
            }
            self.settle();
        }
    }

    fn stmt_if(
        &mut self,
        cond: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&[Stmt]>,
        line: u32,
    ) {
        let creg = self.expr(cond);
        self.emit_op(OpCode::JmpIfNot);
        self.emit_byte(creg);
        let else_jump = self.fs_mut().proto.emit_short(0);
        self.free_regs(1);

        self.scoped_block(then_branch);

        if let Some(else_branch) = else_branch {
            let end_jump = self.emit_jump(OpCode::Jmp);
            self.patch_jump(else_jump, line);
            self.scoped_block(else_branch);
            self.patch_jump(end_jump, line);
        } else {
            self.patch_jump(else_jump, line);
        }
    }

    fn stmt_while(&mut self, cond: &Expr, body: &[Stmt], line: u32) {
        self.fs_mut().scope.loops.push(LoopCtx::default());
        let head = self.code_len();

        let creg = self.expr(cond);
        self.emit_op(OpCode::JmpIfNot);
        self.emit_byte(creg);
        let exit_jump = self.fs_mut().proto.emit_short(0);
        self.free_regs(1);

        self.scoped_block(body);
        self.emit_back_jump(head, line);
        self.patch_jump(exit_jump, line);
        self.end_loop(line);
    }

    /// `for x in e` lowers to an iterator held in a hidden local:
    ///
    /// ```text
    ///   .iter := ITER_NEW e
    /// head:
    ///   if !ITER_HAS_NEXT(.iter) goto exit
    ///   x := ITER_NEXT(.iter)
    ///   body
    ///   goto head
    /// exit:
    /// ```
    fn stmt_for(&mut self, var: StrId, iterable: &Expr, body: &[Stmt], line: u32) {
        self.fs_mut().scope.loops.push(LoopCtx::default());
        self.begin_scope();

        let iter_name = self.strings.intern(b".iter");
        let src = self.expr(iterable);
        let iter_slot = self.declare_local(iter_name, false);
        self.emit_op(OpCode::IterNew);
        self.emit_byte(src);
        self.emit_byte(iter_slot);
        self.settle();

        let var_slot = self.declare_local(var, false);
        self.settle();

        let head = self.code_len();
        let has_next = self.alloc_reg(line);
        self.emit_op(OpCode::IterHasNext);
        self.emit_byte(iter_slot);
        self.emit_byte(has_next);
        self.emit_op(OpCode::JmpIfNot);
        self.emit_byte(has_next);
        let exit_jump = self.fs_mut().proto.emit_short(0);
        self.free_regs(1);

        self.emit_op(OpCode::IterNext);
        self.emit_byte(iter_slot);
        self.emit_byte(var_slot);

        self.scoped_block(body);
        self.emit_back_jump(head, line);
        self.patch_jump(exit_jump, line);

        self.end_scope();
        self.end_loop(line);
    }

    fn stmt_loop(&mut self, body: &[Stmt], line: u32) {
        self.fs_mut().scope.loops.push(LoopCtx::default());
        let head = self.code_len();
        self.scoped_block(body);
        self.emit_back_jump(head, line);
        self.end_loop(line);
    }

    fn stmt_break(&mut self, line: u32) {
        if self.fs().scope.loops.is_empty() {
            self.error("break outside of loop", line);
            return;
        }
        let at = self.emit_jump(OpCode::Jmp);
        self.fs_mut()
            .scope
            .current_loop_mut()
            .expect("loop context")
            .break_patches
            .push(at);
    }

    fn end_loop(&mut self, line: u32) {
        let ctx = self
            .fs_mut()
            .scope
            .loops
            .pop()
            .expect("balanced loop contexts");
        for at in ctx.break_patches {
            self.patch_jump(at, line);
        }
    }

    fn stmt_return(&mut self, value: Option<&Expr>, _line: u32) {
        match value {
            Some(e) => {
                let reg = self.expr(e);
                self.emit_op(OpCode::Ret);
                self.emit_byte(1);
                self.emit_byte(reg);
                self.settle();
            }
            None => {
                self.emit_op(OpCode::Ret);
                self.emit_byte(0);
            }
        }
    }

    // ---- Expressions ----

    /// Compile an expression, returning the register holding the
    /// result. Results always land in freshly allocated scratch, so the
    /// caller can free them without touching locals.
    fn expr(&mut self, e: &Expr) -> u8 {
        match &e.kind {
            ExprKind::Int(v) => self.literal(Constant::Int(*v), e.line),
            ExprKind::Float(v) => self.literal(Constant::Float(*v), e.line),
            ExprKind::Bool(v) => self.literal(Constant::Bool(*v), e.line),
            ExprKind::Str(id) => self.literal(Constant::Str(*id), e.line),
            ExprKind::None => self.literal(Constant::None, e.line),
            ExprKind::Name(id) => self.ident(*id, e.line),
            ExprKind::Array(elements) => self.array_literal(elements, e.line),
            ExprKind::Unary { op, operand } => self.unary(*op, operand, e.line),
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, e.line),
            ExprKind::Call { callee, args } => self.call(callee, args, e.line),
            ExprKind::Index { target, index } => self.index(target, index, e.line),
            ExprKind::Lambda { params, body } => {
                let body = match body {
                    LambdaBody::Expr(expr) => FnBody::Expr(expr),
                    LambdaBody::Block(stmts) => FnBody::Block(stmts),
                };
                self.function(None, params, body, e.line)
            }
            ExprKind::IterChain { source, methods } => {
                if let Some(first) = methods.first() {
                    let name = self.strings.get_str(first.name).into_owned();
                    self.error(
                        format!("iterator chain methods are not implemented: '{name}'"),
                        first.line,
                    );
                }
                self.expr(source)
            }
        }
    }

    fn literal(&mut self, k: Constant, line: u32) -> u8 {
        let idx = self.constant(k, line);
        let dest = self.alloc_reg(line);
        self.emit_op(OpCode::LoadConst);
        self.emit_byte(idx);
        self.emit_byte(dest);
        dest
    }

    fn ident(&mut self, name: StrId, line: u32) -> u8 {
        let level = self.func_stack.len() - 1;
        if let Some(local) = self.fs().scope.resolve_local(name) {
            let dest = self.alloc_reg(line);
            self.emit_op(OpCode::LoadLocal);
            self.emit_byte(local as u8);
            self.emit_byte(dest);
            return dest;
        }
        if let Some(upvalue) = self.resolve_upvalue(level, name, line) {
            let dest = self.alloc_reg(line);
            self.emit_op(OpCode::LoadUpval);
            self.emit_byte(upvalue as u8);
            self.emit_byte(dest);
            return dest;
        }
        let k = self.name_constant(name, line);
        let dest = self.alloc_reg(line);
        self.emit_op(OpCode::LoadGlobal);
        self.emit_byte(k);
        self.emit_byte(dest);
        dest
    }

    fn array_literal(&mut self, elements: &[Expr], line: u32) -> u8 {
        let dest = self.alloc_reg(line);
        self.emit_op(OpCode::ArrayNew);
        self.emit_byte(elements.len().min(u8::MAX as usize) as u8);
        self.emit_byte(dest);
        for element in elements {
            let reg = self.expr(element);
            self.emit_op(OpCode::ArrayPush);
            self.emit_byte(dest);
            self.emit_byte(reg);
            self.free_regs(1);
        }
        dest
    }

    fn unary(&mut self, op: UnOp, operand: &Expr, line: u32) -> u8 {
        let src = self.expr(operand);
        self.free_regs(1);
        let dest = self.alloc_reg(line);
        match op {
            UnOp::Neg => self.emit_op(OpCode::Neg),
        }
        self.emit_byte(src);
        self.emit_byte(dest);
        dest
    }

    fn binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, line: u32) -> u8 {
        let left = self.expr(lhs);
        let right = self.expr(rhs);
        // Operands are the top two scratch slots; the destination
        // reuses the lower one. The VM reads both operands before
        // writing, so in-place results are safe.
        self.free_regs(2);
        let dest = self.alloc_reg(line);
        let opcode = match op {
            BinOp::Add => OpCode::Add,
            BinOp::Sub => OpCode::Sub,
            BinOp::Mul => OpCode::Mul,
            BinOp::Div => OpCode::Div,
            BinOp::Mod => OpCode::Mod,
            BinOp::Eq => OpCode::Eq,
            BinOp::Ne => OpCode::Ne,
            BinOp::Lt => OpCode::Lt,
            BinOp::Le => OpCode::Le,
            BinOp::Gt => OpCode::Gt,
            BinOp::Ge => OpCode::Ge,
        };
        self.emit_op(opcode);
        self.emit_byte(left);
        self.emit_byte(right);
        self.emit_byte(dest);
        dest
    }

    fn index(&mut self, target: &Expr, index: &Expr, line: u32) -> u8 {
        let arr = self.expr(target);
        let idx = self.expr(index);
        self.free_regs(2);
        let dest = self.alloc_reg(line);
        self.emit_op(OpCode::ArrayGet);
        self.emit_byte(arr);
        self.emit_byte(idx);
        self.emit_byte(dest);
        dest
    }

    /// Calls use the fixed convention: callee in register R, arguments
    /// in R+1..R+n. With the scratch discipline the arguments usually
    /// land there already; `MOVE` fixes up any that did not.
    fn call(&mut self, callee: &Expr, args: &[Expr], line: u32) -> u8 {
        if args.len() > u8::MAX as usize {
            self.error("too many arguments in call", line);
        }
        let func = self.expr(callee);
        let mut arg_regs = Vec::with_capacity(args.len());
        for arg in args {
            arg_regs.push(self.expr(arg));
        }
        for (i, &reg) in arg_regs.iter().enumerate() {
            let target = func as usize + 1 + i;
            if reg as usize != target {
                self.emit_op(OpCode::Move);
                self.emit_byte(reg);
                self.emit_byte(target as u8);
            }
        }
        self.free_regs(1 + args.len() as u16);
        let dest = self.alloc_reg(line);
        self.emit_op(OpCode::Call);
        self.emit_byte(func);
        self.emit_byte(args.len() as u8);
        self.emit_byte(dest);
        dest
    }

    fn function(&mut self, name: Option<StrId>, params: &[StrId], body: FnBody, line: u32) -> u8 {
        if params.len() > u8::MAX as usize {
            self.error("too many parameters", line);
        }

        self.func_stack.push(FuncState::new(name));
        self.fs_mut().proto.arity = params.len().min(u8::MAX as usize) as u8;

        self.begin_scope();
        for &param in params {
            self.declare_local(param, false);
        }
        self.settle();

        match body {
            FnBody::Expr(e) => {
                let reg = self.expr(e);
                self.emit_op(OpCode::Ret);
                self.emit_byte(1);
                self.emit_byte(reg);
                self.settle();
            }
            FnBody::Block(stmts) => {
                for s in stmts {
                    self.stmt(s);
                }
            }
        }
        self.end_scope();
        // Implicit return; an earlier explicit `return` already left the
        // frame before reaching this.
        self.emit_op(OpCode::Ret);
        self.emit_byte(0);

        let mut inner = self.func_stack.pop().expect("function state");
        let descs = std::mem::take(&mut inner.upvalues);
        inner.proto.upvalues = descs.clone();
        inner.proto.max_regs = inner.scope.max_reg;

        let proto_idx = self.fs_mut().proto.add_proto(inner.proto);
        let k = self.constant(Constant::Proto(proto_idx), line);
        let dest = self.alloc_reg(line);
        self.emit_op(OpCode::Closure);
        self.emit_byte(k);
        self.emit_byte(dest);
        self.emit_byte(descs.len() as u8);
        for desc in &descs {
            self.emit_byte(desc.in_stack as u8);
            self.emit_byte(desc.index);
        }
        dest
    }
}
