//! Recursive-descent parser with precedence climbing.
//!
//! Binary expressions use one function per precedence level, lowest to
//! highest: equality, comparison, additive, multiplicative, unary,
//! postfix. Errors flip the parser into panic mode: the first error at
//! the offending token is recorded, further reports are suppressed, and
//! the statement loop resynchronizes at a `;` or a statement keyword.

use crate::ast::{AssignTarget, BinOp, Expr, ExprKind, IterMethod, LambdaBody, Stmt, StmtKind, UnOp};
use crate::compiler::CompileError;
use crate::lexer::Lexer;
use crate::token::{SpannedToken, Token};
use rill_core::string::{StrId, StringInterner};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    errors: Vec<CompileError>,
    panic_mode: bool,
}

/// Parse a whole source buffer. Returns the statement list and every
/// error collected along the way; the caller treats a non-empty error
/// list as failure.
pub fn parse(source: &[u8], strings: &mut StringInterner) -> (Vec<Stmt>, Vec<CompileError>) {
    let lexer = Lexer::new(source, strings);
    let mut parser = Parser {
        lexer,
        errors: Vec::new(),
        panic_mode: false,
    };
    let program = parser.parse_program();
    (program, parser.errors)
}

impl<'a> Parser<'a> {
    fn parse_program(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.check(&Token::Eof) {
            stmts.push(self.parse_stmt());
            if self.panic_mode {
                self.synchronize();
            }
        }
        stmts
    }

    // ---- Token plumbing ----

    /// Current token, skipping (and reporting) lexical errors.
    fn peek(&mut self) -> SpannedToken {
        loop {
            match self.lexer.current() {
                Ok(st) => return st.clone(),
                Err(_) => {
                    let e = self.lexer.advance().expect_err("peeked an error");
                    self.report(e.message, e.line);
                }
            }
        }
    }

    fn bump(&mut self) -> SpannedToken {
        let st = self.peek();
        let _ = self.lexer.advance();
        st
    }

    fn check(&mut self, expected: &Token) -> bool {
        self.peek().token == *expected
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, message: &str) {
        if self.check(expected) {
            self.bump();
        } else {
            self.error_here(message);
        }
    }

    fn expect_name(&mut self, message: &str) -> StrId {
        match self.peek().token {
            Token::Name(id) => {
                self.bump();
                id
            }
            _ => {
                self.error_here(message);
                self.lexer.strings.intern(b"<error>")
            }
        }
    }

    fn line(&mut self) -> u32 {
        self.peek().line
    }

    // ---- Error handling ----

    fn report(&mut self, message: impl Into<String>, line: u32) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(CompileError {
            message: message.into(),
            line,
        });
    }

    fn error_here(&mut self, message: &str) {
        let st = self.peek();
        let detail = match st.token {
            Token::Eof => format!("{message} at end"),
            ref t => format!("{message} at '{t}'"),
        };
        self.report(detail, st.line);
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        loop {
            match self.peek().token {
                Token::Eof
                | Token::Fn
                | Token::Let
                | Token::If
                | Token::While
                | Token::For
                | Token::Return => return,
                Token::Semi => {
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    // ---- Statements ----

    fn parse_stmt(&mut self) -> Stmt {
        let line = self.line();

        if self.eat(&Token::Let) {
            return self.parse_let(line);
        }
        if self.eat(&Token::Fn) {
            return self.parse_fn(line);
        }
        if self.eat(&Token::If) {
            return self.parse_if(line);
        }
        if self.eat(&Token::While) {
            let cond = self.parse_expr();
            self.expect(&Token::LBrace, "expected '{' after while condition");
            let body = self.parse_block();
            return Stmt {
                kind: StmtKind::While { cond, body },
                line,
            };
        }
        if self.eat(&Token::For) {
            let var = self.expect_name("expected variable name");
            self.expect(&Token::In, "expected 'in' after for variable");
            let iterable = self.parse_expr();
            self.expect(&Token::LBrace, "expected '{' after for iterable");
            let body = self.parse_block();
            return Stmt {
                kind: StmtKind::For {
                    var,
                    iterable,
                    body,
                },
                line,
            };
        }
        if self.eat(&Token::Loop) {
            self.expect(&Token::LBrace, "expected '{' after loop");
            let body = self.parse_block();
            return Stmt {
                kind: StmtKind::Loop { body },
                line,
            };
        }
        if self.eat(&Token::Break) {
            return Stmt {
                kind: StmtKind::Break,
                line,
            };
        }
        if self.eat(&Token::Return) {
            let value = if self.check(&Token::RBrace) || self.check(&Token::Eof) {
                None
            } else {
                Some(self.parse_expr())
            };
            return Stmt {
                kind: StmtKind::Return(value),
                line,
            };
        }
        if self.eat(&Token::LBrace) {
            return Stmt {
                kind: StmtKind::Block(self.parse_block()),
                line,
            };
        }

        // Expression statement, or assignment if '=' follows.
        let expr = self.parse_expr();
        if self.eat(&Token::Assign) {
            let value = self.parse_expr();
            let target = match expr.kind {
                ExprKind::Name(name) => Some(AssignTarget::Name(name)),
                ExprKind::Index { target, index } => Some(AssignTarget::Index { target, index }),
                _ => {
                    self.report("invalid assignment target", expr.line);
                    None
                }
            };
            if let Some(target) = target {
                return Stmt {
                    kind: StmtKind::Assign { target, value },
                    line,
                };
            }
            return Stmt {
                kind: StmtKind::Expr(value),
                line,
            };
        }
        Stmt {
            kind: StmtKind::Expr(expr),
            line,
        }
    }

    fn parse_let(&mut self, line: u32) -> Stmt {
        let mutable = self.eat(&Token::Mut);
        let name = self.expect_name("expected variable name");
        self.expect(&Token::Assign, "expected '=' after variable name");
        let init = self.parse_expr();
        Stmt {
            kind: StmtKind::Let {
                name,
                mutable,
                init,
            },
            line,
        }
    }

    fn parse_fn(&mut self, line: u32) -> Stmt {
        let name = self.expect_name("expected function name");
        self.expect(&Token::LParen, "expected '(' after function name");
        let params = self.parse_param_list(&Token::RParen);
        self.expect(&Token::RParen, "expected ')' after parameters");
        self.expect(&Token::LBrace, "expected '{' before function body");
        let body = self.parse_block();
        Stmt {
            kind: StmtKind::Fn { name, params, body },
            line,
        }
    }

    fn parse_if(&mut self, line: u32) -> Stmt {
        let cond = self.parse_expr();
        self.expect(&Token::LBrace, "expected '{' after if condition");
        let then_branch = self.parse_block();
        let else_branch = if self.eat(&Token::Else) {
            self.expect(&Token::LBrace, "expected '{' after else");
            Some(self.parse_block())
        } else {
            None
        };
        Stmt {
            kind: StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            line,
        }
    }

    /// Parse statements until the closing brace. The opening brace has
    /// already been consumed.
    fn parse_block(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) && !self.check(&Token::Eof) {
            stmts.push(self.parse_stmt());
            if self.panic_mode {
                // Do not spin on an unparseable token inside a block.
                self.synchronize();
            }
        }
        self.expect(&Token::RBrace, "expected '}' after block");
        stmts
    }

    fn parse_param_list(&mut self, terminator: &Token) -> Vec<StrId> {
        let mut params = Vec::new();
        if !self.check(terminator) {
            loop {
                params.push(self.expect_name("expected parameter name"));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        params
    }

    // ---- Expressions ----

    fn parse_expr(&mut self) -> Expr {
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Expr {
        let mut lhs = self.parse_comparison();
        loop {
            let op = match self.peek().token {
                Token::Equal => BinOp::Eq,
                Token::NotEqual => BinOp::Ne,
                _ => break,
            };
            let line = self.bump().line;
            let rhs = self.parse_comparison();
            lhs = binary(op, lhs, rhs, line);
        }
        lhs
    }

    fn parse_comparison(&mut self) -> Expr {
        let mut lhs = self.parse_term();
        loop {
            let op = match self.peek().token {
                Token::Less => BinOp::Lt,
                Token::LessEq => BinOp::Le,
                Token::Greater => BinOp::Gt,
                Token::GreaterEq => BinOp::Ge,
                _ => break,
            };
            let line = self.bump().line;
            let rhs = self.parse_term();
            lhs = binary(op, lhs, rhs, line);
        }
        lhs
    }

    fn parse_term(&mut self) -> Expr {
        let mut lhs = self.parse_factor();
        loop {
            let op = match self.peek().token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.bump().line;
            let rhs = self.parse_factor();
            lhs = binary(op, lhs, rhs, line);
        }
        lhs
    }

    fn parse_factor(&mut self) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.peek().token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.bump().line;
            let rhs = self.parse_unary();
            lhs = binary(op, lhs, rhs, line);
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        if self.check(&Token::Minus) {
            let line = self.bump().line;
            let operand = self.parse_unary();
            return Expr {
                kind: ExprKind::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                },
                line,
            };
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            if self.eat(&Token::LParen) {
                let mut args = Vec::new();
                if !self.check(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr());
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Token::RParen, "expected ')' after arguments");
                let line = expr.line;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    line,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_expr();
                self.expect(&Token::RBracket, "expected ']' after index");
                let line = expr.line;
                expr = Expr {
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                };
            } else if self.eat(&Token::Dot) {
                let method = self.expect_name("expected method name after '.'");
                if self.lexer.strings.get_bytes(method) == b"iter" {
                    self.expect(&Token::LParen, "expected '(' after 'iter'");
                    self.expect(&Token::RParen, "expected ')' after 'iter'");
                    expr = self.parse_iter_chain(expr);
                } else {
                    self.error_here("unknown method");
                }
            } else {
                break;
            }
        }
        expr
    }

    /// `.iter()` has been consumed; collect the trailing method links.
    fn parse_iter_chain(&mut self, source: Expr) -> Expr {
        let line = source.line;
        let mut methods = Vec::new();
        while self.eat(&Token::Dot) {
            let mline = self.line();
            let name = self.expect_name("expected method name");
            self.expect(&Token::LParen, "expected '(' after method");
            let arg = self.parse_expr();
            let seed = if self.lexer.strings.get_bytes(name) == b"fold" {
                self.expect(&Token::Comma, "expected second argument to fold");
                Some(self.parse_expr())
            } else {
                None
            };
            self.expect(&Token::RParen, "expected ')' after arguments");
            methods.push(IterMethod {
                name,
                arg,
                seed,
                line: mline,
            });
        }
        Expr {
            kind: ExprKind::IterChain {
                source: Box::new(source),
                methods,
            },
            line,
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let st = self.peek();
        let line = st.line;
        match st.token {
            Token::Int(v) => {
                self.bump();
                Expr {
                    kind: ExprKind::Int(v),
                    line,
                }
            }
            Token::Float(v) => {
                self.bump();
                Expr {
                    kind: ExprKind::Float(v),
                    line,
                }
            }
            Token::True => {
                self.bump();
                Expr {
                    kind: ExprKind::Bool(true),
                    line,
                }
            }
            Token::False => {
                self.bump();
                Expr {
                    kind: ExprKind::Bool(false),
                    line,
                }
            }
            Token::None => {
                self.bump();
                Expr {
                    kind: ExprKind::None,
                    line,
                }
            }
            Token::Str(id) => {
                self.bump();
                Expr {
                    kind: ExprKind::Str(id),
                    line,
                }
            }
            Token::Name(id) => {
                self.bump();
                Expr {
                    kind: ExprKind::Name(id),
                    line,
                }
            }
            Token::LParen => {
                self.bump();
                let expr = self.parse_expr();
                self.expect(&Token::RParen, "expected ')' after expression");
                expr
            }
            Token::LBracket => {
                self.bump();
                let mut elements = Vec::new();
                if !self.check(&Token::RBracket) {
                    loop {
                        elements.push(self.parse_expr());
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Token::RBracket, "expected ']' after array elements");
                Expr {
                    kind: ExprKind::Array(elements),
                    line,
                }
            }
            Token::Pipe => {
                self.bump();
                let params = self.parse_param_list(&Token::Pipe);
                self.expect(&Token::Pipe, "expected '|' after parameters");
                let body = if self.eat(&Token::LBrace) {
                    LambdaBody::Block(self.parse_block())
                } else {
                    LambdaBody::Expr(Box::new(self.parse_expr()))
                };
                Expr {
                    kind: ExprKind::Lambda { params, body },
                    line,
                }
            }
            _ => {
                self.error_here("expected expression");
                // Consume the offending token so the caller makes
                // progress even inside nested constructs.
                self.bump();
                Expr {
                    kind: ExprKind::None,
                    line,
                }
            }
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr, line: u32) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        line,
    }
}
