//! Abstract syntax tree produced by the parser.

use rill_core::string::StrId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(StrId),
    None,
    Name(StrId),
    Array(Vec<Expr>),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// `|params| body` closure literal.
    Lambda {
        params: Vec<StrId>,
        body: LambdaBody,
    },
    /// `source.iter()` followed by zero or more `.method(arg)` links.
    IterChain {
        source: Box<Expr>,
        methods: Vec<IterMethod>,
    },
}

#[derive(Clone, Debug)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

/// One link of an iterator chain. `seed` is the second argument the
/// parser accepts for `fold`.
#[derive(Clone, Debug)]
pub struct IterMethod {
    pub name: StrId,
    pub arg: Expr,
    pub seed: Option<Expr>,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub enum AssignTarget {
    Name(StrId),
    Index { target: Box<Expr>, index: Box<Expr> },
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Let {
        name: StrId,
        mutable: bool,
        init: Expr,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
    },
    Fn {
        name: StrId,
        params: Vec<StrId>,
        body: Vec<Stmt>,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: StrId,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Loop {
        body: Vec<Stmt>,
    },
    Break,
    Return(Option<Expr>),
    Block(Vec<Stmt>),
    Expr(Expr),
}
