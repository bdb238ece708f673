//! Syntax tree for the script language.
//!
//! Every statement records the 1-based source line of its first token; line
//! numbers survive cloning and statement insertion, which is what live log
//! injection keys on.
//!
//! Two statement variants have no surface syntax and are only ever built
//! programmatically: [`StmtKind::Emit`] (format a segment list and hand it
//! to the host's emit hook) and [`StmtKind::Guard`] (run a child block,
//! converting any runtime failure into an error report instead of
//! propagating it).

/// A parsed source file: functions and groups at the top level.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(FunctionDecl),
    Group(GroupDecl),
}

/// A named namespace of functions and nested groups.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDecl {
    pub name: String,
    pub line: u32,
    pub end_line: u32,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    /// Line of the `fn` keyword
    pub line: u32,
    /// Line of the closing brace
    pub end_line: u32,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub line: u32,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let { name: String, value: Expr },
    Assign { name: String, value: Expr },
    Expr(Expr),
    Return(Option<Expr>),
    If { cond: Expr, then_body: Block, else_body: Option<Block> },
    While { cond: Expr, body: Block },
    /// Injected only: format `segments` from the current frame and pass the
    /// text to the emit hook.
    Emit { trace_id: String, segments: Vec<EmitSegment> },
    /// Injected only: run `body`; a runtime error inside is reported as
    /// `(trace_id, message)` and execution resumes after the guard.
    Guard { trace_id: String, body: Block },
}

/// One piece of an emit statement's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitSegment {
    Literal(String),
    /// Name of a parameter slot to format
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Unit,
    Var(String),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// `callee` is a dotted path: `["fib"]` or `["Counter", "update"]`.
    Call { callee: Vec<String>, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Stmt {
    /// Child blocks owned by this statement, in declaration order, or `None`
    /// for simple statements. The distinction drives line-based insertion:
    /// a statement with child blocks absorbs same-line insertions into its
    /// first block and in-range insertions into the matching child.
    pub fn blocks_mut(&mut self) -> Option<Vec<&mut Block>> {
        match &mut self.kind {
            StmtKind::If { then_body, else_body, .. } => {
                let mut blocks = vec![then_body];
                if let Some(else_body) = else_body {
                    blocks.push(else_body);
                }
                Some(blocks)
            }
            StmtKind::While { body, .. } | StmtKind::Guard { body, .. } => Some(vec![body]),
            StmtKind::Let { .. }
            | StmtKind::Assign { .. }
            | StmtKind::Expr(_)
            | StmtKind::Return(_)
            | StmtKind::Emit { .. } => None,
        }
    }

    /// Whether this statement owns any child blocks.
    #[must_use]
    pub fn has_blocks(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::If { .. } | StmtKind::While { .. } | StmtKind::Guard { .. }
        )
    }
}
