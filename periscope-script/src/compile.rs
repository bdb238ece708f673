//! Compilation of a parsed function body into an executable [`CodeBody`].
//!
//! Compilation is deliberately light: it allocates one frame slot per
//! parameter and per `let` binding, then verifies that every name the body
//! reads was declared somewhere in the function. Bodies are immutable once
//! built and shared behind `Arc`, so a function's code can be swapped for a
//! rewritten body without touching callers that already hold the old one.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{Block, EmitSegment, Expr, Stmt, StmtKind};
use crate::error::CompileError;

/// Executable form of one function body.
///
/// `slots` maps every declared name to its frame index; parameters occupy
/// the first `params.len()` slots in declaration order.
#[derive(Debug)]
pub struct CodeBody {
    params: Vec<String>,
    block: Arc<Block>,
    slots: HashMap<String, usize>,
    slot_count: usize,
}

impl CodeBody {
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    #[must_use]
    pub fn block(&self) -> &Arc<Block> {
        &self.block
    }

    #[must_use]
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
}

/// Builds a [`CodeBody`] for `block`, reporting conflicts and unknown names
/// against `function` in error messages.
pub fn compile(function: &str, params: &[String], block: &Block) -> Result<CodeBody, CompileError> {
    let mut slots = HashMap::new();
    for name in params {
        if slots.insert(name.clone(), slots.len()).is_some() {
            return Err(CompileError::DuplicateParameter {
                function: function.to_string(),
                name: name.clone(),
            });
        }
    }
    collect_lets(function, block, &mut slots)?;
    verify_block(function, block, &slots)?;
    Ok(CodeBody {
        params: params.to_vec(),
        slot_count: slots.len(),
        block: Arc::new(block.clone()),
        slots,
    })
}

/// All `let`s in a function share one flat frame; redeclaring a name
/// anywhere in the body is rejected rather than shadowed.
fn collect_lets(
    function: &str,
    block: &Block,
    slots: &mut HashMap<String, usize>,
) -> Result<(), CompileError> {
    for stmt in &block.stmts {
        if let StmtKind::Let { name, .. } = &stmt.kind {
            if slots.insert(name.clone(), slots.len()).is_some() {
                return Err(CompileError::DuplicateBinding {
                    function: function.to_string(),
                    name: name.clone(),
                });
            }
        }
        for child in child_blocks(stmt) {
            collect_lets(function, child, slots)?;
        }
    }
    Ok(())
}

fn verify_block(
    function: &str,
    block: &Block,
    slots: &HashMap<String, usize>,
) -> Result<(), CompileError> {
    for stmt in &block.stmts {
        match &stmt.kind {
            StmtKind::Let { value, .. } => verify_expr(function, value, slots)?,
            StmtKind::Assign { name, value } => {
                require(function, name, slots)?;
                verify_expr(function, value, slots)?;
            }
            StmtKind::Expr(expr) => verify_expr(function, expr, slots)?,
            StmtKind::Return(Some(expr)) => verify_expr(function, expr, slots)?,
            StmtKind::Return(None) => {}
            StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => {
                verify_expr(function, cond, slots)?;
            }
            StmtKind::Emit { segments, .. } => {
                for segment in segments {
                    if let EmitSegment::Placeholder(name) = segment {
                        require(function, name, slots)?;
                    }
                }
            }
            StmtKind::Guard { .. } => {}
        }
        for child in child_blocks(stmt) {
            verify_block(function, child, slots)?;
        }
    }
    Ok(())
}

fn verify_expr(
    function: &str,
    expr: &Expr,
    slots: &HashMap<String, usize>,
) -> Result<(), CompileError> {
    match expr {
        Expr::Var(name) => require(function, name, slots),
        Expr::Unary { operand, .. } => verify_expr(function, operand, slots),
        Expr::Binary { lhs, rhs, .. } => {
            verify_expr(function, lhs, slots)?;
            verify_expr(function, rhs, slots)
        }
        Expr::Call { args, .. } => {
            for arg in args {
                verify_expr(function, arg, slots)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn require(function: &str, name: &str, slots: &HashMap<String, usize>) -> Result<(), CompileError> {
    if slots.contains_key(name) {
        Ok(())
    } else {
        Err(CompileError::UnknownVariable {
            function: function.to_string(),
            name: name.to_string(),
        })
    }
}

fn child_blocks(stmt: &Stmt) -> Vec<&Block> {
    match &stmt.kind {
        StmtKind::If {
            then_body,
            else_body,
            ..
        } => {
            let mut blocks = vec![then_body];
            if let Some(body) = else_body {
                blocks.push(body);
            }
            blocks
        }
        StmtKind::While { body, .. } | StmtKind::Guard { body, .. } => vec![body],
        _ => Vec::new(),
    }
}
