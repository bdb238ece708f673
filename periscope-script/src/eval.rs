//! Tree-walking evaluator.
//!
//! Each call resolves its callee through the module namespace and loads the
//! function's *current* code body, so a body swapped mid-run is picked up by
//! the next call while frames already executing finish on the body they
//! started with.

use std::sync::Arc;

use crate::ast::{Block, EmitSegment, Expr, Stmt, StmtKind, UnaryOp};
use crate::compile::CodeBody;
use crate::error::RuntimeError;
use crate::host::{EmitHook, ScriptFunction, ScriptModule};
use crate::value::{self, Value};

/// Hard ceiling on nested script calls.
pub(crate) const MAX_CALL_DEPTH: usize = 256;

enum Flow {
    Next,
    Return(Value),
}

pub(crate) struct Interp<'a> {
    module: &'a ScriptModule,
    hook: Arc<dyn EmitHook>,
    depth: usize,
}

impl<'a> Interp<'a> {
    pub(crate) fn new(module: &'a ScriptModule, hook: Arc<dyn EmitHook>) -> Self {
        Interp { module, hook, depth: 0 }
    }

    pub(crate) fn invoke(
        &mut self,
        func: &ScriptFunction,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::DepthExceeded(MAX_CALL_DEPTH));
        }
        let code = func.current_code();
        if args.len() != code.params().len() {
            return Err(RuntimeError::ArityMismatch {
                name: func.qualified_name().to_string(),
                expected: code.params().len(),
                given: args.len(),
            });
        }
        let mut frame: Vec<Option<Value>> = vec![None; code.slot_count()];
        for (slot, arg) in args.into_iter().enumerate() {
            frame[slot] = Some(arg);
        }
        self.depth += 1;
        let flow = self.exec_block(&code, code.block(), &mut frame);
        self.depth -= 1;
        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::Unit),
        }
    }

    fn exec_block(
        &mut self,
        code: &CodeBody,
        block: &Block,
        frame: &mut [Option<Value>],
    ) -> Result<Flow, RuntimeError> {
        for stmt in &block.stmts {
            if let Flow::Return(value) = self.exec_stmt(code, stmt, frame)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(
        &mut self,
        code: &CodeBody,
        stmt: &Stmt,
        frame: &mut [Option<Value>],
    ) -> Result<Flow, RuntimeError> {
        match &stmt.kind {
            StmtKind::Let { name, value } | StmtKind::Assign { name, value } => {
                let value = self.eval(code, value, frame)?;
                frame[Self::slot_of(code, name)?] = Some(value);
                Ok(Flow::Next)
            }
            StmtKind::Expr(expr) => {
                self.eval(code, expr, frame)?;
                Ok(Flow::Next)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(code, expr, frame)?,
                    None => Value::Unit,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::If { cond, then_body, else_body } => {
                if self.truth(code, cond, frame)? {
                    self.exec_block(code, then_body, frame)
                } else if let Some(else_body) = else_body {
                    self.exec_block(code, else_body, frame)
                } else {
                    Ok(Flow::Next)
                }
            }
            StmtKind::While { cond, body } => {
                while self.truth(code, cond, frame)? {
                    if let Flow::Return(value) = self.exec_block(code, body, frame)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Next)
            }
            StmtKind::Emit { segments, .. } => {
                let mut text = String::new();
                for segment in segments {
                    match segment {
                        EmitSegment::Literal(literal) => text.push_str(literal),
                        EmitSegment::Placeholder(name) => {
                            let slot = Self::slot_of(code, name)?;
                            let value = frame[slot]
                                .as_ref()
                                .ok_or_else(|| RuntimeError::Unassigned(name.clone()))?;
                            text.push_str(&value.to_string());
                        }
                    }
                }
                self.hook.log(&text);
                Ok(Flow::Next)
            }
            StmtKind::Guard { trace_id, body } => match self.exec_block(code, body, frame) {
                Ok(flow) => Ok(flow),
                Err(err) => {
                    self.hook.error(trace_id, &err.to_string());
                    Ok(Flow::Next)
                }
            },
        }
    }

    fn truth(
        &mut self,
        code: &CodeBody,
        cond: &Expr,
        frame: &mut [Option<Value>],
    ) -> Result<bool, RuntimeError> {
        match self.eval(code, cond, frame)? {
            Value::Bool(value) => Ok(value),
            other => Err(RuntimeError::TypeMismatch(format!(
                "condition must be bool, got {}",
                other.type_name()
            ))),
        }
    }

    fn eval(
        &mut self,
        code: &CodeBody,
        expr: &Expr,
        frame: &mut [Option<Value>],
    ) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Int(value) => Ok(Value::Int(*value)),
            Expr::Float(value) => Ok(Value::Float(*value)),
            Expr::Bool(value) => Ok(Value::Bool(*value)),
            Expr::Str(value) => Ok(Value::Str(value.clone())),
            Expr::Unit => Ok(Value::Unit),
            Expr::Var(name) => {
                let slot = Self::slot_of(code, name)?;
                frame[slot]
                    .clone()
                    .ok_or_else(|| RuntimeError::Unassigned(name.clone()))
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(code, operand, frame)?;
                match (op, operand) {
                    (UnaryOp::Neg, Value::Int(v)) => v
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or(RuntimeError::IntegerOverflow("-")),
                    (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
                    (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
                    (UnaryOp::Neg, other) => Err(RuntimeError::TypeMismatch(format!(
                        "cannot negate {}",
                        other.type_name()
                    ))),
                    (UnaryOp::Not, other) => Err(RuntimeError::TypeMismatch(format!(
                        "cannot apply `!` to {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(code, *op, lhs, rhs, frame),
            Expr::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(code, arg, frame)?);
                }
                let func = self
                    .module
                    .function(callee)
                    .ok_or_else(|| RuntimeError::UnknownFunction(callee.join(".")))?;
                self.invoke(&func, values)
            }
        }
    }

    fn eval_binary(
        &mut self,
        code: &CodeBody,
        op: crate::ast::BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        frame: &mut [Option<Value>],
    ) -> Result<Value, RuntimeError> {
        use crate::ast::BinaryOp;

        // `&&` and `||` only evaluate the right side when the left side
        // leaves the result undecided.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let lhs = self.truth(code, lhs, frame)?;
            return match (op, lhs) {
                (BinaryOp::And, false) => Ok(Value::Bool(false)),
                (BinaryOp::Or, true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Bool(self.truth(code, rhs, frame)?)),
            };
        }

        let lhs = self.eval(code, lhs, frame)?;
        let rhs = self.eval(code, rhs, frame)?;
        match op {
            BinaryOp::Add => value::add(&lhs, &rhs),
            BinaryOp::Sub => value::sub(&lhs, &rhs),
            BinaryOp::Mul => value::mul(&lhs, &rhs),
            BinaryOp::Div => value::div(&lhs, &rhs),
            BinaryOp::Rem => value::rem(&lhs, &rhs),
            BinaryOp::Eq => Ok(Value::Bool(value::eq(&lhs, &rhs))),
            BinaryOp::Ne => Ok(Value::Bool(!value::eq(&lhs, &rhs))),
            BinaryOp::Lt => Ok(Value::Bool(value::compare("<", &lhs, &rhs)?.is_lt())),
            BinaryOp::Le => Ok(Value::Bool(value::compare("<=", &lhs, &rhs)?.is_le())),
            BinaryOp::Gt => Ok(Value::Bool(value::compare(">", &lhs, &rhs)?.is_gt())),
            BinaryOp::Ge => Ok(Value::Bool(value::compare(">=", &lhs, &rhs)?.is_ge())),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    /// Compiled bodies only reference declared names; a miss here means the
    /// body and slot table are out of sync.
    fn slot_of(code: &CodeBody, name: &str) -> Result<usize, RuntimeError> {
        code.slot(name)
            .ok_or_else(|| RuntimeError::Unassigned(name.to_string()))
    }
}
