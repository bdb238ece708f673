//! Recursive-descent parser producing the [`ast`] tree.
//!
//! The grammar is small: a module is a sequence of functions and groups,
//! function bodies are statement blocks, and expressions use conventional
//! precedence (`||` < `&&` < equality < comparison < additive <
//! multiplicative < unary < call).
//!
//! [`ast`]: crate::ast

use crate::ast::{
    BinaryOp, Block, Expr, FunctionDecl, GroupDecl, Item, Module, Stmt, StmtKind, UnaryOp,
};
use crate::error::ParseError;
use crate::lex::{lex, Tok, Token};

/// Parse a whole source file.
pub fn parse_module(src: &str) -> Result<Module, ParseError> {
    let tokens = lex(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let items = parser.items_until_end(None)?;
    Ok(Module { items })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Line of the current token, or of the last token at end of input.
    fn line(&self) -> u32 {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::Unexpected {
                expected: expected.to_string(),
                found: token.tok.describe(),
                line: token.line,
            },
            None => ParseError::UnexpectedEof { expected: expected.to_string() },
        }
    }

    fn expect(&mut self, tok: &Tok, expected: &str) -> Result<Token, ParseError> {
        match self.peek() {
            Some(token) if token.tok == *tok => {
                let token = token.clone();
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(String, u32), ParseError> {
        match self.peek() {
            Some(Token { tok: Tok::Ident(name), line }) => {
                let result = (name.clone(), *line);
                self.pos += 1;
                Ok(result)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Items until end of input (`until` = None) or until a closing brace
    /// (`until` = Some(Tok::RBrace)), which is left unconsumed.
    fn items_until_end(&mut self, until: Option<&Tok>) -> Result<Vec<Item>, ParseError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => {
                    if until.is_some() {
                        return Err(self.unexpected("`}`"));
                    }
                    return Ok(items);
                }
                Some(token) if until == Some(&token.tok) => return Ok(items),
                Some(Token { tok: Tok::Fn, .. }) => items.push(Item::Function(self.function()?)),
                Some(Token { tok: Tok::Group, .. }) => items.push(Item::Group(self.group()?)),
                _ => return Err(self.unexpected("`fn` or `group`")),
            }
        }
    }

    fn function(&mut self) -> Result<FunctionDecl, ParseError> {
        let fn_tok = self.expect(&Tok::Fn, "`fn`")?;
        let (name, _) = self.expect_ident("function name")?;
        self.expect(&Tok::LParen, "`(`")?;
        let mut params = Vec::new();
        if self.peek().is_some_and(|t| t.tok != Tok::RParen) {
            loop {
                let (param, _) = self.expect_ident("parameter name")?;
                params.push(param);
                match self.peek() {
                    Some(Token { tok: Tok::Comma, .. }) => {
                        self.next();
                    }
                    _ => break,
                }
            }
        }
        self.expect(&Tok::RParen, "`)`")?;
        let (body, end_line) = self.block()?;
        Ok(FunctionDecl { name, params, line: fn_tok.line, end_line, body })
    }

    fn group(&mut self) -> Result<GroupDecl, ParseError> {
        let group_tok = self.expect(&Tok::Group, "`group`")?;
        let (name, _) = self.expect_ident("group name")?;
        self.expect(&Tok::LBrace, "`{`")?;
        let items = self.items_until_end(Some(&Tok::RBrace))?;
        let close = self.expect(&Tok::RBrace, "`}`")?;
        Ok(GroupDecl { name, line: group_tok.line, end_line: close.line, items })
    }

    /// A braced statement block. Returns the block and its closing-brace line.
    fn block(&mut self) -> Result<(Block, u32), ParseError> {
        self.expect(&Tok::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                Some(Token { tok: Tok::RBrace, .. }) => break,
                Some(_) => stmts.push(self.stmt()?),
                None => return Err(self.unexpected("`}`")),
            }
        }
        let close = self.expect(&Tok::RBrace, "`}`")?;
        Ok((Block { stmts }, close.line))
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        let kind = match self.peek().map(|t| &t.tok) {
            Some(Tok::Let) => {
                self.next();
                let (name, _) = self.expect_ident("variable name")?;
                self.expect(&Tok::Assign, "`=`")?;
                let value = self.expr()?;
                self.expect(&Tok::Semi, "`;`")?;
                StmtKind::Let { name, value }
            }
            Some(Tok::Return) => {
                self.next();
                let value = if self.peek().is_some_and(|t| t.tok == Tok::Semi) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(&Tok::Semi, "`;`")?;
                StmtKind::Return(value)
            }
            Some(Tok::If) => return self.if_stmt(),
            Some(Tok::While) => {
                self.next();
                let cond = self.expr()?;
                let (body, _) = self.block()?;
                StmtKind::While { cond, body }
            }
            Some(Tok::Ident(_)) if self.peek2().is_some_and(|t| t.tok == Tok::Assign) => {
                let (name, _) = self.expect_ident("variable name")?;
                self.next(); // `=`
                let value = self.expr()?;
                self.expect(&Tok::Semi, "`;`")?;
                StmtKind::Assign { name, value }
            }
            Some(_) => {
                let value = self.expr()?;
                self.expect(&Tok::Semi, "`;`")?;
                StmtKind::Expr(value)
            }
            None => return Err(self.unexpected("statement")),
        };
        Ok(Stmt { line, kind })
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let if_tok = self.expect(&Tok::If, "`if`")?;
        let cond = self.expr()?;
        let (then_body, _) = self.block()?;
        let else_body = if self.peek().is_some_and(|t| t.tok == Tok::Else) {
            self.next();
            if self.peek().is_some_and(|t| t.tok == Tok::If) {
                // `else if` desugars to an else block holding one if statement
                let nested = self.if_stmt()?;
                Some(Block { stmts: vec![nested] })
            } else {
                let (body, _) = self.block()?;
                Some(body)
            }
        } else {
            None
        };
        Ok(Stmt { line: if_tok.line, kind: StmtKind::If { cond, then_body, else_body } })
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.peek().is_some_and(|t| t.tok == Tok::OrOr) {
            self.next();
            let rhs = self.and_expr()?;
            lhs = Expr::Binary { op: BinaryOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.equality()?;
        while self.peek().is_some_and(|t| t.tok == Tok::AndAnd) {
            self.next();
            let rhs = self.equality()?;
            lhs = Expr::Binary { op: BinaryOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek().map(|t| &t.tok) {
                Some(Tok::Eq) => BinaryOp::Eq,
                Some(Tok::Ne) => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.comparison()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek().map(|t| &t.tok) {
                Some(Tok::Lt) => BinaryOp::Lt,
                Some(Tok::Le) => BinaryOp::Le,
                Some(Tok::Gt) => BinaryOp::Gt,
                Some(Tok::Ge) => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.additive()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().map(|t| &t.tok) {
                Some(Tok::Plus) => BinaryOp::Add,
                Some(Tok::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().map(|t| &t.tok) {
                Some(Tok::Star) => BinaryOp::Mul,
                Some(Tok::Slash) => BinaryOp::Div,
                Some(Tok::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().map(|t| &t.tok) {
            Some(Tok::Minus) => Some(UnaryOp::Neg),
            Some(Tok::Not) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.next();
            let operand = self.unary()?;
            return Ok(Expr::Unary { op, operand: Box::new(operand) });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().map(|t| &t.tok) {
            Some(Tok::Int(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(Expr::Int(v))
            }
            Some(Tok::Float(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(Expr::Float(v))
            }
            Some(Tok::Str(v)) => {
                let v = v.clone();
                self.pos += 1;
                Ok(Expr::Str(v))
            }
            Some(Tok::True) => {
                self.next();
                Ok(Expr::Bool(true))
            }
            Some(Tok::False) => {
                self.next();
                Ok(Expr::Bool(false))
            }
            Some(Tok::LParen) => {
                self.next();
                if self.peek().is_some_and(|t| t.tok == Tok::RParen) {
                    self.next();
                    return Ok(Expr::Unit);
                }
                let inner = self.expr()?;
                self.expect(&Tok::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Tok::Ident(_)) => self.path_or_call(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn path_or_call(&mut self) -> Result<Expr, ParseError> {
        let (first, _) = self.expect_ident("identifier")?;
        let mut path = vec![first];
        while self.peek().is_some_and(|t| t.tok == Tok::Dot) {
            self.next();
            let (segment, _) = self.expect_ident("identifier after `.`")?;
            path.push(segment);
        }
        if self.peek().is_some_and(|t| t.tok == Tok::LParen) {
            self.next();
            let mut args = Vec::new();
            if self.peek().is_some_and(|t| t.tok != Tok::RParen) {
                loop {
                    args.push(self.expr()?);
                    match self.peek() {
                        Some(Token { tok: Tok::Comma, .. }) => {
                            self.next();
                        }
                        _ => break,
                    }
                }
            }
            self.expect(&Tok::RParen, "`)`")?;
            return Ok(Expr::Call { callee: path, args });
        }
        if path.len() > 1 {
            return Err(self.unexpected("`(` after dotted name"));
        }
        Ok(Expr::Var(path.remove(0)))
    }
}
