//! 表达式语法分析器
//!
//! 以优先级爬升方式将 Token 流解析为表达式树。语法：
//!
//! ```text
//! expr    := unary (binop expr)*        按优先级结合
//! unary   := ('!' | '-') unary | primary
//! primary := NUMBER | STRING | IDENT | 'true' | 'false' | '(' expr ')'
//! ```

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{Result, RuleError};
use crate::lexer::{Token, tokenize};

/// 解析表达式字符串为表达式树
pub fn parse_expression(input: &str) -> Result<Expr> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(RuleError::Syntax("表达式不能为空".to_string()));
    }

    let tokens = tokenize(trimmed)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_binary(0)?;

    if let Some(tok) = parser.peek() {
        return Err(RuleError::Syntax(format!("表达式末尾存在多余内容: '{}'", tok)));
    }

    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// 优先级爬升：解析所有优先级不低于 min_prec 的二元表达式
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = self.peek_binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();

            // 左结合：右侧子表达式只吸收更高优先级的操作符
            let rhs = self.parse_binary(prec + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        match self.peek()? {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Rem),
            Token::Eq => Some(BinaryOp::Eq),
            Token::Neq => Some(BinaryOp::Neq),
            Token::Lt => Some(BinaryOp::Lt),
            Token::Lte => Some(BinaryOp::Lte),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Gte => Some(BinaryOp::Gte),
            Token::And => Some(BinaryOp::And),
            Token::Or => Some(BinaryOp::Or),
            _ => None,
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            Some(Token::Minus) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Ident(name)) => Ok(Expr::Field(name)),
            Some(Token::LParen) => {
                let expr = self.parse_binary(0)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(RuleError::Syntax("缺少右括号 ')'".to_string())),
                }
            }
            Some(tok) => Err(RuleError::Syntax(format!("意外的 Token: '{}'", tok))),
            None => Err(RuleError::Syntax("表达式不完整".to_string())),
        }
    }
}
