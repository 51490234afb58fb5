//! 表达式词法分析器
//!
//! 将规则表达式字符串（如 `input.PurchaseAmount > 5000`）切分为 Token 流。

use crate::error::{Result, RuleError};
use std::fmt;

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// 数值字面量（统一为 f64）
    Number(f64),
    /// 字符串字面量（单引号或双引号）
    Str(String),
    /// 标识符，允许点号路径（如 input.PurchaseAmount）
    Ident(String),
    True,
    False,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,

    And,
    Or,
    Not,

    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::Ident(s) => write!(f, "{}", s),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Percent => write!(f, "%"),
            Self::Eq => write!(f, "=="),
            Self::Neq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::And => write!(f, "&&"),
            Self::Or => write!(f, "||"),
            Self::Not => write!(f, "!"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
        }
    }
}

/// 将表达式字符串切分为 Token 流
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '0'..='9' => {
                tokens.push(read_number(&mut chars)?);
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                tokens.push(read_ident(&mut chars));
            }
            '\'' | '"' => {
                tokens.push(read_string(&mut chars)?);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Eq);
                } else {
                    return Err(RuleError::Syntax(
                        "单个 '=' 不是有效操作符，赋值不受支持".to_string(),
                    ));
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Neq);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Lte);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Gte);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::And);
                } else {
                    return Err(RuleError::Syntax("'&' 应写作 '&&'".to_string()));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::Or);
                } else {
                    return Err(RuleError::Syntax("'|' 应写作 '||'".to_string()));
                }
            }
            other => {
                return Err(RuleError::Syntax(format!("无法识别的字符: '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Token> {
    let mut text = String::new();
    let mut seen_dot = false;

    while let Some(&c) = chars.peek() {
        match c {
            '0'..='9' => {
                text.push(c);
                chars.next();
            }
            '.' if !seen_dot => {
                // 区分小数点与路径点号：点号后必须紧跟数字才属于数值
                let mut lookahead = chars.clone();
                lookahead.next();
                match lookahead.peek() {
                    Some('0'..='9') => {
                        seen_dot = true;
                        text.push(c);
                        chars.next();
                    }
                    _ => break,
                }
            }
            _ => break,
        }
    }

    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|_| RuleError::Syntax(format!("无效的数值字面量: '{}'", text)))
}

fn read_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Token {
    let mut text = String::new();

    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }

    match text.as_str() {
        "true" => Token::True,
        "false" => Token::False,
        _ => Token::Ident(text),
    }
}

fn read_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Token> {
    let quote = chars.next().expect("调用方已确认引号存在");
    let mut text = String::new();

    for c in chars.by_ref() {
        if c == quote {
            return Ok(Token::Str(text));
        }
        text.push(c);
    }

    Err(RuleError::Syntax("字符串字面量未闭合".to_string()))
}
