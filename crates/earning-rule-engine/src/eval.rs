//! 表达式求值器
//!
//! 在事实上下文上对表达式树求值，实现各操作符对多种数据类型的比较逻辑。

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{Result, RuleError};
use crate::models::FactContext;

/// 事实值
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    Number(f64),
    Bool(bool),
    Str(String),
}

impl FactValue {
    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Str(_) => "string",
        }
    }

    /// 转换为积分值
    ///
    /// 成功动作的结果必须是可精确转换为整数的数值，其余一律视为类型错误。
    pub fn as_points(&self) -> Result<i64> {
        match self {
            Self::Number(n) if n.fract().abs() < f64::EPSILON && n.is_finite() => Ok(*n as i64),
            Self::Number(n) => Err(RuleError::Evaluation(format!(
                "动作结果不是整数: {}",
                n
            ))),
            other => Err(RuleError::TypeMismatch {
                expected: "number".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(RuleError::TypeMismatch {
                expected: "boolean".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    fn as_number(&self) -> Result<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            other => Err(RuleError::TypeMismatch {
                expected: "number".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }
}

/// 在事实上下文上对表达式求值
pub fn evaluate(expr: &Expr, facts: &FactContext) -> Result<FactValue> {
    match expr {
        Expr::Number(n) => Ok(FactValue::Number(*n)),
        Expr::Str(s) => Ok(FactValue::Str(s.clone())),
        Expr::Bool(b) => Ok(FactValue::Bool(*b)),
        Expr::Field(name) => facts
            .get(name)
            .ok_or_else(|| RuleError::FieldNotFound(name.clone())),
        Expr::Unary { op, operand } => evaluate_unary(*op, operand, facts),
        Expr::Binary { op, lhs, rhs } => evaluate_binary(*op, lhs, rhs, facts),
    }
}

fn evaluate_unary(op: UnaryOp, operand: &Expr, facts: &FactContext) -> Result<FactValue> {
    let value = evaluate(operand, facts)?;
    match op {
        UnaryOp::Not => Ok(FactValue::Bool(!value.as_bool()?)),
        UnaryOp::Neg => Ok(FactValue::Number(-value.as_number()?)),
    }
}

fn evaluate_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, facts: &FactContext) -> Result<FactValue> {
    // 逻辑操作符短路求值，右侧在需要时才计算
    match op {
        BinaryOp::And => {
            if !evaluate(lhs, facts)?.as_bool()? {
                return Ok(FactValue::Bool(false));
            }
            return Ok(FactValue::Bool(evaluate(rhs, facts)?.as_bool()?));
        }
        BinaryOp::Or => {
            if evaluate(lhs, facts)?.as_bool()? {
                return Ok(FactValue::Bool(true));
            }
            return Ok(FactValue::Bool(evaluate(rhs, facts)?.as_bool()?));
        }
        _ => {}
    }

    let left = evaluate(lhs, facts)?;
    let right = evaluate(rhs, facts)?;

    match op {
        BinaryOp::Add => Ok(FactValue::Number(left.as_number()? + right.as_number()?)),
        BinaryOp::Sub => Ok(FactValue::Number(left.as_number()? - right.as_number()?)),
        BinaryOp::Mul => Ok(FactValue::Number(left.as_number()? * right.as_number()?)),
        BinaryOp::Div => {
            let divisor = right.as_number()?;
            if divisor == 0.0 {
                return Err(RuleError::Evaluation("除数为零".to_string()));
            }
            Ok(FactValue::Number(left.as_number()? / divisor))
        }
        BinaryOp::Rem => {
            let divisor = right.as_number()?;
            if divisor == 0.0 {
                return Err(RuleError::Evaluation("除数为零".to_string()));
            }
            Ok(FactValue::Number(left.as_number()? % divisor))
        }
        BinaryOp::Eq => Ok(FactValue::Bool(values_equal(&left, &right))),
        BinaryOp::Neq => Ok(FactValue::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt => compare(&left, &right, |ord| ord == std::cmp::Ordering::Less),
        BinaryOp::Lte => compare(&left, &right, |ord| ord != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(&left, &right, |ord| ord == std::cmp::Ordering::Greater),
        BinaryOp::Gte => compare(&left, &right, |ord| ord != std::cmp::Ordering::Less),
        BinaryOp::And | BinaryOp::Or => unreachable!(),
    }
}

/// 相等比较
///
/// 数值统一按浮点比较，避免整数和浮点字面量比较失败（如 100 == 100.0）。
/// 类型不同的值不相等，不报错。
fn values_equal(left: &FactValue, right: &FactValue) -> bool {
    match (left, right) {
        (FactValue::Number(a), FactValue::Number(b)) => (a - b).abs() < f64::EPSILON,
        (FactValue::Bool(a), FactValue::Bool(b)) => a == b,
        (FactValue::Str(a), FactValue::Str(b)) => a == b,
        _ => false,
    }
}

/// 顺序比较
///
/// 数值按浮点排序；字符串按字典序排序（RFC 3339 时间串的字典序即时间序）。
/// 其余组合为类型错误。
fn compare<F>(left: &FactValue, right: &FactValue, pred: F) -> Result<FactValue>
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    let ordering = match (left, right) {
        (FactValue::Number(a), FactValue::Number(b)) => {
            a.partial_cmp(b).ok_or_else(|| {
                RuleError::Evaluation("数值比较结果未定义 (NaN)".to_string())
            })?
        }
        (FactValue::Str(a), FactValue::Str(b)) => a.cmp(b),
        (a, b) => {
            return Err(RuleError::TypeMismatch {
                expected: a.type_name().to_string(),
                actual: b.type_name().to_string(),
            });
        }
    };

    Ok(FactValue::Bool(pred(ordering)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FactContext, Transaction};
    use crate::parser::parse_expression;
    use chrono::{TimeZone, Utc};

    fn sample_facts() -> FactContext {
        let txn = Transaction {
            user_id: 7,
            amount: 6000.0,
            kind: "purchase".to_string(),
            merchant_id: Some(3),
            occurred_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        };
        FactContext::for_transaction(&txn, 4)
    }

    fn eval_str(input: &str) -> Result<FactValue> {
        let expr = parse_expression(input).unwrap();
        evaluate(&expr, &sample_facts())
    }

    #[test]
    fn test_field_lookup() {
        assert_eq!(
            eval_str("input.PurchaseAmount").unwrap(),
            FactValue::Number(6000.0)
        );
        // input. 前缀可省略
        assert_eq!(eval_str("PurchaseAmount").unwrap(), FactValue::Number(6000.0));
        assert_eq!(eval_str("TransactionCount").unwrap(), FactValue::Number(4.0));
    }

    #[test]
    fn test_unknown_field_is_error() {
        assert!(matches!(
            eval_str("input.Nonexistent"),
            Err(RuleError::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            eval_str("input.PurchaseAmount > 5000").unwrap(),
            FactValue::Bool(true)
        );
        assert_eq!(
            eval_str("input.PurchaseAmount < 5000").unwrap(),
            FactValue::Bool(false)
        );
        assert_eq!(
            eval_str("input.TransactionCount >= 4").unwrap(),
            FactValue::Bool(true)
        );
        assert_eq!(
            eval_str("input.TransactionCount <= 3").unwrap(),
            FactValue::Bool(false)
        );
    }

    #[test]
    fn test_equality_numeric_tolerance() {
        assert_eq!(eval_str("100 == 100.0").unwrap(), FactValue::Bool(true));
        assert_eq!(eval_str("100 != 101").unwrap(), FactValue::Bool(true));
    }

    #[test]
    fn test_equality_cross_type_is_false() {
        assert_eq!(eval_str("100 == 'abc'").unwrap(), FactValue::Bool(false));
        assert_eq!(eval_str("100 != 'abc'").unwrap(), FactValue::Bool(true));
    }

    #[test]
    fn test_logical_short_circuit() {
        // 右侧引用不存在的字段，短路后不应报错
        assert_eq!(
            eval_str("false && input.Nonexistent == 1").unwrap(),
            FactValue::Bool(false)
        );
        assert_eq!(
            eval_str("true || input.Nonexistent == 1").unwrap(),
            FactValue::Bool(true)
        );
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            eval_str("input.PurchaseAmount / 100 + 10").unwrap(),
            FactValue::Number(70.0)
        );
        assert_eq!(eval_str("7 % 3").unwrap(), FactValue::Number(1.0));
        assert_eq!(eval_str("-5 + 3").unwrap(), FactValue::Number(-2.0));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(eval_str("1 / 0"), Err(RuleError::Evaluation(_))));
        assert!(matches!(eval_str("1 % 0"), Err(RuleError::Evaluation(_))));
    }

    #[test]
    fn test_type_mismatch_in_comparison() {
        assert!(matches!(
            eval_str("input.PurchaseAmount > 'abc'"),
            Err(RuleError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_logical_requires_bool() {
        assert!(matches!(
            eval_str("1 && true"),
            Err(RuleError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_string_comparison_orders_dates() {
        assert_eq!(
            eval_str("input.TransactionDate > '2025-01-01T00:00:00Z'").unwrap(),
            FactValue::Bool(true)
        );
        assert_eq!(
            eval_str("input.TransactionDate < '2024-01-01T00:00:00Z'").unwrap(),
            FactValue::Bool(false)
        );
    }

    #[test]
    fn test_as_points() {
        assert_eq!(FactValue::Number(100.0).as_points().unwrap(), 100);
        assert!(FactValue::Number(10.5).as_points().is_err());
        assert!(FactValue::Bool(true).as_points().is_err());
        assert!(FactValue::Str("100".to_string()).as_points().is_err());
    }
}
