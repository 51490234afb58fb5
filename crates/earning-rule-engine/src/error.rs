//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    Parse(String),

    #[error("表达式语法错误: {0}")]
    Syntax(String),

    #[error("规则编译失败: {0}")]
    Compile(String),

    #[error("规则执行失败: {0}")]
    Evaluation(String),

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("字段不存在: {0}")]
    FieldNotFound(String),

    #[error("JSON 反序列化错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("规则存储访问失败: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
