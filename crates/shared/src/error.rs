//! 统一错误处理模块
//!
//! 定义各服务共享的基础错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("配置加载失败: {0}")]
    Config(String),

    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl LoyaltyError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = LoyaltyError::NotFound {
            entity: "EarningRule".to_string(),
            id: "123".to_string(),
        };
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = LoyaltyError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let validation = LoyaltyError::Validation("name".to_string());
        assert!(!validation.is_retryable());
    }

    #[test]
    fn test_display_contains_context() {
        let err = LoyaltyError::NotFound {
            entity: "EarningRule".to_string(),
            id: "42".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("EarningRule"));
        assert!(msg.contains("42"));
    }
}
