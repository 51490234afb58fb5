//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use earning_rules::{TransactionEvaluator, WorkflowRegistry};
use sqlx::PgPool;
use std::sync::Arc;

/// Axum 应用共享状态
///
/// 包含数据库连接池、工作流注册表和交易评估器，通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL 连接池
    pub pool: PgPool,
    /// 工作流注册表（规则写入后由 handler 触发 reload）
    pub registry: Arc<WorkflowRegistry>,
    /// 交易评估器
    pub evaluator: Arc<TransactionEvaluator>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        pool: PgPool,
        registry: Arc<WorkflowRegistry>,
        evaluator: Arc<TransactionEvaluator>,
    ) -> Self {
        Self {
            pool,
            registry,
            evaluator,
        }
    }
}
