//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::{handlers, state::AppState};

/// 构建规则管理路由
///
/// 包含规则 CRUD 和启停操作，写入成功后由 handler 触发注册表重载
pub fn earning_rule_routes() -> Router<AppState> {
    Router::new()
        .route("/earning-rules", post(handlers::earning_rule::create_rule))
        .route("/earning-rules", get(handlers::earning_rule::list_rules))
        .route("/earning-rules/{id}", get(handlers::earning_rule::get_rule))
        .route("/earning-rules/{id}", put(handlers::earning_rule::update_rule))
        .route(
            "/earning-rules/{id}",
            delete(handlers::earning_rule::delete_rule),
        )
        .route(
            "/earning-rules/{id}/status",
            patch(handlers::earning_rule::update_rule_status),
        )
}

/// 构建交易入账路由
///
/// 包含交易创建（评估并结算积分）和模拟评估
pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            post(handlers::transaction::create_transaction),
        )
        .route(
            "/transactions/simulate",
            post(handlers::transaction::simulate_transaction),
        )
}

/// 构建完整的 API 路由
///
/// 返回所有管理后台 API 路由（不含前缀，由调用方在 main.rs 中挂载）
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(earning_rule_routes())
        .merge(transaction_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_construction() {
        let _rules = earning_rule_routes();
        let _transactions = transaction_routes();
        let _api = api_routes();
    }
}
