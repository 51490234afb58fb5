//! 积分管理后台服务
//!
//! 提供积分获取规则管理与交易入账的 REST API。

use std::sync::Arc;

use axum::{Json, Router, http::HeaderValue, routing::get};
use earning_rules::{
    PgEarningRuleStore, PgTransactionHistory, TransactionEvaluator, WorkflowRegistry,
};
use loyalty_admin_service::{routes, state::AppState};
use loyalty_shared::{config::AppConfig, database::Database, observability};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 统一加载配置：从 config/{service_name}.toml 加载
    let config = AppConfig::load("loyalty-admin-service").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 从 AppConfig 中提取日志配置并注入服务名
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    observability::init(&obs_config)?;

    info!("Starting loyalty-admin-service on {}", config.server_addr());

    // 初始化基础设施
    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;

    // 构建规则引擎：存储 → 注册表 → 评估器
    let store = Arc::new(PgEarningRuleStore::new(db.pool().clone()));
    let registry = Arc::new(WorkflowRegistry::new(store));

    // 启动时做一次初始重载；失败不阻止服务启动，注册表以空集提供服务
    match registry.reload().await {
        Ok(count) => info!("Loaded {} active workflows from database", count),
        Err(e) => warn!(
            "Initial rule reload failed: {}, starting with empty workflow set",
            e
        ),
    }

    let history = Arc::new(PgTransactionHistory::new(db.pool().clone()));
    let evaluator = Arc::new(TransactionEvaluator::new(registry.clone(), history));

    let state = AppState::new(db.pool().clone(), registry, evaluator);

    // CORS 配置：通过 LOYALTY_CORS_ORIGINS 环境变量控制允许的来源
    let allowed_origins = std::env::var("LOYALTY_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3001,http://localhost:5173".to_string());

    let cors = if allowed_origins == "*" {
        if config.is_production() {
            warn!("LOYALTY_CORS_ORIGINS=\"*\" 在生产环境中不安全，请设置为具体域名");
        }
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", routes::api_routes())
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("HTTP server listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Service shutdown complete");
    Ok(())
}

/// 健康检查端点
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
