//! 规则存储边界
//!
//! 注册表通过 EarningRuleStore 读取启用中的规则记录，生产实现基于
//! PostgreSQL，测试中以 mock 或内存实现替代。

use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgPool;

/// 一条启用中的规则记录
#[derive(Debug, Clone)]
pub struct ActiveRule {
    pub id: i64,
    pub name: String,
    pub rule_json: String,
}

/// 规则存储访问接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EarningRuleStore: Send + Sync {
    /// 列出所有 is_active = true 的规则，按主键顺序返回
    async fn list_active(&self) -> Result<Vec<ActiveRule>>;
}

/// PostgreSQL 规则存储
pub struct PgEarningRuleStore {
    pool: PgPool,
}

impl PgEarningRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EarningRuleStore for PgEarningRuleStore {
    async fn list_active(&self) -> Result<Vec<ActiveRule>> {
        let rows = sqlx::query_as::<_, ActiveRuleRow>(
            r#"
            SELECT id, name, rule_json
            FROM earning_rules
            WHERE is_active = TRUE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// 数据库规则行
#[derive(sqlx::FromRow)]
struct ActiveRuleRow {
    id: i64,
    name: String,
    rule_json: String,
}

impl From<ActiveRuleRow> for ActiveRule {
    fn from(row: ActiveRuleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            rule_json: row.rule_json,
        }
    }
}
