//! 交易评估器
//!
//! 将一笔交易依次跑过所有活跃工作流，汇总得到本次交易应授予的积分。

use crate::compiler::CompiledWorkflow;
use crate::error::{Result, RuleError};
use crate::eval::{self, FactValue};
use crate::models::{FactContext, Transaction};
use crate::registry::WorkflowRegistry;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, warn};

/// 交易历史访问接口
///
/// 评估器只依赖"该用户已持久化的交易数"这一项历史数据，
/// 由调用方保证计数反映评估时刻的已落库状态。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    async fn transaction_count(&self, user_id: i64) -> Result<i64>;
}

/// PostgreSQL 交易历史
pub struct PgTransactionHistory {
    pool: PgPool,
}

impl PgTransactionHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionHistory for PgTransactionHistory {
    async fn transaction_count(&self, user_id: i64) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

/// 交易评估器
///
/// 只读组件：不修改注册表，也不产生任何持久化副作用。积分入账、
/// 历史记录由调用方（交易入账服务）负责。
pub struct TransactionEvaluator {
    registry: Arc<WorkflowRegistry>,
    history: Arc<dyn TransactionHistory>,
}

impl TransactionEvaluator {
    pub fn new(registry: Arc<WorkflowRegistry>, history: Arc<dyn TransactionHistory>) -> Self {
        Self { registry, history }
    }

    /// 评估一笔交易，返回应授予的积分总数
    ///
    /// TransactionCount 事实取自已持久化的交易，不含当前这笔——
    /// 入账流程先评估后落库，计数只反映此前已落库的数据。
    pub async fn evaluate(&self, txn: &Transaction) -> Result<i64> {
        let prior_count = self.history.transaction_count(txn.user_id).await?;
        Ok(self.evaluate_with_count(txn, prior_count))
    }

    /// 使用给定的历史交易数评估
    ///
    /// 单个工作流执行失败只记录日志并按 0 分计，不中断其余工作流；
    /// 所有成功结果求和，最终结果不为负。无规则命中返回 0，不是错误。
    pub fn evaluate_with_count(&self, txn: &Transaction, prior_count: i64) -> i64 {
        let facts = FactContext::for_transaction(txn, prior_count);
        let snapshot = self.registry.snapshot();

        let mut total: i64 = 0;
        for workflow in snapshot.iter() {
            match run_workflow(workflow, &facts) {
                Ok(points) => {
                    debug!(workflow = %workflow.name, points, "工作流评估完成");
                    total += points;
                }
                Err(e) => {
                    warn!(
                        workflow = %workflow.name,
                        error = %e,
                        "工作流执行失败，该工作流按 0 分计"
                    );
                }
            }
        }

        total.max(0)
    }
}

/// 执行单个工作流
///
/// 规则按定义顺序求值，首个断言命中的规则生效，其后的规则不再执行。
/// 命中规则无动作表达式时贡献 0 分。
fn run_workflow(workflow: &CompiledWorkflow, facts: &FactContext) -> Result<i64> {
    for rule in &workflow.rules {
        let matched = match eval::evaluate(&rule.predicate, facts)? {
            FactValue::Bool(b) => b,
            other => {
                return Err(RuleError::TypeMismatch {
                    expected: "boolean".to_string(),
                    actual: other.type_name().to_string(),
                });
            }
        };

        if matched {
            let Some(action) = &rule.action else {
                return Ok(0);
            };
            return eval::evaluate(action, facts)?.as_points();
        }
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ActiveRule, MockEarningRuleStore};
    use chrono::Utc;

    fn purchase(user_id: i64, amount: f64) -> Transaction {
        Transaction {
            user_id,
            amount,
            kind: "purchase".to_string(),
            merchant_id: None,
            occurred_at: Utc::now(),
        }
    }

    async fn registry_with_rules(rules: Vec<(&str, String)>) -> Arc<WorkflowRegistry> {
        let owned: Vec<ActiveRule> = rules
            .into_iter()
            .enumerate()
            .map(|(i, (name, json))| ActiveRule {
                id: i as i64 + 1,
                name: name.to_string(),
                rule_json: json,
            })
            .collect();

        let mut store = MockEarningRuleStore::new();
        store
            .expect_list_active()
            .returning(move || Ok(owned.clone()));

        let registry = Arc::new(WorkflowRegistry::new(Arc::new(store)));
        registry.reload().await.unwrap();
        registry
    }

    fn evaluator_for(registry: Arc<WorkflowRegistry>, count: i64) -> TransactionEvaluator {
        let mut history = MockTransactionHistory::new();
        history
            .expect_transaction_count()
            .returning(move |_| Ok(count));
        TransactionEvaluator::new(registry, Arc::new(history))
    }

    fn threshold_workflow(name: &str, threshold: i64, points: i64) -> String {
        format!(
            r#"
            {{
                "WorkflowName": "{}",
                "Rules": [
                    {{
                        "RuleName": "AmountGreaterThan{}",
                        "Expression": "input.PurchaseAmount > {}",
                        "Actions": {{
                            "OnSuccess": {{ "Context": {{ "Expression": "{}" }} }}
                        }}
                    }}
                ]
            }}
            "#,
            name, threshold, threshold, points
        )
    }

    #[tokio::test]
    async fn test_single_workflow_match() {
        let registry =
            registry_with_rules(vec![("purchase", threshold_workflow("PurchaseRule", 5000, 100))])
                .await;
        let evaluator = evaluator_for(registry, 0);

        assert_eq!(evaluator.evaluate(&purchase(1, 6000.0)).await.unwrap(), 100);
        assert_eq!(evaluator.evaluate(&purchase(1, 4000.0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_matching_workflows_are_summed() {
        let registry = registry_with_rules(vec![
            ("big", threshold_workflow("BigPurchase", 5000, 100)),
            ("small", threshold_workflow("AnyPurchase", 1000, 20)),
        ])
        .await;
        let evaluator = evaluator_for(registry, 0);

        // 两个工作流都命中：100 + 20
        assert_eq!(evaluator.evaluate(&purchase(1, 6000.0)).await.unwrap(), 120);
        // 只有低门槛命中
        assert_eq!(evaluator.evaluate(&purchase(1, 2000.0)).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_first_success_wins_within_workflow() {
        let json = r#"
        {
            "WorkflowName": "Tiered",
            "Rules": [
                {
                    "RuleName": "over1000",
                    "Expression": "input.PurchaseAmount > 1000",
                    "Actions": { "OnSuccess": { "Context": { "Expression": "50" } } }
                },
                {
                    "RuleName": "over100",
                    "Expression": "input.PurchaseAmount > 100",
                    "Actions": { "OnSuccess": { "Context": { "Expression": "10" } } }
                }
            ]
        }
        "#;

        let registry = registry_with_rules(vec![("tiered", json.to_string())]).await;
        let evaluator = evaluator_for(registry, 0);

        // 两条规则的条件都满足，但只有第一条生效
        assert_eq!(evaluator.evaluate(&purchase(1, 2000.0)).await.unwrap(), 50);
        // 只有第二条满足
        assert_eq!(evaluator.evaluate(&purchase(1, 500.0)).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_failing_workflow_contributes_zero() {
        // 第一个工作流的动作结果是字符串，执行报错；第二个正常
        let bad = r#"
        {
            "WorkflowName": "Broken",
            "Rules": [
                {
                    "RuleName": "always",
                    "Expression": "input.PurchaseAmount > 0",
                    "Actions": { "OnSuccess": { "Context": { "Expression": "'oops'" } } }
                }
            ]
        }
        "#;

        let registry = registry_with_rules(vec![
            ("broken", bad.to_string()),
            ("good", threshold_workflow("Good", 100, 30)),
        ])
        .await;
        let evaluator = evaluator_for(registry, 0);

        assert_eq!(evaluator.evaluate(&purchase(1, 500.0)).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_non_integer_action_is_workflow_error() {
        let json = r#"
        {
            "WorkflowName": "Fractional",
            "Rules": [
                {
                    "RuleName": "always",
                    "Expression": "input.PurchaseAmount > 0",
                    "Actions": { "OnSuccess": { "Context": { "Expression": "10.5" } } }
                }
            ]
        }
        "#;

        let registry = registry_with_rules(vec![("frac", json.to_string())]).await;
        let evaluator = evaluator_for(registry, 0);

        assert_eq!(evaluator.evaluate(&purchase(1, 500.0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_matched_rule_without_action_contributes_zero() {
        let json = r#"
        {
            "WorkflowName": "NoAction",
            "Rules": [
                { "RuleName": "always", "Expression": "input.PurchaseAmount > 0" }
            ]
        }
        "#;

        let registry = registry_with_rules(vec![("noaction", json.to_string())]).await;
        let evaluator = evaluator_for(registry, 0);

        assert_eq!(evaluator.evaluate(&purchase(1, 500.0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transaction_count_fact() {
        let json = r#"
        {
            "WorkflowName": "LoyalCustomer",
            "Rules": [
                {
                    "RuleName": "frequent",
                    "Expression": "input.TransactionCount >= 5",
                    "Actions": { "OnSuccess": { "Context": { "Expression": "200" } } }
                }
            ]
        }
        "#;

        let registry = registry_with_rules(vec![("loyal", json.to_string())]).await;

        let evaluator = evaluator_for(registry.clone(), 5);
        assert_eq!(evaluator.evaluate(&purchase(1, 100.0)).await.unwrap(), 200);

        let evaluator = evaluator_for(registry, 4);
        assert_eq!(evaluator.evaluate(&purchase(1, 100.0)).await.unwrap(), 0);
    }

    /// 计数以已落库数据为准，不含正在评估的这笔交易。
    /// 用户已有 4 笔历史交易时，第 5 笔交易评估看到的计数是 4。
    #[tokio::test]
    async fn prior_count_excludes_transaction_under_evaluation() {
        let json = r#"
        {
            "WorkflowName": "FifthVisit",
            "Rules": [
                {
                    "RuleName": "fifth",
                    "Expression": "input.TransactionCount == 4",
                    "Actions": { "OnSuccess": { "Context": { "Expression": "500" } } }
                }
            ]
        }
        "#;

        let registry = registry_with_rules(vec![("fifth", json.to_string())]).await;
        let evaluator = evaluator_for(registry, 4);

        assert_eq!(evaluator.evaluate(&purchase(1, 100.0)).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_negative_total_clamped_to_zero() {
        let json = r#"
        {
            "WorkflowName": "Penalty",
            "Rules": [
                {
                    "RuleName": "always",
                    "Expression": "input.PurchaseAmount > 0",
                    "Actions": { "OnSuccess": { "Context": { "Expression": "-50" } } }
                }
            ]
        }
        "#;

        let registry = registry_with_rules(vec![("penalty", json.to_string())]).await;
        let evaluator = evaluator_for(registry, 0);

        assert_eq!(evaluator.evaluate(&purchase(1, 500.0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_registry_yields_zero() {
        let registry = registry_with_rules(vec![]).await;
        let evaluator = evaluator_for(registry, 0);

        assert_eq!(evaluator.evaluate(&purchase(1, 9999.0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_history_failure_propagates() {
        let registry =
            registry_with_rules(vec![("purchase", threshold_workflow("PurchaseRule", 5000, 100))])
                .await;

        let mut history = MockTransactionHistory::new();
        history
            .expect_transaction_count()
            .returning(|_| Err(RuleError::Store(sqlx::Error::PoolTimedOut)));
        let evaluator = TransactionEvaluator::new(registry, Arc::new(history));

        assert!(evaluator.evaluate(&purchase(1, 6000.0)).await.is_err());
    }
}
