//! 规则引擎领域模型

use crate::eval::FactValue;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// 工作流定义（rule_json 的反序列化形态）
///
/// 字段名沿用管理端既有的 PascalCase 规则 JSON 方言，多余字段
/// （如 ErrorType、RuleExpressionType）在反序列化时被忽略。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkflowDef {
    pub workflow_name: String,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleDef {
    pub rule_name: String,
    #[serde(default)]
    pub error_message: Option<String>,
    /// 布尔表达式，在事实上下文上求值
    pub expression: String,
    #[serde(default)]
    pub actions: Option<RuleActions>,
}

/// 规则动作集合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleActions {
    #[serde(rename = "OnSuccess", default)]
    pub on_success: Option<SuccessAction>,
}

/// 成功动作
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SuccessAction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub context: Option<ActionContext>,
}

/// 成功动作上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionContext {
    /// 数值表达式，求值结果即该工作流授予的积分
    pub expression: String,
}

/// 一笔待评估的交易
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: i64,
    pub amount: f64,
    pub kind: String,
    pub merchant_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// 评估上下文 - 单次评估内不可变的事实集合
///
/// 由一笔交易加上该用户已持久化的历史交易数派生，每次评估重新构建，
/// 不持久化。
#[derive(Debug, Clone)]
pub struct FactContext {
    purchase_amount: f64,
    transaction_count: i64,
    user_id: i64,
    merchant_id: i64,
    transaction_date: String,
}

impl FactContext {
    /// 从交易构建事实上下文
    ///
    /// `prior_count` 为评估时刻该用户已持久化的交易数，不含当前交易。
    pub fn for_transaction(txn: &Transaction, prior_count: i64) -> Self {
        Self {
            purchase_amount: txn.amount,
            transaction_count: prior_count,
            user_id: txn.user_id,
            // 无商户的交易按 0 处理，规则可据此区分
            merchant_id: txn.merchant_id.unwrap_or(0),
            transaction_date: txn
                .occurred_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// 按名称获取事实值
    ///
    /// 表达式中的 `input.` 前缀可省略。
    pub fn get(&self, field: &str) -> Option<FactValue> {
        let name = field.strip_prefix("input.").unwrap_or(field);
        match name {
            "PurchaseAmount" => Some(FactValue::Number(self.purchase_amount)),
            "TransactionCount" => Some(FactValue::Number(self.transaction_count as f64)),
            "UserId" => Some(FactValue::Number(self.user_id as f64)),
            "MerchantId" => Some(FactValue::Number(self.merchant_id as f64)),
            "TransactionDate" => Some(FactValue::Str(self.transaction_date.clone())),
            _ => None,
        }
    }
}
