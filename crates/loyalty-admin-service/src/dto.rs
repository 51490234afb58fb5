//! 请求与响应 DTO 定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    /// 创建成功响应（无数据）
    pub fn success_empty() -> ApiResponse<()> {
        ApiResponse {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: None,
        }
    }
}

/// 创建/更新规则请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEarningRuleRequest {
    #[validate(length(min = 1, max = 100, message = "规则名称长度须在 1-100 之间"))]
    pub name: String,
    /// 工作流定义 JSON，写入前经 validate_rule_json 校验
    #[validate(length(min = 1, message = "规则内容不能为空"))]
    pub rule_json: String,
    #[serde(default)]
    pub is_active: bool,
}

/// 规则状态更新请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleStatusRequest {
    pub is_active: bool,
}

/// 规则响应 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningRuleDto {
    pub id: i64,
    pub name: String,
    pub rule_json: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 交易创建/模拟请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[validate(range(min = 1, message = "用户 ID 无效"))]
    pub user_id: i64,
    #[validate(range(min = 0.0, message = "交易金额不能为负"))]
    pub amount: f64,
    #[serde(default = "default_transaction_kind")]
    pub kind: String,
    #[serde(default)]
    pub merchant_id: Option<i64>,
    /// 缺省时取服务端当前时间
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

fn default_transaction_kind() -> String {
    "purchase".to_string()
}

/// 交易响应 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub kind: String,
    pub merchant_id: Option<i64>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// 交易入账结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcomeDto {
    pub transaction: TransactionDto,
    pub points_earned: i64,
    pub current_balance: i64,
}

/// 交易模拟结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcomeDto {
    pub points_earned: i64,
}
