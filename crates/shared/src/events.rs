//! 领域事件模型
//!
//! 定义积分系统对外发布的领域事件。事件随业务写入同一事务持久化到
//! loyalty_events 表，payload 以 JSON 承载事件明细。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 事件类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyEventType {
    /// 交易触发规则评估并产生积分
    PointsEarned,
}

impl std::fmt::Display for LoyaltyEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PointsEarned => write!(f, "points_earned"),
        }
    }
}

/// 积分到账事件
///
/// 携带本次评估授予的积分、到账后的余额以及来源交易，供下游
/// （通知、报表）消费。event_id 使用 UUID v7，时间有序便于索引。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsEarnedEvent {
    pub event_id: String,
    pub user_id: i64,
    pub points: i64,
    pub new_balance: i64,
    pub source_transaction_id: i64,
    pub timestamp: DateTime<Utc>,
}

impl PointsEarnedEvent {
    pub fn new(user_id: i64, points: i64, new_balance: i64, source_transaction_id: i64) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            user_id,
            points,
            new_balance,
            source_transaction_id,
            timestamp: Utc::now(),
        }
    }

    pub fn event_type(&self) -> LoyaltyEventType {
        LoyaltyEventType::PointsEarned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display() {
        assert_eq!(LoyaltyEventType::PointsEarned.to_string(), "points_earned");
    }

    #[test]
    fn test_points_earned_event_serialization() {
        let event = PointsEarnedEvent::new(42, 100, 600, 7);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["userId"], 42);
        assert_eq!(json["points"], 100);
        assert_eq!(json["newBalance"], 600);
        assert_eq!(json["sourceTransactionId"], 7);
        assert!(json["eventId"].as_str().is_some());
    }

    #[test]
    fn test_event_ids_unique() {
        let a = PointsEarnedEvent::new(1, 10, 10, 1);
        let b = PointsEarnedEvent::new(1, 10, 20, 2);
        assert_ne!(a.event_id, b.event_id);
    }
}
