//! 交易入账 API 处理器
//!
//! 实现交易创建（入账）与模拟评估。入账流程：先评估积分，再在同一
//! 数据库事务中落库交易、更新余额、追加积分历史与领域事件。评估在
//! 落库之前进行，因此 TransactionCount 事实不含当前这笔交易。

use axum::{Json, extract::State};
use chrono::Utc;
use earning_rules::Transaction;
use loyalty_shared::events::PointsEarnedEvent;
use tracing::info;
use validator::Validate;

use crate::{
    dto::{
        ApiResponse, SimulationOutcomeDto, TransactionDto, TransactionOutcomeDto,
        TransactionRequest,
    },
    error::AdminError,
    state::AppState,
};

/// 创建交易并结算积分
///
/// POST /api/transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(req): Json<TransactionRequest>,
) -> Result<Json<ApiResponse<TransactionOutcomeDto>>, AdminError> {
    req.validate()?;

    let txn = Transaction {
        user_id: req.user_id,
        amount: req.amount,
        kind: req.kind.clone(),
        merchant_id: req.merchant_id,
        occurred_at: req.occurred_at.unwrap_or_else(Utc::now),
    };

    // 评估先于落库：历史计数只反映此前已持久化的交易
    let points_earned = state.evaluator.evaluate(&txn).await?;

    let mut db_txn = state.pool.begin().await?;

    let (transaction_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO transactions (user_id, amount, kind, merchant_id, occurred_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(txn.user_id)
    .bind(txn.amount)
    .bind(&txn.kind)
    .bind(txn.merchant_id)
    .bind(txn.occurred_at)
    .fetch_one(&mut *db_txn)
    .await?;

    let current_balance = if points_earned > 0 {
        // 余额 upsert：首笔积分为用户建档
        let (balance,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO points (user_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET balance = points.balance + EXCLUDED.balance
            RETURNING balance
            "#,
        )
        .bind(txn.user_id)
        .bind(points_earned)
        .fetch_one(&mut *db_txn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO points_history (user_id, change, balance_after, reason)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(txn.user_id)
        .bind(points_earned)
        .bind(balance)
        .bind("Points earned from purchase")
        .execute(&mut *db_txn)
        .await?;

        // 与原始交易配对的积分流水记录
        sqlx::query(
            r#"
            INSERT INTO transactions (user_id, amount, kind, description, occurred_at)
            VALUES ($1, $2, 'points_earned', $3, NOW())
            "#,
        )
        .bind(txn.user_id)
        .bind(points_earned as f64)
        .bind("Points earned from purchase")
        .execute(&mut *db_txn)
        .await?;

        let event = PointsEarnedEvent::new(txn.user_id, points_earned, balance, transaction_id);
        sqlx::query(
            r#"
            INSERT INTO loyalty_events (user_id, event_type, payload)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(txn.user_id)
        .bind(event.event_type().to_string())
        .bind(serde_json::to_value(&event)?)
        .execute(&mut *db_txn)
        .await?;

        balance
    } else {
        current_balance_of(&mut db_txn, txn.user_id).await?
    };

    db_txn.commit().await?;

    info!(
        transaction_id,
        user_id = txn.user_id,
        points_earned,
        current_balance,
        "Transaction recorded"
    );

    Ok(Json(ApiResponse::success(TransactionOutcomeDto {
        transaction: TransactionDto {
            id: transaction_id,
            user_id: txn.user_id,
            amount: txn.amount,
            kind: txn.kind,
            merchant_id: txn.merchant_id,
            description: None,
            occurred_at: txn.occurred_at,
        },
        points_earned,
        current_balance,
    })))
}

/// 模拟交易评估（不落库）
///
/// POST /api/transactions/simulate
pub async fn simulate_transaction(
    State(state): State<AppState>,
    Json(req): Json<TransactionRequest>,
) -> Result<Json<ApiResponse<SimulationOutcomeDto>>, AdminError> {
    req.validate()?;

    let txn = Transaction {
        user_id: req.user_id,
        amount: req.amount,
        kind: req.kind,
        merchant_id: req.merchant_id,
        occurred_at: req.occurred_at.unwrap_or_else(Utc::now),
    };

    let points_earned = state.evaluator.evaluate(&txn).await?;

    Ok(Json(ApiResponse::success(SimulationOutcomeDto {
        points_earned,
    })))
}

/// 查询用户当前积分余额，无建档记录按 0 处理
async fn current_balance_of(
    db_txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
) -> Result<i64, AdminError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT balance FROM points WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut **db_txn)
        .await?;
    Ok(row.map(|(b,)| b).unwrap_or(0))
}
