// =====================================================
// PgStore - PostgreSQL 저장소
// =====================================================
// 역할: Store / StoreTransaction 의 PostgreSQL 구현
//
// 설계:
// - 트랜잭션 하나 = sqlx::Transaction 하나
// - 잔고/주문은 SELECT ... FOR UPDATE 로 행 잠금
// - commit 없이 drop 되면 sqlx 가 롤백
// - 직렬화 실패/데드락/연결 오류는 Transient 로 분류
// =====================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domains::market::models::{
    Balance, BalanceDefaults, Order, OrderFilter, OrderPatch, TradeLeg,
};
use super::connection::Database;
use super::store::{Store, StoreError, StoreTransaction};

const ORDER_COLUMNS: &str =
    "id, user_id, order_type, original_amount, remaining_amount, price, status, created_at, updated_at";

const TRADE_COLUMNS: &str =
    "id, user_id, order_id, transaction_type, amount_mwh, price_eur_per_mwh, total_eur, settlement_id, created_at";

/// sqlx 에러 분류
/// Classify sqlx errors into transient and fatal
fn map_sqlx_error(context: &str, err: sqlx::Error) -> StoreError {
    let transient = match &err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => true,
        // 40001 serialization_failure, 40P01 deadlock_detected
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001") | Some("40P01")),
        _ => false,
    };
    let message = format!("{}: {}", context, err);
    if transient {
        StoreError::Transient(message)
    } else {
        StoreError::Fatal(message)
    }
}

fn row_to_order(row: &PgRow) -> Result<Order, StoreError> {
    let side: String = row.get("order_type");
    let status: String = row.get("status");
    Ok(Order {
        id: row.get::<i64, _>("id") as u64,
        user_id: row.get::<i64, _>("user_id") as u64,
        side: side.parse().map_err(|e| StoreError::Fatal(format!("{}", e)))?,
        original_amount: row.get("original_amount"),
        remaining_amount: row.get("remaining_amount"),
        limit_price: row.get("price"),
        status: status.parse().map_err(|e| StoreError::Fatal(format!("{}", e)))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_trade(row: &PgRow) -> Result<TradeLeg, StoreError> {
    let side: String = row.get("transaction_type");
    Ok(TradeLeg {
        id: row.get::<i64, _>("id") as u64,
        user_id: row.get::<i64, _>("user_id") as u64,
        order_id: row.get::<Option<i64>, _>("order_id").map(|id| id as u64),
        side: side.parse().map_err(|e| StoreError::Fatal(format!("{}", e)))?,
        amount: row.get("amount_mwh"),
        price: row.get("price_eur_per_mwh"),
        total: row.get("total_eur"),
        settlement_id: row.get("settlement_id"),
        created_at: row.get("created_at"),
    })
}

fn row_to_balance(row: &PgRow) -> Balance {
    Balance {
        user_id: row.get::<i64, _>("user_id") as u64,
        money: row.get("money_eur"),
        energy: row.get("energy_mwh"),
    }
}

/// PostgreSQL 저장소
/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin transaction", e))?;
        Ok(Box::new(PgTransaction { tx: Some(tx) }))
    }

    async fn get_order(&self, order_id: u64) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(order_id as i64)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to fetch order", e))?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn list_orders_by_user(&self, user_id: u64, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR order_type = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
              AND ($4::TIMESTAMPTZ IS NULL OR created_at <= $4)
            ORDER BY created_at DESC, id DESC
            "#,
            ORDER_COLUMNS
        ))
        .bind(user_id as i64)
        .bind(filter.side.map(|s| s.as_str().to_string()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| map_sqlx_error("Failed to fetch orders by user", e))?;

        rows.iter().map(row_to_order).collect()
    }

    async fn list_open_sells(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE order_type = 'sell' AND status = 'open'
              AND ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at <= $2)
            ORDER BY price ASC, created_at ASC, id ASC
            "#,
            ORDER_COLUMNS
        ))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| map_sqlx_error("Failed to fetch open sell orders", e))?;

        rows.iter().map(row_to_order).collect()
    }

    async fn list_trades_by_user(&self, user_id: u64) -> Result<Vec<TradeLeg>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM trade_legs WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            TRADE_COLUMNS
        ))
        .bind(user_id as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| map_sqlx_error("Failed to fetch trades by user", e))?;

        rows.iter().map(row_to_trade).collect()
    }

    async fn get_balance(&self, user_id: u64) -> Result<Option<Balance>, StoreError> {
        let row = sqlx::query("SELECT user_id, money_eur, energy_mwh FROM balances WHERE user_id = $1")
            .bind(user_id as i64)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to fetch balance", e))?;

        Ok(row.as_ref().map(row_to_balance))
    }

    async fn max_order_id(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COALESCE(MAX(id), 0) AS max_id FROM orders")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to fetch max order id", e))?;
        Ok(row.get::<i64, _>("max_id") as u64)
    }

    async fn max_trade_id(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COALESCE(MAX(id), 0) AS max_id FROM trade_legs")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to fetch max trade id", e))?;
        Ok(row.get::<i64, _>("max_id") as u64)
    }
}

/// PostgreSQL 트랜잭션
struct PgTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx
            .as_mut()
            .map(|tx| &mut **tx)
            .ok_or_else(|| StoreError::Fatal("transaction already finished".to_string()))
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn balance_for_update(&mut self, user_id: u64, defaults: &BalanceDefaults) -> Result<Balance, StoreError> {
        let conn = self.conn()?;

        sqlx::query(
            r#"
            INSERT INTO balances (user_id, money_eur, energy_mwh, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id as i64)
        .bind(defaults.money)
        .bind(defaults.energy)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("Failed to create default balance", e))?;

        let row = sqlx::query("SELECT user_id, money_eur, energy_mwh FROM balances WHERE user_id = $1 FOR UPDATE")
            .bind(user_id as i64)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("Failed to lock balance", e))?;

        Ok(row_to_balance(&row))
    }

    async fn save_balance(&mut self, balance: &Balance) -> Result<(), StoreError> {
        let conn = self.conn()?;
        sqlx::query("UPDATE balances SET money_eur = $2, energy_mwh = $3, updated_at = NOW() WHERE user_id = $1")
            .bind(balance.user_id as i64)
            .bind(balance.money)
            .bind(balance.energy)
            .execute(conn)
            .await
            .map_err(|e| map_sqlx_error("Failed to save balance", e))?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let conn = self.conn()?;
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, order_type, original_amount, remaining_amount, price, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id as i64)
        .bind(order.user_id as i64)
        .bind(order.side.as_str())
        .bind(order.original_amount)
        .bind(order.remaining_amount)
        .bind(order.limit_price)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_error("Failed to insert order", e))?;
        Ok(())
    }

    async fn order_for_update(&mut self, order_id: u64) -> Result<Option<Order>, StoreError> {
        let conn = self.conn()?;
        let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS))
            .bind(order_id as i64)
            .fetch_optional(conn)
            .await
            .map_err(|e| map_sqlx_error("Failed to lock order", e))?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn update_order(&mut self, order_id: u64, patch: &OrderPatch, updated_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET remaining_amount = COALESCE($2, remaining_amount),
                original_amount  = COALESCE($3, original_amount),
                price            = COALESCE($4, price),
                status           = COALESCE($5, status),
                created_at       = COALESCE($6, created_at),
                updated_at       = $7
            WHERE id = $1 AND status = 'open'
            "#,
        )
        .bind(order_id as i64)
        .bind(patch.remaining_amount)
        .bind(patch.original_amount)
        .bind(patch.limit_price)
        .bind(patch.status.map(|s| s.as_str().to_string()))
        .bind(patch.created_at)
        .bind(updated_at)
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_error("Failed to update order", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Fatal(format!("order {} is not open", order_id)));
        }
        Ok(())
    }

    async fn insert_trade_leg(&mut self, leg: &TradeLeg) -> Result<(), StoreError> {
        let conn = self.conn()?;
        sqlx::query(
            r#"
            INSERT INTO trade_legs (id, user_id, order_id, transaction_type, amount_mwh, price_eur_per_mwh, total_eur, settlement_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(leg.id as i64)
        .bind(leg.user_id as i64)
        .bind(leg.order_id.map(|id| id as i64))
        .bind(leg.side.as_str())
        .bind(leg.amount)
        .bind(leg.price)
        .bind(leg.total)
        .bind(leg.settlement_id)
        .bind(leg.created_at)
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_error("Failed to insert trade leg", e))?;
        Ok(())
    }

    async fn settlement_legs(&mut self, settlement_id: Uuid) -> Result<Vec<TradeLeg>, StoreError> {
        let conn = self.conn()?;
        let rows = sqlx::query(&format!(
            "SELECT {} FROM trade_legs WHERE settlement_id = $1 ORDER BY id ASC",
            TRADE_COLUMNS
        ))
        .bind(settlement_id)
        .fetch_all(conn)
        .await
        .map_err(|e| map_sqlx_error("Failed to fetch settlement legs", e))?;

        rows.iter().map(row_to_trade).collect()
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Fatal("transaction already finished".to_string()))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit transaction", e))
    }
}
