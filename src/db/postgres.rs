use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

use crate::error::BotError;
use crate::models::{AuditEvent, TradeExecution, TradingSignal};
use crate::persistence::{SignalFilter, SignalStore};
use crate::Result;

/// Backend store talking to Postgres directly
///
/// Same tables as the REST gateway; numeric columns are `NUMERIC` and go
/// through `Decimal` on the way in and out.
pub struct PostgresStore {
    pool: PgPool,
}

fn decimal(value: f64) -> Result<Decimal> {
    Decimal::try_from(value)
        .map_err(|e| BotError::Backend(format!("{} does not fit NUMERIC: {}", value, e)))
}

fn optional_decimal(value: Option<f64>) -> Result<Option<Decimal>> {
    value.map(decimal).transpose()
}

fn float(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

impl PostgresStore {
    /// Connect to Postgres and apply pending migrations
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres backend");

        Ok(Self { pool })
    }

    fn signal_from_row(row: &sqlx::postgres::PgRow) -> TradingSignal {
        let confidence: Decimal = row.get("confidence_score");
        let current_price: Option<Decimal> = row.get("current_price");
        let target_price: Option<Decimal> = row.get("target_price");
        let stop_loss: Option<Decimal> = row.get("stop_loss");

        TradingSignal {
            id: row.get("id"),
            symbol: row.get("stock_symbol"),
            name: row.get("stock_name"),
            signal_type: row.get("signal_type"),
            confidence_score: float(confidence),
            current_price: current_price.map(float),
            target_price: target_price.map(float),
            stop_loss: stop_loss.map(float),
            expires_at: row.get("expires_at"),
            executed: row.get("executed"),
            executed_at: row.get("executed_at"),
            reasoning: row.get("reasoning"),
        }
    }
}

#[async_trait]
impl SignalStore for PostgresStore {
    async fn fetch_pending_signals(
        &self,
        filter: &SignalFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<TradingSignal>> {
        let types: Vec<String> = filter
            .signal_types
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let rows = sqlx::query(
            r#"
            SELECT id, stock_symbol, stock_name, signal_type, confidence_score,
                   current_price, target_price, stop_loss, expires_at,
                   executed, executed_at, reasoning
            FROM trading_signals
            WHERE signal_type = ANY($1)
              AND confidence_score >= $2
              AND executed IS NULL
              AND expires_at >= $3
            ORDER BY created_at ASC
            "#,
        )
        .bind(types)
        .bind(decimal(filter.min_confidence)?)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::signal_from_row).collect())
    }

    async fn insert_execution(&self, execution: &TradeExecution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trade_executions (
                signal_id, user_id, order_id, symbol, action, volume,
                entry_price, stop_loss, take_profit, status, error_message, executed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(execution.signal_id)
        .bind(execution.user_id)
        .bind(&execution.order_id)
        .bind(&execution.symbol)
        .bind(&execution.action)
        .bind(decimal(execution.volume)?)
        .bind(optional_decimal(execution.entry_price)?)
        .bind(optional_decimal(execution.stop_loss)?)
        .bind(optional_decimal(execution.take_profit)?)
        .bind(execution.status.as_str())
        .bind(&execution.error_message)
        .bind(execution.executed_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Saved {} execution for signal {}",
            execution.status.as_str(),
            execution.signal_id
        );

        Ok(())
    }

    async fn mark_signal_executed(
        &self,
        signal_id: Uuid,
        executed_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE trading_signals
            SET executed = TRUE, executed_at = $2
            WHERE id = $1 AND executed IS NULL
            "#,
        )
        .bind(signal_id)
        .bind(executed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!("Signal {} was already consumed", signal_id);
        }

        Ok(())
    }

    async fn executed_order_ids(&self, order_ids: &[String]) -> Result<Vec<String>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT DISTINCT order_id
            FROM trade_executions
            WHERE status = 'executed' AND order_id = ANY($1)
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("order_id")).collect())
    }

    async fn update_position_pnl(
        &self,
        order_id: &str,
        current_price: f64,
        profit_loss: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trade_executions
            SET current_price = $2, profit_loss = $3, updated_at = NOW()
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .bind(decimal(current_price)?)
        .bind(decimal(profit_loss)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO security_audit_log (user_id, event_type, details, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event.user_id)
        .bind(event.event_type.as_str())
        .bind(sqlx::types::Json(&event.details))
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
