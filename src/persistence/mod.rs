// Backend persistence seam: signal intake and execution/audit write-back
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AuditEvent, OrderSide, TradeExecution, TradingSignal};
use crate::Result;

/// Which signals count as pending
#[derive(Debug, Clone, PartialEq)]
pub struct SignalFilter {
    pub signal_types: Vec<OrderSide>,
    pub min_confidence: f64,
}

impl SignalFilter {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            signal_types: vec![OrderSide::Buy, OrderSide::Sell],
            min_confidence,
        }
    }

    /// `in.(BUY,SELL)` style list for query strings
    pub fn signal_type_list(&self) -> String {
        self.signal_types
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Client-side mirror of the backend predicate
    ///
    /// A signal without an expiry never matches, same as a `gte` comparison
    /// against NULL in the database.
    pub fn matches(&self, signal: &TradingSignal, now: DateTime<Utc>) -> bool {
        let type_ok = self
            .signal_types
            .iter()
            .any(|s| s.as_str() == signal.signal_type);
        let not_expired = signal.expires_at.is_some_and(|exp| exp >= now);

        type_ok
            && signal.confidence_score >= self.min_confidence
            && signal.executed.is_none()
            && not_expired
    }
}

impl Default for SignalFilter {
    fn default() -> Self {
        Self::new(70.0)
    }
}

/// Everything the bot reads from and writes to the backend
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Signals matching `filter` as of `now`
    async fn fetch_pending_signals(
        &self,
        filter: &SignalFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<TradingSignal>>;

    async fn insert_execution(&self, execution: &TradeExecution) -> Result<()>;

    /// Flip `executed` to true, only if it is still unset
    async fn mark_signal_executed(&self, signal_id: Uuid, executed_at: DateTime<Utc>)
        -> Result<()>;

    /// Which of `order_ids` belong to executions that went through
    async fn executed_order_ids(&self, order_ids: &[String]) -> Result<Vec<String>>;

    async fn update_position_pnl(
        &self,
        order_id: &str,
        current_price: f64,
        profit_loss: f64,
    ) -> Result<()>;

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<()>;
}
