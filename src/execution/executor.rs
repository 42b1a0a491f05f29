use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::TradingConfig;
use crate::error::ExecutionError;
use crate::execution::AuditLogger;
use crate::models::{AuditEventType, ExecutionReceipt, OrderSide, TradeExecution, TradingSignal};
use crate::persistence::SignalStore;
use crate::terminal::{OrderFilling, OrderRequest, OrderTime, Terminal, Tick, TradeAction};

/// Fixed order parameters; there is no position sizing
#[derive(Debug, Clone, PartialEq)]
pub struct OrderParams {
    pub volume: f64,
    pub deviation: u32,
    pub magic: u64,
}

impl Default for OrderParams {
    fn default() -> Self {
        Self {
            volume: 0.01,
            deviation: 20,
            magic: 234000,
        }
    }
}

impl From<&TradingConfig> for OrderParams {
    fn from(trading: &TradingConfig) -> Self {
        Self {
            volume: trading.volume,
            deviation: trading.deviation,
            magic: trading.magic,
        }
    }
}

/// Turns one signal into one market order and records the outcome
pub struct OrderExecutor {
    terminal: Arc<dyn Terminal>,
    store: Arc<dyn SignalStore>,
    audit: AuditLogger,
    params: OrderParams,
    operator_id: Uuid,
}

impl OrderExecutor {
    pub fn new(
        terminal: Arc<dyn Terminal>,
        store: Arc<dyn SignalStore>,
        audit: AuditLogger,
        params: OrderParams,
        operator_id: Uuid,
    ) -> Self {
        Self {
            terminal,
            store,
            audit,
            params,
            operator_id,
        }
    }

    /// Execute a signal
    ///
    /// Exactly one execution row is written whatever happens; the signal is
    /// only marked executed when the terminal filled the order.
    pub async fn execute(
        &self,
        signal: &TradingSignal,
    ) -> Result<ExecutionReceipt, ExecutionError> {
        let outcome = self.place_order(signal).await;

        match &outcome {
            Ok(receipt) => {
                tracing::info!("✅ Order executed: Ticket #{}", receipt.order_id);
                self.record_success(signal, receipt).await;
            }
            Err(err) => {
                tracing::error!("{}", err);
                self.record_failure(signal, err).await;
            }
        }

        outcome
    }

    async fn place_order(
        &self,
        signal: &TradingSignal,
    ) -> Result<ExecutionReceipt, ExecutionError> {
        let symbol = &signal.symbol;

        let selected = self
            .terminal
            .symbol_select(symbol)
            .await
            .map_err(|e| ExecutionError::Terminal(e.to_string()))?;
        if !selected {
            return Err(ExecutionError::SymbolNotFound {
                symbol: symbol.clone(),
            });
        }

        let tick = self
            .terminal
            .symbol_tick(symbol)
            .await
            .map_err(|e| ExecutionError::Terminal(e.to_string()))?
            .filter(Tick::is_usable)
            .ok_or_else(|| ExecutionError::QuoteUnavailable {
                symbol: symbol.clone(),
            })?;

        let side = signal.side()?;
        let request = self.build_request(signal, side, &tick);

        tracing::info!(
            "📤 Placing {} order for {} @ {:.5}",
            side,
            symbol,
            request.price
        );

        let result = self
            .terminal
            .order_send(&request)
            .await
            .map_err(|e| ExecutionError::Terminal(e.to_string()))?;

        if !result.is_done() {
            return Err(ExecutionError::OrderRejected {
                retcode: result.retcode,
                comment: result.comment,
            });
        }

        Ok(ExecutionReceipt {
            order_id: result.order,
            symbol: symbol.clone(),
            side,
            volume: request.volume,
            price: request.price,
        })
    }

    /// Market order for `signal` at the side's current price
    pub fn build_request(&self, signal: &TradingSignal, side: OrderSide, tick: &Tick) -> OrderRequest {
        OrderRequest {
            action: TradeAction::Deal,
            symbol: signal.symbol.clone(),
            volume: self.params.volume,
            side,
            price: tick.price_for(side),
            sl: signal.stop_loss.unwrap_or(0.0),
            tp: signal.target_price.unwrap_or(0.0),
            deviation: self.params.deviation,
            magic: self.params.magic,
            comment: signal.order_tag(),
            type_time: OrderTime::Gtc,
            type_filling: OrderFilling::Ioc,
        }
    }

    async fn record_success(&self, signal: &TradingSignal, receipt: &ExecutionReceipt) {
        let now = Utc::now();
        let execution = TradeExecution::executed(signal, self.operator_id, receipt, now);

        if let Err(e) = self.store.insert_execution(&execution).await {
            tracing::error!("Failed to log execution: {}", e);
        }

        // Marked even when the row above failed: the order is live either way
        if let Err(e) = self.store.mark_signal_executed(signal.id, now).await {
            tracing::error!("Failed to mark signal {} executed: {}", signal.id, e);
        }

        self.audit
            .record(
                AuditEventType::TradeExecuted,
                json!({
                    "symbol": signal.symbol,
                    "action": signal.signal_type,
                    "order_id": receipt.order_id.to_string(),
                    "volume": receipt.volume,
                    "price": receipt.price,
                }),
            )
            .await;
    }

    async fn record_failure(&self, signal: &TradingSignal, error: &ExecutionError) {
        let execution = TradeExecution::failed(signal, self.operator_id, self.params.volume, error);

        if let Err(e) = self.store.insert_execution(&execution).await {
            tracing::error!("Failed to log failed execution: {}", e);
        }

        self.audit
            .record(
                AuditEventType::TradeFailed,
                json!({
                    "symbol": signal.symbol,
                    "signal_type": signal.signal_type,
                    "error": error.to_string(),
                }),
            )
            .await;
    }
}
