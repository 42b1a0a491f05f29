use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ExecutionError;

/// A directional trade recommendation produced upstream
///
/// Field names follow the backend's `trading_signals` columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingSignal {
    pub id: Uuid,
    #[serde(rename = "stock_symbol")]
    pub symbol: String,
    #[serde(rename = "stock_name", default)]
    pub name: Option<String>,
    pub signal_type: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Tri-state: `None` means pending, anything else has been consumed
    #[serde(default)]
    pub executed: Option<bool>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl TradingSignal {
    /// Resolve the signal type into an order side
    pub fn side(&self) -> Result<OrderSide, ExecutionError> {
        self.signal_type
            .parse()
            .map_err(|_| ExecutionError::UnknownSignalType {
                signal_type: self.signal_type.clone(),
            })
    }

    /// Order comment tag, e.g. `AI_3f2a9c1d`
    pub fn order_tag(&self) -> String {
        let id = self.id.to_string();
        format!("AI_{}", &id[..8])
    }
}

/// Buy or sell side of a market order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            other => Err(format!("not an order side: {}", other)),
        }
    }
}

/// Outcome of an execution attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Executed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Executed => "executed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

/// What the terminal gave back for a filled order
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReceipt {
    pub order_id: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub price: f64,
}

/// One row in `trade_executions`, written once per execution attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeExecution {
    pub signal_id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub symbol: String,
    /// Raw signal type, kept even when it is not a valid side
    pub action: String,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_loss: Option<f64>,
}

impl TradeExecution {
    pub fn executed(
        signal: &TradingSignal,
        user_id: Uuid,
        receipt: &ExecutionReceipt,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            signal_id: signal.id,
            user_id,
            order_id: Some(receipt.order_id.to_string()),
            symbol: signal.symbol.clone(),
            action: signal.signal_type.clone(),
            volume: receipt.volume,
            entry_price: Some(receipt.price),
            stop_loss: signal.stop_loss,
            take_profit: signal.target_price,
            status: ExecutionStatus::Executed,
            error_message: None,
            executed_at: Some(executed_at),
            current_price: None,
            profit_loss: None,
        }
    }

    pub fn failed(
        signal: &TradingSignal,
        user_id: Uuid,
        volume: f64,
        error: &ExecutionError,
    ) -> Self {
        Self {
            signal_id: signal.id,
            user_id,
            order_id: None,
            symbol: signal.symbol.clone(),
            action: signal.signal_type.clone(),
            volume,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            status: ExecutionStatus::Failed,
            error_message: Some(error.to_string()),
            executed_at: None,
            current_price: None,
            profit_loss: None,
        }
    }
}

/// Audit trail event tags
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditEventType {
    #[serde(rename = "mt5_bot_connected")]
    BotConnected,
    #[serde(rename = "mt5_trade_executed")]
    TradeExecuted,
    #[serde(rename = "mt5_trade_failed")]
    TradeFailed,
    #[serde(rename = "mt5_bot_stopped")]
    BotStopped,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::BotConnected => "mt5_bot_connected",
            AuditEventType::TradeExecuted => "mt5_trade_executed",
            AuditEventType::TradeFailed => "mt5_trade_failed",
            AuditEventType::BotStopped => "mt5_bot_stopped",
        }
    }
}

/// Append-only row in `security_audit_log`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub user_id: Option<Uuid>,
    pub event_type: AuditEventType,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signal(signal_type: &str) -> TradingSignal {
        TradingSignal {
            id: Uuid::parse_str("3f2a9c1d-0000-4000-8000-000000000001").unwrap(),
            symbol: "EURUSD".to_string(),
            name: None,
            signal_type: signal_type.to_string(),
            confidence_score: 85.0,
            current_price: Some(1.0990),
            target_price: Some(1.1050),
            stop_loss: Some(1.0950),
            expires_at: None,
            executed: None,
            executed_at: None,
            reasoning: None,
        }
    }

    #[test]
    fn test_signal_side() {
        assert_eq!(signal("BUY").side().unwrap(), OrderSide::Buy);
        assert_eq!(signal("SELL").side().unwrap(), OrderSide::Sell);
        assert_eq!(
            signal("HOLD").side().unwrap_err(),
            ExecutionError::UnknownSignalType {
                signal_type: "HOLD".to_string()
            }
        );
    }

    #[test]
    fn test_order_tag_uses_id_prefix() {
        assert_eq!(signal("BUY").order_tag(), "AI_3f2a9c1d");
    }

    #[test]
    fn test_signal_deserializes_backend_row() {
        let row = json!({
            "id": "3f2a9c1d-0000-4000-8000-000000000001",
            "stock_symbol": "XAUUSD",
            "stock_name": "Gold",
            "signal_type": "SELL",
            "confidence_score": 72,
            "current_price": 2350.5,
            "target_price": null,
            "stop_loss": 2370.0,
            "expires_at": "2026-10-15T12:00:00+00:00",
            "reasoning": "RSI overbought",
            "indicators": {"rsi": 78}
        });

        let signal: TradingSignal = serde_json::from_value(row).unwrap();
        assert_eq!(signal.symbol, "XAUUSD");
        assert_eq!(signal.confidence_score, 72.0);
        assert_eq!(signal.target_price, None);
        assert_eq!(signal.executed, None);
        assert!(signal.expires_at.is_some());
    }

    #[test]
    fn test_failed_execution_payload_omits_fill_fields() {
        let err = ExecutionError::SymbolNotFound {
            symbol: "EURUSD".to_string(),
        };
        let execution = TradeExecution::failed(&signal("BUY"), Uuid::nil(), 0.01, &err);
        let payload = serde_json::to_value(&execution).unwrap();

        assert_eq!(payload["status"], "failed");
        assert_eq!(payload["error_message"], "Symbol EURUSD not found in MT5");
        assert!(payload.get("order_id").is_none());
        assert!(payload.get("entry_price").is_none());
    }

    #[test]
    fn test_audit_event_type_serializes_to_tag() {
        let value = serde_json::to_value(AuditEventType::TradeFailed).unwrap();
        assert_eq!(value, "mt5_trade_failed");
        assert_eq!(AuditEventType::BotStopped.as_str(), "mt5_bot_stopped");
    }
}
