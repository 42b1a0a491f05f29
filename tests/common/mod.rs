// In-memory backend and terminal shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use signalbot::config::BotConfig;
use signalbot::persistence::SignalFilter;
use signalbot::terminal::{
    AccountInfo, OpenPosition, OrderRequest, OrderResult, TerminalCredentials, Tick,
    TRADE_RETCODE_DONE,
};
use signalbot::*;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

pub const OPERATOR: &str = "6f1c2b9e-8a47-4d3b-9c1e-2f5a7d0b4e11";

pub fn operator_id() -> Uuid {
    Uuid::parse_str(OPERATOR).unwrap()
}

/// Config with no waiting between orders or cycles
pub fn test_config() -> BotConfig {
    let mut config = BotConfig::default();
    config.terminal.login = 51234567;
    config.terminal.password = signalbot::config::Secret::new("secret");
    config.trading.order_spacing_secs = 0;
    config.trading.poll_interval_secs = 0;
    config.trading.max_fetch_errors = 3;
    config.audit.operator_id = Some(operator_id());
    config.logging.file = Default::default();
    config
}

pub fn signal(symbol: &str, signal_type: &str, confidence: f64) -> TradingSignal {
    TradingSignal {
        id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        name: None,
        signal_type: signal_type.to_string(),
        confidence_score: confidence,
        current_price: Some(1.0998),
        target_price: Some(1.1050),
        stop_loss: Some(1.0950),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        executed: None,
        executed_at: None,
        reasoning: None,
    }
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub signals: Mutex<Vec<TradingSignal>>,
    pub executions: Mutex<Vec<TradeExecution>>,
    pub audit_events: Mutex<Vec<AuditEvent>>,
    pub pnl_updates: Mutex<Vec<(String, f64, f64)>>,
    pub fetch_calls: Mutex<u32>,
    /// Fetches fail while set
    pub fail_fetch: Mutex<bool>,
    pub fail_insert_execution: Mutex<bool>,
    pub fail_audit: Mutex<bool>,
    /// Ticket lists passed to `executed_order_ids`
    pub order_id_lookups: Mutex<Vec<Vec<String>>>,
    /// Slow execution-row writes
    pub insert_delay: Mutex<Option<std::time::Duration>>,
}

impl MemoryStore {
    pub fn with_signals(signals: Vec<TradingSignal>) -> Self {
        let store = Self::default();
        *store.signals.lock().unwrap() = signals;
        store
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        *self.fail_fetch.lock().unwrap() = fail;
    }

    pub fn signal(&self, id: Uuid) -> TradingSignal {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .unwrap()
    }

    pub fn executions(&self) -> Vec<TradeExecution> {
        self.executions.lock().unwrap().clone()
    }

    pub fn audit_types(&self) -> Vec<AuditEventType> {
        self.audit_events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }

    pub fn fetch_calls(&self) -> u32 {
        *self.fetch_calls.lock().unwrap()
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn fetch_pending_signals(
        &self,
        filter: &SignalFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<TradingSignal>> {
        *self.fetch_calls.lock().unwrap() += 1;
        if *self.fail_fetch.lock().unwrap() {
            return Err(BotError::Backend("connection reset".to_string()));
        }

        Ok(self
            .signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| filter.matches(s, now))
            .cloned()
            .collect())
    }

    async fn insert_execution(&self, execution: &TradeExecution) -> Result<()> {
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_insert_execution.lock().unwrap() {
            return Err(BotError::Backend("insert rejected".to_string()));
        }
        self.executions.lock().unwrap().push(execution.clone());
        Ok(())
    }

    async fn mark_signal_executed(&self, signal_id: Uuid, executed_at: DateTime<Utc>) -> Result<()> {
        let mut signals = self.signals.lock().unwrap();
        if let Some(signal) = signals
            .iter_mut()
            .find(|s| s.id == signal_id && s.executed.is_none())
        {
            signal.executed = Some(true);
            signal.executed_at = Some(executed_at);
        }
        Ok(())
    }

    async fn executed_order_ids(&self, order_ids: &[String]) -> Result<Vec<String>> {
        self.order_id_lookups
            .lock()
            .unwrap()
            .push(order_ids.to_vec());

        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.status == ExecutionStatus::Executed)
            .filter_map(|e| e.order_id.clone())
            .filter(|id| order_ids.contains(id))
            .collect())
    }

    async fn update_position_pnl(
        &self,
        order_id: &str,
        current_price: f64,
        profit_loss: f64,
    ) -> Result<()> {
        let mut executions = self.executions.lock().unwrap();
        for execution in executions
            .iter_mut()
            .filter(|e| e.order_id.as_deref() == Some(order_id))
        {
            execution.current_price = Some(current_price);
            execution.profit_loss = Some(profit_loss);
        }
        self.pnl_updates
            .lock()
            .unwrap()
            .push((order_id.to_string(), current_price, profit_loss));
        Ok(())
    }

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<()> {
        if *self.fail_audit.lock().unwrap() {
            return Err(BotError::Backend("audit table missing".to_string()));
        }
        self.audit_events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ============================================================================
// Terminal
// ============================================================================

pub struct FakeTerminal {
    pub symbols: Mutex<HashSet<String>>,
    pub ticks: Mutex<HashMap<String, Tick>>,
    pub requests: Mutex<Vec<OrderRequest>>,
    pub positions: Mutex<Vec<OpenPosition>>,
    /// Retcode returned for every order
    pub retcode: Mutex<u32>,
    pub next_ticket: Mutex<u64>,
    pub fail_connect: Mutex<bool>,
    /// Symbols whose orders never reach the terminal
    pub fail_order_send: Mutex<HashSet<String>>,
    pub fail_positions: Mutex<bool>,
    pub shutdowns: Mutex<u32>,
}

impl Default for FakeTerminal {
    fn default() -> Self {
        Self {
            symbols: Mutex::new(HashSet::new()),
            ticks: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            positions: Mutex::new(Vec::new()),
            retcode: Mutex::new(TRADE_RETCODE_DONE),
            next_ticket: Mutex::new(123456789),
            fail_connect: Mutex::new(false),
            fail_order_send: Mutex::new(HashSet::new()),
            fail_positions: Mutex::new(false),
            shutdowns: Mutex::new(0),
        }
    }
}

impl FakeTerminal {
    /// Terminal quoting `symbol` at `bid`/`ask`
    pub fn quoting(symbol: &str, bid: f64, ask: f64) -> Self {
        let terminal = Self::default();
        terminal.add_quote(symbol, bid, ask);
        terminal
    }

    pub fn add_quote(&self, symbol: &str, bid: f64, ask: f64) {
        self.symbols.lock().unwrap().insert(symbol.to_string());
        self.ticks.lock().unwrap().insert(
            symbol.to_string(),
            Tick {
                bid,
                ask,
                time: None,
            },
        );
    }

    pub fn requests(&self) -> Vec<OrderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> u32 {
        *self.shutdowns.lock().unwrap()
    }
}

#[async_trait]
impl Terminal for FakeTerminal {
    async fn connect(&self, credentials: &TerminalCredentials) -> Result<AccountInfo> {
        if *self.fail_connect.lock().unwrap() {
            return Err(BotError::Connection("Authorization failed".to_string()));
        }
        Ok(AccountInfo {
            login: credentials.login,
            server: credentials.server.clone(),
            currency: "USD".to_string(),
        })
    }

    async fn symbol_select(&self, symbol: &str) -> Result<bool> {
        Ok(self.symbols.lock().unwrap().contains(symbol))
    }

    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>> {
        Ok(self.ticks.lock().unwrap().get(symbol).copied())
    }

    async fn order_send(&self, request: &OrderRequest) -> Result<OrderResult> {
        if self.fail_order_send.lock().unwrap().contains(&request.symbol) {
            return Err(BotError::Terminal("order_send failed (502): bridge timeout".to_string()));
        }

        self.requests.lock().unwrap().push(request.clone());

        let retcode = *self.retcode.lock().unwrap();
        if retcode != TRADE_RETCODE_DONE {
            return Ok(OrderResult {
                retcode,
                order: 0,
                comment: "Market closed".to_string(),
            });
        }

        let mut next = self.next_ticket.lock().unwrap();
        let ticket = *next;
        *next += 1;

        self.positions.lock().unwrap().push(OpenPosition {
            ticket,
            symbol: request.symbol.clone(),
            side: request.side,
            volume: request.volume,
            price_open: request.price,
            price_current: request.price,
            profit: 0.0,
        });

        Ok(OrderResult {
            retcode,
            order: ticket,
            comment: "Request executed".to_string(),
        })
    }

    async fn positions(&self) -> Result<Vec<OpenPosition>> {
        if *self.fail_positions.lock().unwrap() {
            return Err(BotError::Terminal("positions_get failed (502): bridge timeout".to_string()));
        }
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn shutdown(&self) -> Result<()> {
        *self.shutdowns.lock().unwrap() += 1;
        Ok(())
    }
}
