// Trading terminal seam (MetaTrader 5)
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::OrderSide;
use crate::Result;

/// Return code for a completed trade request
pub const TRADE_RETCODE_DONE: u32 = 10009;

/// Credentials for the terminal login
#[derive(Clone)]
pub struct TerminalCredentials {
    pub login: u64,
    pub password: String,
    pub server: String,
}

impl std::fmt::Debug for TerminalCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalCredentials")
            .field("login", &mask_account(self.login))
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

/// Trading account the terminal is logged into
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountInfo {
    pub login: u64,
    pub server: String,
    pub currency: String,
}

/// Latest bid/ask for a symbol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl Tick {
    /// Both sides positive and not crossed
    pub fn is_usable(&self) -> bool {
        self.bid.is_finite()
            && self.ask.is_finite()
            && self.bid > 0.0
            && self.ask > 0.0
            && self.ask >= self.bid
    }

    /// Buys fill at the ask, sells at the bid
    pub fn price_for(&self, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => self.ask,
            OrderSide::Sell => self.bid,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Deal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderTime {
    Gtc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderFilling {
    Ioc,
}

/// Market order request, same shape as an MT5 `order_send` dict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub action: TradeAction,
    pub symbol: String,
    pub volume: f64,
    #[serde(rename = "type")]
    pub side: OrderSide,
    pub price: f64,
    pub sl: f64,
    pub tp: f64,
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
    pub type_time: OrderTime,
    pub type_filling: OrderFilling,
}

/// Terminal's answer to an order request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderResult {
    pub retcode: u32,
    #[serde(default)]
    pub order: u64,
    #[serde(default)]
    pub comment: String,
}

impl OrderResult {
    pub fn is_done(&self) -> bool {
        self.retcode == TRADE_RETCODE_DONE
    }
}

/// Open position as reported by the terminal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenPosition {
    pub ticket: u64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: OrderSide,
    pub volume: f64,
    pub price_open: f64,
    pub price_current: f64,
    pub profit: f64,
}

/// Everything the bot needs from the trading terminal
///
/// `symbol_select` returning `Ok(false)` means the symbol does not exist on
/// the terminal; `symbol_tick` returning `Ok(None)` means no quote is
/// available. `Err` is reserved for transport failures.
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn connect(&self, credentials: &TerminalCredentials) -> Result<AccountInfo>;

    async fn symbol_select(&self, symbol: &str) -> Result<bool>;

    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>>;

    async fn order_send(&self, request: &OrderRequest) -> Result<OrderResult>;

    async fn positions(&self) -> Result<Vec<OpenPosition>>;

    async fn shutdown(&self) -> Result<()>;
}

/// `***1234` style account number for logs and audit details
pub fn mask_account(login: u64) -> String {
    let digits = login.to_string();
    let tail = &digits[digits.len().saturating_sub(4)..];
    format!("***{}", tail)
}
