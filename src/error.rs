use thiserror::Error;

/// Errors that can stop the bot or surface from one of its collaborators.
///
/// Per-signal problems live in [`ExecutionError`] and never terminate the
/// loop; everything here is either fatal (configuration, terminal login,
/// exhausted fetch budget) or a transport error that the caller decides how
/// to contain.
#[derive(Error, Debug)]
pub enum BotError {
    // -- Startup ------------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    #[error("terminal connection failed: {0}")]
    Connection(String),

    // -- Backend ------------------------------------------------------------
    #[error("backend error: {0}")]
    Backend(String),

    #[error("signal fetch failed {failures} times (max {max}), giving up")]
    FailureBudgetExhausted { failures: u32, max: u32 },

    // -- Terminal -----------------------------------------------------------
    #[error("terminal error: {0}")]
    Terminal(String),

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for BotError {
    fn from(err: ::config::ConfigError) -> Self {
        BotError::Config(err.to_string())
    }
}

/// Why a single signal could not be turned into an order.
///
/// The display strings are persisted verbatim as the execution's
/// `error_message`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Symbol {symbol} not found in MT5")]
    SymbolNotFound { symbol: String },

    #[error("Failed to get tick for {symbol}")]
    QuoteUnavailable { symbol: String },

    #[error("Unknown signal type: {signal_type}")]
    UnknownSignalType { signal_type: String },

    #[error("Order failed: {comment}")]
    OrderRejected { retcode: u32, comment: String },

    #[error("Terminal error: {0}")]
    Terminal(String),
}
