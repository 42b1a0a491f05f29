// Core modules
pub mod api;
pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod terminal;

// Re-export commonly used types
pub use bot::{Bot, BotState};
pub use error::{BotError, ExecutionError};
pub use models::*;
pub use persistence::SignalStore;
pub use terminal::Terminal;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
