// Signal intake, order placement and position tracking
pub mod audit;
pub mod executor;
pub mod poller;
pub mod position_monitor;

pub use audit::AuditLogger;
pub use executor::{OrderExecutor, OrderParams};
pub use poller::{FetchBudget, SignalPoller};
pub use position_monitor::{PositionMonitor, RefreshReport};
