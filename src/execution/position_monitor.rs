use std::collections::HashSet;
use std::sync::Arc;

use crate::persistence::SignalStore;
use crate::terminal::Terminal;

/// Counts from one refresh pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub open: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Copies live price and P&L of open positions onto their execution rows
pub struct PositionMonitor {
    terminal: Arc<dyn Terminal>,
    store: Arc<dyn SignalStore>,
}

impl PositionMonitor {
    pub fn new(terminal: Arc<dyn Terminal>, store: Arc<dyn SignalStore>) -> Self {
        Self { terminal, store }
    }

    /// Positions whose ticket has no `executed` row are left alone
    pub async fn refresh_open_positions(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        let positions = match self.terminal.positions().await {
            Ok(positions) => positions,
            Err(e) => {
                tracing::warn!("Failed to list open positions: {}", e);
                return report;
            }
        };

        report.open = positions.len();
        if positions.is_empty() {
            return report;
        }

        let tickets: Vec<String> = positions.iter().map(|p| p.ticket.to_string()).collect();
        let known: HashSet<String> = match self.store.executed_order_ids(&tickets).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::warn!("Failed to load recorded executions: {}", e);
                return report;
            }
        };

        for position in &positions {
            let ticket = position.ticket.to_string();
            if !known.contains(&ticket) {
                report.skipped += 1;
                continue;
            }

            match self
                .store
                .update_position_pnl(&ticket, position.price_current, position.profit)
                .await
            {
                Ok(()) => {
                    report.updated += 1;
                    tracing::debug!(
                        "{} #{} @ {:.5} P&L {:.2}",
                        position.symbol,
                        ticket,
                        position.price_current,
                        position.profit
                    );
                }
                Err(e) => tracing::warn!("Failed to update position {}: {}", ticket, e),
            }
        }

        report
    }
}
