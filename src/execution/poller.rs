use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::BotError;
use crate::models::TradingSignal;
use crate::persistence::{SignalFilter, SignalStore};
use crate::Result;

/// Count of failed signal fetches, owned by the main loop
///
/// Monotonic: a successful fetch does not give failures back. Once `max`
/// failures have happened the bot stops.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchBudget {
    failures: u32,
    max: u32,
}

impl FetchBudget {
    pub fn new(max: u32) -> Self {
        Self { failures: 0, max }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_failure(&mut self) -> Result<()> {
        self.failures += 1;
        if self.failures >= self.max {
            return Err(BotError::FailureBudgetExhausted {
                failures: self.failures,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Reads pending signals from the backend
pub struct SignalPoller {
    store: Arc<dyn SignalStore>,
    filter: SignalFilter,
}

impl SignalPoller {
    pub fn new(store: Arc<dyn SignalStore>, filter: SignalFilter) -> Self {
        Self { store, filter }
    }

    pub async fn fetch_pending_signals(
        &self,
        budget: &mut FetchBudget,
    ) -> Result<Vec<TradingSignal>> {
        self.fetch_pending_signals_at(budget, Utc::now()).await
    }

    /// Fetch as of `now`
    ///
    /// A failed query yields an empty batch and spends one unit of the budget;
    /// only an exhausted budget is returned as an error.
    pub async fn fetch_pending_signals_at(
        &self,
        budget: &mut FetchBudget,
        now: DateTime<Utc>,
    ) -> Result<Vec<TradingSignal>> {
        match self.store.fetch_pending_signals(&self.filter, now).await {
            Ok(mut signals) => {
                let fetched = signals.len();
                signals.retain(|signal| self.filter.matches(signal, now));

                if signals.len() < fetched {
                    tracing::debug!(
                        "Dropped {} signal(s) the backend returned outside the filter",
                        fetched - signals.len()
                    );
                }

                Ok(signals)
            }
            Err(e) => {
                tracing::error!("Error fetching signals: {}", e);

                if let Err(fatal) = budget.record_failure() {
                    tracing::error!(
                        "Max errors ({}) reached. Shutting down bot.",
                        budget.max
                    );
                    return Err(fatal);
                }

                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exhausts_at_max() {
        let mut budget = FetchBudget::new(3);

        assert!(budget.record_failure().is_ok());
        assert!(budget.record_failure().is_ok());
        let err = budget.record_failure().unwrap_err();

        assert!(matches!(
            err,
            BotError::FailureBudgetExhausted { failures: 3, max: 3 }
        ));
        assert_eq!(budget.failures(), 3);
    }

    #[test]
    fn test_budget_of_one_fails_immediately() {
        let mut budget = FetchBudget::new(1);
        assert!(budget.record_failure().is_err());
    }
}
