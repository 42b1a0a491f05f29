use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::BotConfig;
use crate::error::BotError;
use crate::execution::{
    AuditLogger, FetchBudget, OrderExecutor, OrderParams, PositionMonitor, RefreshReport,
    SignalPoller,
};
use crate::models::{AuditEventType, TradingSignal};
use crate::persistence::{SignalFilter, SignalStore};
use crate::terminal::{mask_account, AccountInfo, Terminal, TerminalCredentials};
use crate::Result;

/// Where the main loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Disconnected,
    Connected,
    Polling,
    Executing,
    Monitoring,
}

/// What one poll → execute → monitor pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub fetched: usize,
    pub executed: usize,
    pub failed: usize,
    pub positions: RefreshReport,
}

/// The reconciliation loop
///
/// Owns one terminal session and one backend handle, both used strictly
/// sequentially.
pub struct Bot {
    terminal: Arc<dyn Terminal>,
    credentials: TerminalCredentials,
    poller: SignalPoller,
    executor: OrderExecutor,
    monitor: PositionMonitor,
    audit: AuditLogger,
    order_spacing: Duration,
    poll_interval: Duration,
    max_fetch_errors: u32,
    mask_account: bool,
    state: BotState,
}

impl Bot {
    pub fn new(config: &BotConfig, store: Arc<dyn SignalStore>, terminal: Arc<dyn Terminal>) -> Self {
        let operator_id = config.operator_id();
        let audit = AuditLogger::new(store.clone(), config.audit.enabled, operator_id);

        Self {
            credentials: TerminalCredentials {
                login: config.terminal.login,
                password: config.terminal.password.expose().to_string(),
                server: config.terminal.server.clone(),
            },
            poller: SignalPoller::new(
                store.clone(),
                SignalFilter::new(config.trading.min_confidence),
            ),
            executor: OrderExecutor::new(
                terminal.clone(),
                store.clone(),
                audit.clone(),
                OrderParams::from(&config.trading),
                operator_id,
            ),
            monitor: PositionMonitor::new(terminal.clone(), store),
            terminal,
            audit,
            order_spacing: config.trading.order_spacing(),
            poll_interval: config.trading.poll_interval(),
            max_fetch_errors: config.trading.max_fetch_errors,
            mask_account: config.logging.mask_account,
            state: BotState::Disconnected,
        }
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    fn transition(&mut self, next: BotState) {
        if self.state != next {
            tracing::debug!("State {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn account_label(&self, login: u64) -> String {
        if self.mask_account {
            mask_account(login)
        } else {
            login.to_string()
        }
    }

    /// Log into the terminal; any failure is fatal
    pub async fn connect(&mut self) -> Result<AccountInfo> {
        let account = match self.terminal.connect(&self.credentials).await {
            Ok(account) => account,
            Err(e) => {
                tracing::error!("MT5 login failed: {}", e);
                if let Err(e) = self.terminal.shutdown().await {
                    tracing::debug!("Terminal shutdown after failed login: {}", e);
                }
                return Err(match e {
                    BotError::Connection(msg) => BotError::Connection(msg),
                    other => BotError::Connection(other.to_string()),
                });
            }
        };

        let label = self.account_label(account.login);

        // Balance, leverage, margin and equity stay out of the logs
        tracing::info!("✅ Connected to MT5");
        tracing::info!("   Account: {}", label);
        tracing::info!("   Server: {}", account.server);
        tracing::info!("   Currency: {}", account.currency);

        self.transition(BotState::Connected);

        self.audit
            .record(
                AuditEventType::BotConnected,
                json!({
                    "server": account.server,
                    "account": mask_account(account.login),
                }),
            )
            .await;

        Ok(account)
    }

    /// One poll → execute → monitor pass
    ///
    /// Only an exhausted fetch budget is returned as an error; per-signal
    /// failures are recorded and counted in the report.
    pub async fn run_cycle(&mut self, budget: &mut FetchBudget) -> Result<CycleReport> {
        let (_never, mut stop) = watch::channel(false);
        self.cycle(budget, &mut stop).await
    }

    /// A signal that has started executing always runs to completion;
    /// `stop` is only looked at between signals and during the spacing pause.
    async fn cycle(
        &mut self,
        budget: &mut FetchBudget,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        self.transition(BotState::Polling);
        let signals = self.poller.fetch_pending_signals(budget).await?;
        report.fetched = signals.len();

        if !signals.is_empty() {
            tracing::info!("📊 Found {} new signal(s)", signals.len());
            self.transition(BotState::Executing);

            for (done, signal) in signals.iter().enumerate() {
                log_signal(signal);

                match self.executor.execute(signal).await {
                    Ok(_) => report.executed += 1,
                    Err(_) => report.failed += 1,
                }

                if pause(self.order_spacing, stop).await {
                    let left = signals.len() - done - 1;
                    if left > 0 {
                        tracing::info!("Shutdown requested, leaving {} signal(s) pending", left);
                    }
                    self.transition(BotState::Connected);
                    return Ok(report);
                }
            }
        }

        self.transition(BotState::Monitoring);
        report.positions = self.monitor.refresh_open_positions().await;

        self.transition(BotState::Connected);
        Ok(report)
    }

    /// Returns `Ok` only once a stop was requested
    async fn run_loop(&mut self, mut stop: watch::Receiver<bool>) -> Result<()> {
        let mut budget = FetchBudget::new(self.max_fetch_errors);

        while !*stop.borrow() {
            self.cycle(&mut budget, &mut stop).await?;
            if pause(self.poll_interval, &mut stop).await {
                break;
            }
        }

        tracing::info!("⏹️  Bot stopped by user");
        Ok(())
    }

    /// Run until `shutdown` resolves or a fatal error occurs
    ///
    /// `shutdown` never cancels a signal mid-execution: the loop finishes the
    /// signal in hand, then stops. The terminal session is closed on the way
    /// out either way.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.connect().await?;

        tracing::info!(
            "🤖 Bot started. Polling every {} seconds...",
            self.poll_interval.as_secs()
        );
        tracing::info!("Press Ctrl+C to stop");

        let (stop_tx, stop_rx) = watch::channel(false);
        let watcher = async move {
            shutdown.await;
            let _ = stop_tx.send(true);
            // Keeps the sender alive; the loop ends on its own after this
            std::future::pending::<()>().await;
        };

        let result = tokio::select! {
            _ = watcher => Ok(()),
            result = self.run_loop(stop_rx) => result,
        };

        let reason = match &result {
            Ok(()) => "shutdown",
            Err(e) => {
                tracing::error!("💥 Bot crashed: {}", e);
                "fatal_error"
            }
        };
        self.disconnect(reason).await;

        result
    }

    /// Connect, run a single cycle, disconnect
    pub async fn run_once(&mut self) -> Result<CycleReport> {
        self.connect().await?;

        let mut budget = FetchBudget::new(self.max_fetch_errors);
        let result = self.run_cycle(&mut budget).await;

        let reason = if result.is_ok() { "completed" } else { "fatal_error" };
        self.disconnect(reason).await;

        result
    }

    async fn disconnect(&mut self, reason: &str) {
        self.audit
            .record(AuditEventType::BotStopped, json!({ "reason": reason }))
            .await;

        if let Err(e) = self.terminal.shutdown().await {
            tracing::warn!("Terminal shutdown failed: {}", e);
        }

        self.transition(BotState::Disconnected);
        tracing::info!("👋 MT5 connection closed");
    }
}

/// Sleep for `duration`; true when a stop was requested before it elapsed
async fn pause(duration: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        Ok(_) = stop.wait_for(|stopped| *stopped) => {}
    }
    *stop.borrow()
}

fn log_signal(signal: &TradingSignal) {
    fn price(value: Option<f64>) -> String {
        value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
    }

    tracing::info!("🎯 Signal: {} {}", signal.symbol, signal.signal_type);
    tracing::info!("   Confidence: {}%", signal.confidence_score);
    tracing::info!("   Entry: {}", price(signal.current_price));
    tracing::info!("   Target: {}", price(signal.target_price));
    tracing::info!("   Stop Loss: {}", price(signal.stop_loss));
}
