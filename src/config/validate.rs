use super::{BackendKind, BotConfig};
use crate::error::BotError;
use crate::Result;

/// Check everything serde cannot, collecting every problem before failing.
pub fn validate_config(config: &BotConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_backend(config, &mut errors);
    validate_terminal(config, &mut errors);
    validate_trading(config, &mut errors);

    if config.audit.operator_id.is_none() {
        errors.push(
            "audit.operator_id is not set (BOT_USER_ID); use your user UUID from the auth.users table"
                .into(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(BotError::Config(format!(
            "{} problem{}:\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        )))
    }
}

fn validate_backend(config: &BotConfig, errors: &mut Vec<String>) {
    let backend = &config.backend;

    match backend.kind {
        BackendKind::Rest => {
            if backend.url.trim().is_empty() {
                errors.push("backend.url is not set (SUPABASE_URL)".into());
            } else if !backend.url.starts_with("http://") && !backend.url.starts_with("https://") {
                errors.push(format!("backend.url must be http(s), got {}", backend.url));
            }
            if backend.service_key.is_empty() {
                errors.push("backend.service_key is not set (SUPABASE_SERVICE_ROLE_KEY)".into());
            }
        }
        BackendKind::Postgres => {
            if backend.database_url.as_ref().map_or(true, |url| url.is_empty()) {
                errors.push("backend.database_url is not set (DATABASE_URL)".into());
            }
        }
    }
}

fn validate_terminal(config: &BotConfig, errors: &mut Vec<String>) {
    let terminal = &config.terminal;

    if terminal.login == 0 {
        errors.push("terminal.login is not set (MT5_LOGIN)".into());
    }
    if terminal.password.is_empty() {
        errors.push("terminal.password is not set (MT5_PASSWORD)".into());
    }
    if terminal.server.trim().is_empty() {
        errors.push("terminal.server is not set (MT5_SERVER)".into());
    }
    if terminal.bridge_url.trim().is_empty() {
        errors.push("terminal.bridge_url is not set (MT5_BRIDGE_URL)".into());
    }
}

fn validate_trading(config: &BotConfig, errors: &mut Vec<String>) {
    let trading = &config.trading;

    if !(0.0..=100.0).contains(&trading.min_confidence) {
        errors.push(format!(
            "trading.min_confidence must be within 0-100, got {}",
            trading.min_confidence
        ));
    }
    if trading.volume.is_nan() || trading.volume <= 0.0 {
        errors.push(format!("trading.volume must be positive, got {}", trading.volume));
    }
    if trading.poll_interval_secs == 0 {
        errors.push("trading.poll_interval_secs must be at least 1".into());
    }
    if trading.max_fetch_errors == 0 {
        errors.push("trading.max_fetch_errors must be at least 1".into());
    }
}
