use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::Result;

/// Install the global subscriber: console always, plus the log file when one
/// is configured.
///
/// The returned guard flushes the file writer on drop and has to live as long
/// as the process.
pub fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);

    if logging.file.as_os_str().is_empty() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .init();
        return Ok(None);
    }

    let dir = match logging.file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let file_name = logging
        .file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "signalbot.log".into());

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}
