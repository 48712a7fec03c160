use std::collections::HashMap;

/// Severity of a structured log record (`debug` for routine traffic, `error`
/// for exceptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// The logger-sink contract: `log(level, message, extra)`. Independent
/// of any particular backend so `InnerLogger`/`OuterLogger` can be handed
/// whatever sink a caller's application already uses.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, extra: &HashMap<String, serde_json::Value>);
}

/// Default sink: emits through `tracing`, separating structured fields
/// (`extra`) from the human-readable message.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str, extra: &HashMap<String, serde_json::Value>) {
        let extra = serde_json::to_string(extra).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(extra = %extra, "{message}"),
            LogLevel::Info => tracing::info!(extra = %extra, "{message}"),
            LogLevel::Warn => tracing::warn!(extra = %extra, "{message}"),
            LogLevel::Error => tracing::error!(extra = %extra, "{message}"),
        }
    }
}
