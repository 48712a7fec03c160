pub mod sink;

pub use sink::{LogLevel, LogSink, TracingLogSink};
