use thiserror::Error;

/// Unified error type threaded through the call pipeline.
///
/// A call either returns a response or raises one of these; plugins never
/// swallow errors, they only observe and re-raise.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("endpoint not found in spec: {0}")]
    Spec(String),

    #[error("plugin error in hook `{hook}`: {message}")]
    Plugin { hook: &'static str, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("too many requests pending (hard limit reached)")]
    TooManyRequestsPending,

    #[error("too much time spent pending admission")]
    TooMuchTimePending,

    #[error("parse error: {message}")]
    Parse {
        message: String,
        /// Status of the response that failed to parse, so callers that
        /// only care about the status don't need to downcast the attached
        /// transport response.
        status: Option<u16>,
    },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn plugin(hook: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Plugin {
            hook,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>, status: Option<u16>) -> Self {
        ServiceError::Parse {
            message: message.into(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_error_carries_hook_name() {
        let err = ServiceError::plugin("before_request", "boom");
        assert_eq!(
            err.to_string(),
            "plugin error in hook `before_request`: boom"
        );
    }

    #[test]
    fn parse_error_carries_status() {
        let err = ServiceError::parse("bad json", Some(502));
        match err {
            ServiceError::Parse { status, .. } => assert_eq!(status, Some(502)),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn timeout_display_includes_duration() {
        let err = ServiceError::Timeout(std::time::Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }
}
