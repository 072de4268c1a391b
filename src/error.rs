use thiserror::Error;

#[derive(Debug, Error)]
pub enum TiraError {
    #[error(transparent)]
    Provider(#[from] crate::providers::ProviderError),

    #[error(transparent)]
    Source(#[from] crate::sources::SourceError),

    #[error(transparent)]
    Sink(#[from] crate::sources::SinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("reconciliation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("run cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_error_display() {
        let err = TiraError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "configuration error: missing field");
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(TiraError::Cancelled.to_string(), "run cancelled");
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: TiraError = io_err.into();
        assert!(matches!(err, TiraError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_provider_error_from_conversion() {
        let provider_err = crate::providers::ProviderError::UnknownProvider("cloudflare".to_string());
        let err: TiraError = provider_err.into();
        assert!(matches!(err, TiraError::Provider(_)));
        assert!(err.to_string().contains("unknown provider: cloudflare"));
    }

    #[test]
    fn test_sink_error_from_conversion() {
        let sink_err = crate::sources::SinkError::AlreadyExists("out/storage/imports/r_imports.tf".into());
        let err: TiraError = sink_err.into();
        assert!(matches!(err, TiraError::Sink(_)));
        assert!(err.to_string().contains("artifact already exists"));
    }

    #[test]
    fn test_source_error_from_conversion() {
        let source_err = crate::sources::SourceError::Io {
            path: "state/acct-1".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let err: TiraError = source_err.into();
        assert!(matches!(err, TiraError::Source(_)));
        assert!(err.to_string().contains("state/acct-1"));
    }
}
