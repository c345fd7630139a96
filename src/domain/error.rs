//! Domain error types.

/// Top-level error type for smctrader.
#[derive(Debug, thiserror::Error)]
pub enum SmcError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("price fetch failed for {ticker}: {reason}")]
    Fetch { ticker: String, reason: String },

    #[error("alert delivery failed: {reason}")]
    Alert { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SmcError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SmcError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        SmcError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&SmcError> for std::process::ExitCode {
    fn from(err: &SmcError) -> Self {
        let code: u8 = match err {
            SmcError::Io(_) => 1,
            SmcError::ConfigParse { .. }
            | SmcError::ConfigMissing { .. }
            | SmcError::ConfigInvalid { .. } => 2,
            SmcError::Database { .. } | SmcError::DatabaseQuery { .. } => 3,
            SmcError::NoData { .. } | SmcError::Fetch { .. } => 5,
            SmcError::Alert { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
