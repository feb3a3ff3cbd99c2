//! Domain error types.

/// Top-level error type for roctrader.
#[derive(Debug, thiserror::Error)]
pub enum RoctraderError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("cannot compute {metric}: {reason}")]
    Computation { metric: String, reason: String },

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

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RoctraderError {
    pub fn data(reason: impl Into<String>) -> Self {
        RoctraderError::Data {
            reason: reason.into(),
        }
    }

    pub fn computation(metric: &str, reason: impl Into<String>) -> Self {
        RoctraderError::Computation {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RoctraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&RoctraderError> for std::process::ExitCode {
    fn from(err: &RoctraderError) -> Self {
        let code: u8 = match err {
            RoctraderError::Io(_) => 1,
            RoctraderError::ConfigParse { .. }
            | RoctraderError::ConfigMissing { .. }
            | RoctraderError::ConfigInvalid { .. } => 2,
            RoctraderError::Data { .. } => 3,
            RoctraderError::NoData { .. } | RoctraderError::InsufficientData { .. } => 5,
            RoctraderError::Computation { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
