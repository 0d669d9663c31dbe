use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Row store read failed: {message}")]
    StoreReadError { message: String },

    #[error("Row store write failed for row {row_id}: {message}")]
    StoreWriteError { row_id: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Worth retrying as-is.
    Medium,
    /// Operator has to fix something before re-running.
    High,
    Critical,
}

impl BackfillError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BackfillError::MissingConfigError { .. }
            | BackfillError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            BackfillError::StoreReadError { .. } => ErrorSeverity::Critical,
            BackfillError::ApiError(_)
            | BackfillError::IoError(_)
            | BackfillError::SerializationError(_)
            | BackfillError::StoreWriteError { .. } => ErrorSeverity::Medium,
        }
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BackfillError::MissingConfigError { field } => {
                format!("{} is required but was not set", field)
            }
            BackfillError::InvalidConfigValueError { field, reason, .. } => {
                format!("{} is invalid: {}", field, reason)
            }
            BackfillError::StoreReadError { message } => {
                format!("Could not read rows from the store: {}", message)
            }
            BackfillError::StoreWriteError { row_id, message } => {
                format!("Could not update row {}: {}", row_id, message)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BackfillError::MissingConfigError { .. } => {
                "Set SUPABASE_URL and SUPABASE_KEY (or pass --supabase-url / --supabase-key)"
            }
            BackfillError::InvalidConfigValueError { .. } => {
                "Check the flagged value; URLs must start with http:// or https://"
            }
            BackfillError::StoreReadError { .. } => {
                "Check the store URL, the access key and network connectivity, then re-run"
            }
            BackfillError::StoreWriteError { .. } => {
                "Re-run the backfill; rows that failed remain eligible"
            }
            BackfillError::ApiError(_) => "Check network connectivity and re-run",
            BackfillError::IoError(_) => "Check the report path exists and is writable",
            BackfillError::SerializationError(_) => "Report this as a bug",
        }
    }
}

pub type Result<T> = std::result::Result<T, BackfillError>;
