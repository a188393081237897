use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Storage unavailable during {operation}: {message}")]
    StorageUnavailable { operation: String, message: String },

    #[error("No limit configured for plan '{plan}' and tool '{tool}'")]
    UnknownPlanOrTool { plan: String, tool: String },

    #[error("Invalid period '{value}': expected YYYY-MM")]
    InvalidPeriod { value: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Lead {id} not found")]
    LeadNotFound { id: u64 },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Storage,
    Policy,
    Input,
    Config,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl QuotaError {
    pub fn storage(operation: &str, message: impl Into<String>) -> Self {
        QuotaError::StorageUnavailable {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            QuotaError::StorageUnavailable { .. } | QuotaError::IoError(_) => ErrorCategory::Storage,
            QuotaError::UnknownPlanOrTool { .. } => ErrorCategory::Policy,
            QuotaError::InvalidPeriod { .. }
            | QuotaError::InvalidValue { .. }
            | QuotaError::MissingField { .. }
            | QuotaError::LeadNotFound { .. } => ErrorCategory::Input,
            QuotaError::ConfigError { .. } | QuotaError::TomlError(_) => ErrorCategory::Config,
            QuotaError::SerializationError(_) | QuotaError::CsvError(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Storage => ErrorSeverity::Medium,
            ErrorCategory::Policy | ErrorCategory::Config => ErrorSeverity::High,
            ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    /// Storage failures are transient from the caller's point of view.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Storage)
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            QuotaError::StorageUnavailable { .. } | QuotaError::IoError(_) => {
                "Usage data is temporarily unavailable. Please try again.".to_string()
            }
            QuotaError::UnknownPlanOrTool { plan, tool } => {
                format!("The plan '{}' has no limit for tool '{}'", plan, tool)
            }
            QuotaError::InvalidPeriod { value } => {
                format!("'{}' is not a valid month, use the YYYY-MM format", value)
            }
            QuotaError::InvalidValue { field, reason, .. } => {
                format!("The value for {} is invalid: {}", field, reason)
            }
            QuotaError::MissingField { field } => format!("{} is required", field),
            QuotaError::LeadNotFound { id } => format!("Lead {} does not exist", id),
            QuotaError::ConfigError { message } => format!("Configuration problem: {}", message),
            QuotaError::TomlError(_) => "The configuration file is not valid TOML".to_string(),
            QuotaError::SerializationError(_) | QuotaError::CsvError(_) => {
                "An internal data conversion failed".to_string()
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Storage => "Check that the usage store is reachable and retry the request",
            ErrorCategory::Policy => "Add the missing plan/tool entry to the [limits] configuration",
            ErrorCategory::Input => "Correct the input and try again",
            ErrorCategory::Config => "Fix the configuration file and restart",
            ErrorCategory::Internal => "Report this problem together with the logs",
        }
    }
}

pub type Result<T> = std::result::Result<T, QuotaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_retryable() {
        let err = QuotaError::storage("increment", "connection reset");
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("increment"));
    }

    #[test]
    fn test_input_errors_are_not_retryable() {
        let err = QuotaError::InvalidPeriod {
            value: "2024-13".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Input);
        assert!(!err.is_retryable());
        assert!(err.user_friendly_message().contains("2024-13"));
    }
}
