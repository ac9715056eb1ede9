use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Nothing to analyze: {reason}")]
    EmptyInput { reason: EmptyInputReason },

    #[error("Aggregation task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyInputReason {
    NoValidRecords,
    EmptyCatalog,
}

impl std::fmt::Display for EmptyInputReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            EmptyInputReason::NoValidRecords => "no customer record survived validation",
            EmptyInputReason::EmptyCatalog => "the plan catalog is empty",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnalysisError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalysisError::CsvError(_) | AnalysisError::IoError(_) => ErrorCategory::Input,
            AnalysisError::ConfigValidationError { .. }
            | AnalysisError::InvalidConfigValueError { .. }
            | AnalysisError::MissingConfigError { .. } => ErrorCategory::Configuration,
            AnalysisError::EmptyInput { .. } | AnalysisError::ProcessingError { .. } => {
                ErrorCategory::Data
            }
            AnalysisError::SerializationError(_) | AnalysisError::TaskFailed(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AnalysisError::EmptyInput { .. } => ErrorSeverity::Medium,
            AnalysisError::TaskFailed(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AnalysisError::CsvError(_) => {
                "Check that the input is a comma separated file with a header row"
            }
            AnalysisError::IoError(_) => "Check that the input path exists and is readable",
            AnalysisError::SerializationError(_) => "Re-run with --verbose and report the failure",
            AnalysisError::ConfigValidationError { .. }
            | AnalysisError::InvalidConfigValueError { .. }
            | AnalysisError::MissingConfigError { .. } => {
                "Fix the configuration file or the matching command line flag"
            }
            AnalysisError::EmptyInput { reason } => match reason {
                EmptyInputReason::EmptyCatalog => "Add at least one [[plans]] entry",
                EmptyInputReason::NoValidRecords => {
                    "Inspect the skipped-records report; every input row was rejected"
                }
            },
            AnalysisError::TaskFailed(_) => "Re-run the analysis; the worker task panicked",
            AnalysisError::ProcessingError { .. } => "Re-run with --verbose to see the failing stage",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AnalysisError::EmptyInput { reason } => format!("Analysis aborted: {}", reason),
            AnalysisError::MissingConfigError { field } => {
                format!("Missing setting '{}'", field)
            }
            other => other.to_string(),
        }
    }

    pub fn empty(reason: EmptyInputReason) -> Self {
        AnalysisError::EmptyInput { reason }
    }
}

/// Per-record failure. Never aborts a run: the record is skipped and reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("amount '{0}' is not numeric")]
    InvalidAmount(String),

    #[error("field '{field}' has unparseable date '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error("field '{field}' has invalid value '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("cancellation date {canceled} precedes start date {start}")]
    InvalidDateRange { start: NaiveDate, canceled: NaiveDate },

    #[error("start date {start} is after the analysis cutoff {as_of}")]
    AfterCutoff { start: NaiveDate, as_of: NaiveDate },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_distinguishable() {
        let err = AnalysisError::empty(EmptyInputReason::EmptyCatalog);
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.user_friendly_message().contains("plan catalog is empty"));
    }

    #[test]
    fn test_config_errors_share_category() {
        let err = AnalysisError::MissingConfigError {
            field: "source.path".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }
}
