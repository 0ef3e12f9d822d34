/*!
 * Error handling for medrank operations
 *
 * Every failure a load, ranking or export can hit, with enough context
 * (file, line, record index) for the CLI to point at the bad input.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// medrank library result type
pub type Result<T> = std::result::Result<T, MedrankError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum MedrankError {
    /// Reading a data file or writing an export failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// Malformed CSV row
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        context: ErrorContext,
    },

    /// JSON parsing errors
    #[error("JSON parsing error: {message}")]
    JsonParse {
        message: String,
        context: ErrorContext,
    },

    /// A billing record that cannot be used for aggregation
    #[error("Data validation error: {message}")]
    DataValidation {
        message: String,
        field: Option<String>,
        value: Option<String>,
        context: ErrorContext,
    },

    /// Search input that cannot be looked up
    #[error("Invalid search: {message}")]
    InvalidSearch {
        message: String,
    },

    /// Unknown ranking metric name
    #[error("Invalid ranking metric '{value}'")]
    InvalidMetric {
        value: String,
        valid_options: Vec<String>,
    },

    /// Data file missing
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// Input file of a kind the reader does not understand
    #[error("Unsupported data format for '{path}'")]
    UnsupportedFormat {
        path: PathBuf,
        suggestion: String,
    },

    /// CSV header mismatch
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        message: String,
        missing_columns: Vec<String>,
    },

    /// Bad config file, environment override or saved selection
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Anything else, with an optional hint
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Where in the input an error happened
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line_number: Option<usize>,
    pub record_index: Option<usize>,
}

/// Export format for rankings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    JsonLines,
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::JsonLines => write!(f, "JSON Lines"),
            ExportFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl MedrankError {
    /// Create a file not found error with helpful suggestion
    pub fn file_not_found_with_suggestion(path: PathBuf) -> Self {
        let suggestion = if path.to_string_lossy().to_lowercase().contains("cms") {
            format!(
                "Check if the file exists at '{}'. The Medicare Physician & Other Practitioners \
                data can be downloaded from https://data.cms.gov and converted to JSON or CSV.",
                path.display()
            )
        } else {
            format!(
                "Check if the file exists at '{}'. Make sure the path is correct and you have read permissions.",
                path.display()
            )
        };

        Self::FileNotFound { path, suggestion }
    }

    /// Create an error for a search with a blank first or last name
    pub fn blank_search_name() -> Self {
        Self::InvalidSearch {
            message: "Please enter both first and last name.".to_string(),
        }
    }

    /// Create an invalid metric error with valid options
    pub fn invalid_metric(value: &str) -> Self {
        Self::InvalidMetric {
            value: value.to_string(),
            valid_options: vec![
                "services (total services performed)".to_string(),
                "payment (average Medicare payment)".to_string(),
            ],
        }
    }

    /// Create a validation error for a missing or unusable field in a record
    pub fn invalid_field(field: &str, value: Option<String>, reason: &str, record_index: Option<usize>) -> Self {
        let message = match record_index {
            Some(idx) => format!("record {}: field '{}' {}", idx, field, reason),
            None => format!("field '{}' {}", field, reason),
        };

        Self::DataValidation {
            message,
            field: Some(field.to_string()),
            value,
            context: ErrorContext {
                record_index,
                ..Default::default()
            },
        }
    }

    /// Summed service counts for `scope` no longer fit in a `u64`
    pub fn services_overflow(scope: impl fmt::Display) -> Self {
        Self::DataValidation {
            message: format!("total services for {} exceed {}", scope, u64::MAX),
            field: Some("Tot_Srvcs".to_string()),
            value: None,
            context: ErrorContext::default(),
        }
    }

    /// Create a schema mismatch error listing the missing columns
    pub fn missing_columns(missing: Vec<String>) -> Self {
        Self::SchemaMismatch {
            message: format!("missing required columns: {}", missing.join(", ")),
            missing_columns: missing,
        }
    }

    /// Attach a file path to errors that carry an `ErrorContext`
    pub fn with_path(mut self, path: PathBuf) -> Self {
        match &mut self {
            Self::Io { context, .. }
            | Self::CsvParse { context, .. }
            | Self::JsonParse { context, .. }
            | Self::DataValidation { context, .. } => {
                context.file_path = Some(path);
            }
            _ => {}
        }
        self
    }

    /// Message for the terminal, including the suggestion when there is one
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { suggestion, .. } | Self::UnsupportedFormat { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::InvalidMetric { valid_options, .. } => {
                format!("{}\n\nValid options: {}", self, valid_options.join(", "))
            }
            Self::DataValidation { context: ErrorContext { file_path: Some(path), .. }, .. } => {
                format!("{}\n\nIn file: {}", self, path.display())
            }
            Self::Configuration { suggestion: Some(sug), .. }
            | Self::Export { suggestion: Some(sug), .. }
            | Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

impl From<std::io::Error> for MedrankError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for MedrankError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line() as usize);

        Self::CsvParse {
            message: err.to_string(),
            line,
            context: ErrorContext {
                line_number: line,
                ..Default::default()
            },
        }
    }
}

impl From<serde_json::Error> for MedrankError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            context: ErrorContext {
                line_number: Some(err.line()),
                ..Default::default()
            },
        }
    }
}
