use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ValidationInvalidArgument,

    ScanUnreadableFile,
    OrchestrationStoreUnavailable,

    RunNotFound,
    BackupNotFound,
    ComponentUnknown,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ScanUnreadableFile => "scan.unreadable_file",
            ErrorCode::OrchestrationStoreUnavailable => "orchestration.store_unavailable",

            ErrorCode::RunNotFound => "run.not_found",
            ErrorCode::BackupNotFound => "backup.not_found",
            ErrorCode::ComponentUnknown => "component.unknown",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetails {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreUnavailableDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: hint.into(),
        });
        self
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = serde_json::to_value(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            tried,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn scan_unreadable_file(file: impl Into<String>, reason: impl Into<String>) -> Self {
        let details = serde_json::to_value(FileDetails {
            file: file.into(),
            reason: Some(reason.into()),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ScanUnreadableFile,
            "File could not be decoded as text",
            details,
        )
    }

    pub fn store_unavailable(path: impl Into<String>, error: impl Into<String>) -> Self {
        let details = serde_json::to_value(StoreUnavailableDetails {
            path: path.into(),
            error: error.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::OrchestrationStoreUnavailable,
            "Backup store is unavailable",
            details,
        )
    }

    pub fn run_not_found(run_id: impl Into<String>) -> Self {
        let id = run_id.into();
        Self::new(
            ErrorCode::RunNotFound,
            format!("Run not found: {}", id),
            serde_json::json!({ "runId": id }),
        )
        .with_hint("Run 'logshift status' to see recorded runs")
    }

    pub fn backup_not_found(file: impl Into<String>) -> Self {
        let details = serde_json::to_value(FileDetails {
            file: file.into(),
            reason: None,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::BackupNotFound,
            "No backup recorded for file",
            details,
        )
    }

    pub fn component_unknown(name: impl Into<String>, tried: Vec<String>) -> Self {
        let name = name.into();
        let details = serde_json::json!({ "component": name, "known": tried });
        Self::new(
            ErrorCode::ComponentUnknown,
            format!("Unknown component '{}'", name),
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::to_value(InternalIoErrorDetails {
            error: error.into(),
            context,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::InternalIoError, "I/O operation failed", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": error.into(),
            "context": context,
        });

        Self::new(
            ErrorCode::InternalJsonError,
            "JSON serialization failed",
            details,
        )
    }

    pub fn internal_unexpected(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_dotted_strings() {
        assert_eq!(ErrorCode::ScanUnreadableFile.as_str(), "scan.unreadable_file");
        assert_eq!(
            ErrorCode::OrchestrationStoreUnavailable.as_str(),
            "orchestration.store_unavailable"
        );
    }

    #[test]
    fn hints_accumulate() {
        let err = Error::run_not_found("abc").with_hint("second hint");
        assert_eq!(err.hints.len(), 2);
    }

    #[test]
    fn display_uses_message() {
        let err = Error::backup_not_found("src/a.js");
        assert_eq!(format!("{}", err), "No backup recorded for file");
    }
}
