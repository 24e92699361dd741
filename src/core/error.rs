use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigReadFailed,
    ConfigInvalidDocument,
    ConfigMissingKey,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    GitCommandFailed,

    PlatformCommandFailed,
    PlatformInvalidResponse,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigReadFailed => "config.read_failed",
            ErrorCode::ConfigInvalidDocument => "config.invalid_document",
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::GitCommandFailed => "git.command_failed",

            ErrorCode::PlatformCommandFailed => "platform.command_failed",
            ErrorCode::PlatformInvalidResponse => "platform.invalid_response",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ConfigReadFailed
            | ErrorCode::ConfigInvalidDocument
            | ErrorCode::ConfigMissingKey
            | ErrorCode::ConfigInvalidValue
            | ErrorCode::ValidationInvalidArgument => ErrorKind::Configuration,
            ErrorCode::GitCommandFailed => ErrorKind::VcsOperation,
            ErrorCode::PlatformCommandFailed | ErrorCode::PlatformInvalidResponse => {
                ErrorKind::PlatformApi
            }
            ErrorCode::InternalIoError
            | ErrorCode::InternalJsonError
            | ErrorCode::InternalUnexpected => ErrorKind::Internal,
        }
    }
}

/// Coarse failure taxonomy; the binary derives exit codes from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    VcsOperation,
    PlatformApi,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReadDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidDocumentDetails {
    pub path: String,
    pub format: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub operation: String,
    pub command: String,
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalErrorDetails {
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
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub fn config_read_failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        let path = path.into();
        let message = format!("Failed to read configuration file '{}'", path);
        Self::new(
            ErrorCode::ConfigReadFailed,
            message,
            to_details(ConfigReadDetails {
                path,
                error: error.into(),
            }),
        )
    }

    pub fn config_invalid_document(
        path: impl Into<String>,
        format: &str,
        error: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidDocument,
            format!("Configuration document is not valid {}", format),
            to_details(ConfigInvalidDocumentDetails {
                path: path.into(),
                format: format.to_string(),
                error: error.into(),
            }),
        )
        .with_hint("Check the configuration file syntax and field types")
    }

    pub fn config_missing_key(key: impl Into<String>) -> Self {
        let key = key.into();
        let message = format!("Missing or empty config field '{}'", key);
        Self::new(
            ErrorCode::ConfigMissingKey,
            message,
            to_details(ConfigMissingKeyDetails { key }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value: {}", problem),
            to_details(ConfigInvalidValueDetails {
                key: key.into(),
                value,
                problem,
            }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            to_details(InvalidArgumentDetails {
                field: field.into(),
                problem: problem.into(),
            }),
        )
    }

    pub fn git_command_failed(
        operation: impl Into<String>,
        command: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::GitCommandFailed,
            format!("git {} failed", operation),
            to_details(CommandFailedDetails {
                operation,
                command: command.into(),
                output: output.into(),
            }),
        )
        .with_hint("Inspect details.output for the underlying git failure")
    }

    pub fn platform_command_failed(
        operation: impl Into<String>,
        command: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::PlatformCommandFailed,
            format!("Pull request {} failed", operation),
            to_details(CommandFailedDetails {
                operation,
                command: command.into(),
                output: output.into(),
            }),
        )
    }

    pub fn platform_invalid_response(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PlatformInvalidResponse,
            "Unexpected response from hosting platform",
            serde_json::json!({
                "operation": operation.into(),
                "error": error.into(),
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Attach an extra key to `details`, turning non-object details into an object.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !self.details.is_object() {
            self.details = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn with_domain(self, domain: &str) -> Self {
        self.with_detail("domain", domain)
    }

    /// Domain recorded by `with_domain`, if any.
    pub fn domain(&self) -> Option<&str> {
        self.details.get("domain").and_then(Value::as_str)
    }

    pub fn operation(&self) -> Option<&str> {
        self.details.get("operation").and_then(Value::as_str)
    }
}
