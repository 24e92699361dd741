//! Failure envelope and exit code mapping for the binary.

use bit::error::{ErrorKind, Hint};
use bit::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse {
    pub success: bool,
    pub error: CliError,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
}

impl CliResponse {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            error: CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
            },
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

/// Print the error envelope on stderr; stdout carries exported results only.
pub fn print_error(err: &Error) {
    use std::io::{self, Write};

    let payload = match CliResponse::from_error(err).to_json() {
        Ok(payload) => payload,
        Err(_) => format!("{}: {}", err.code.as_str(), err.message),
    };
    let stderr = io::stderr();
    let mut handle = stderr.lock();
    // Nothing useful remains to do if stderr is gone.
    let _ = writeln!(handle, "{}", payload);
}

pub fn exit_code_for_error(code: ErrorCode) -> i32 {
    if code == ErrorCode::ConfigReadFailed {
        return 3;
    }
    match code.kind() {
        ErrorKind::Configuration => 2,
        ErrorKind::VcsOperation | ErrorKind::PlatformApi => 20,
        ErrorKind::Internal => 1,
    }
}

pub fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(exit_code_for_error(ErrorCode::ConfigMissingKey), 2);
        assert_eq!(exit_code_for_error(ErrorCode::ConfigInvalidDocument), 2);
        assert_eq!(exit_code_for_error(ErrorCode::ValidationInvalidArgument), 2);
        assert_eq!(exit_code_for_error(ErrorCode::ConfigReadFailed), 3);
        assert_eq!(exit_code_for_error(ErrorCode::GitCommandFailed), 20);
        assert_eq!(exit_code_for_error(ErrorCode::PlatformInvalidResponse), 20);
        assert_eq!(exit_code_for_error(ErrorCode::PlatformCommandFailed), 20);
        assert_eq!(exit_code_for_error(ErrorCode::InternalUnexpected), 1);
    }

    #[test]
    fn envelope_carries_code_and_details() {
        let err = Error::config_missing_key("Settings.Remote");
        let value = serde_json::to_value(CliResponse::from_error(&err)).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "config.missing_key");
        assert_eq!(value["error"]["details"]["key"], "Settings.Remote");
        assert!(value["error"].get("hints").is_none());
    }

    #[test]
    fn exit_code_clamps_to_byte_range() {
        assert_eq!(exit_code_to_u8(-1), 0);
        assert_eq!(exit_code_to_u8(20), 20);
        assert_eq!(exit_code_to_u8(300), 255);
    }
}
