//! CLI response formatting and output.
//!
//! Provides JSON envelope, printing, and exit code mapping.

use dropship::error::Hint;
use dropship::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
                retryable: err.retryable,
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = response.to_json()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(()); // Exit gracefully on SIGPIPE
        }
        return Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        ));
    }
    Ok(())
}

fn print_success<T: Serialize>(data: T) -> Result<()> {
    print_response(&CliResponse::success(data))
}

pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize response".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationMissingArgument
        | ErrorCode::ValidationInvalidArgument
        | ErrorCode::ValidationInvalidJson => 2,

        ErrorCode::SiteNotFound | ErrorCode::ServerNotFound | ErrorCode::TaskNotFound => 4,

        ErrorCode::SshServerInvalid | ErrorCode::SshIdentityFileNotFound => 10,

        ErrorCode::RemoteCommandFailed | ErrorCode::GitCommandFailed => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    match result {
        Ok(data) => print_success(data),
        Err(err) => print_response(&CliResponse::<()>::from_error(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropship::error::{RemoteCommandFailedDetails, TargetDetails};

    #[test]
    fn error_families_map_to_exit_codes() {
        assert_eq!(exit_code_for_error(ErrorCode::ValidationInvalidArgument), 2);
        assert_eq!(exit_code_for_error(ErrorCode::ConfigMissingKey), 2);
        assert_eq!(exit_code_for_error(ErrorCode::SiteNotFound), 4);
        assert_eq!(exit_code_for_error(ErrorCode::TaskNotFound), 4);
        assert_eq!(exit_code_for_error(ErrorCode::SshIdentityFileNotFound), 10);
        assert_eq!(exit_code_for_error(ErrorCode::GitCommandFailed), 20);
        assert_eq!(exit_code_for_error(ErrorCode::InternalUnexpected), 1);
    }

    #[test]
    fn only_internal_errors_exit_with_one() {
        for code in dropship::error::all_codes() {
            let internal = code.as_str().starts_with("internal.");
            assert_eq!(exit_code_for_error(*code) == 1, internal, "{}", code.as_str());
        }
    }

    #[test]
    fn remote_failure_maps_to_json_error() {
        let err = Error::remote_command_failed(RemoteCommandFailedDetails {
            command: "chown -R deploy:www-data /var/www/blog".to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "Operation not permitted".to_string(),
            target: TargetDetails::default(),
        });

        let (json, exit_code) = map_cmd_result_to_json::<serde_json::Value>(Err(err));

        assert_eq!(exit_code, 20);
        let response = CliResponse::<()>::from_error(&json.unwrap_err());
        assert!(!response.success);
        let error = response.error.unwrap();
        assert_eq!(error.code, "remote.command_failed");
        assert_eq!(error.details["stderr"], "Operation not permitted");
    }

    #[test]
    fn success_keeps_command_exit_code() {
        let (json, exit_code) = map_cmd_result_to_json(Ok((serde_json::json!({"ok": true}), 20)));
        assert_eq!(exit_code, 20);
        assert_eq!(json.unwrap()["ok"], true);
    }
}
