use super::ErrorCode;

pub fn all_codes() -> &'static [ErrorCode] {
    &[
        ErrorCode::ConfigMissingKey,
        ErrorCode::ConfigInvalidJson,
        ErrorCode::ConfigInvalidValue,
        ErrorCode::ValidationMissingArgument,
        ErrorCode::ValidationInvalidArgument,
        ErrorCode::ValidationInvalidJson,
        ErrorCode::SiteNotFound,
        ErrorCode::ServerNotFound,
        ErrorCode::TaskNotFound,
        ErrorCode::SshServerInvalid,
        ErrorCode::SshIdentityFileNotFound,
        ErrorCode::RemoteCommandFailed,
        ErrorCode::GitCommandFailed,
        ErrorCode::InternalIoError,
        ErrorCode::InternalJsonError,
        ErrorCode::InternalUnexpected,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique_and_dotted() {
        let mut seen = std::collections::HashSet::new();
        for code in all_codes() {
            assert!(code.as_str().contains('.'), "{}", code.as_str());
            assert!(seen.insert(code.as_str()), "duplicate {}", code.as_str());
        }
    }
}
