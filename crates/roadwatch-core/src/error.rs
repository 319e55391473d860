use std::fmt;

/// Machine-readable error codes for operators and schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidRegionRegistry,
    FeedUnreachable,
    FeedDecodeFailed,
    StoreUnavailable,
    StoreWriteFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidRegionRegistry => "E2001",
            Self::FeedUnreachable => "E3001",
            Self::FeedDecodeFailed => "E3002",
            Self::StoreUnavailable => "E4001",
            Self::StoreWriteFailed => "E4002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidRegionRegistry => "Invalid region registry",
            Self::FeedUnreachable => "Upstream feed unreachable",
            Self::FeedDecodeFailed => "Upstream feed payload could not be decoded",
            Self::StoreUnavailable => "State store unavailable",
            Self::StoreWriteFailed => "State store write failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix the syntax or values in roadwatch.toml and retry."),
            Self::InvalidRegionRegistry => {
                Some("Region names must be unique, non-empty, and not \"Other\".")
            }
            Self::FeedUnreachable => {
                Some("The pass was aborted before any write; the next scheduled run retries.")
            }
            Self::FeedDecodeFailed => Some("Inspect the upstream payload with --feed-file."),
            Self::StoreUnavailable => Some("Check the database path and permissions."),
            Self::StoreWriteFailed => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidRegionRegistry,
            ErrorCode::FeedUnreachable,
            ErrorCode::FeedDecodeFailed,
            ErrorCode::StoreUnavailable,
            ErrorCode::StoreWriteFailed,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::FeedUnreachable.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }
}
