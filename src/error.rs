//! Error types.
//!
//! Two layers:
//!
//! - `FetchError`: what went wrong with a single explorer request. The fetch layer
//!   retries these locally and degrades to "no data" once the budget is spent.
//! - `AppError`: what ends a run. Carries the process exit code.

use std::path::Path;

use reqwest::StatusCode;

/// Exit code for bad input, configuration or local storage problems.
pub const EXIT_INPUT: u8 = 2;
/// Exit code when required remote data could not be fetched.
pub const EXIT_FETCH: u8 = 3;
/// Exit code when an analysis had nothing usable to work with.
pub const EXIT_ANALYSIS: u8 = 4;

/// A failed explorer request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection, timeout or body transfer failure.
    #[error("network error: {0}")]
    Transient(#[from] reqwest::Error),

    /// HTTP 429.
    #[error("rate limited ({status})")]
    RateLimited { status: StatusCode },

    /// Any other non-2xx status.
    #[error("HTTP status {status}")]
    Http { status: StatusCode },

    /// 2xx response whose body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// Retry budget spent.
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::RateLimited { status } | FetchError::Http { status } => Some(*status),
            FetchError::Transient(e) => e.status(),
            FetchError::Decode(_) => None,
            FetchError::Exhausted { last, .. } => last.status(),
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// A local input file the run depends on does not exist.
    pub fn missing_input(path: &Path) -> Self {
        Self::new(EXIT_INPUT, format!("File {} not found!", path.display()))
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_reports_inner_status() {
        let err = FetchError::Exhausted {
            attempts: 3,
            last: Box::new(FetchError::RateLimited {
                status: StatusCode::TOO_MANY_REQUESTS,
            }),
        };
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
        assert!(err.to_string().starts_with("gave up after 3 attempt(s)"));
    }

    #[test]
    fn missing_input_is_an_input_error() {
        let err = AppError::missing_input(Path::new("amm.json"));
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert_eq!(err.to_string(), "File amm.json not found!");
    }
}
