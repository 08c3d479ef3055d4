//! Run-level errors and process exit codes.
//!
//! Only failures that end a run or stop the process become a
//! [`SpeedTestError`]. A failed sub-request is a zero sample, never an
//! error: the phase loops absorb those.

use std::error::Error;
use std::fmt;

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// Server unreachable, DNS failure or timeout.
    pub const NETWORK_ERROR: i32 = 1;
    /// The server answered, but not like a measurement server.
    pub const API_ERROR: i32 = 2;
    /// Bad arguments or an address we could not bind.
    pub const CONFIG_ERROR: i32 = 3;
    /// Interrupted before a result was produced (128 + SIGINT).
    pub const CANCELLED: i32 = 130;
    pub const UNKNOWN_ERROR: i32 = 99;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Dns,
    Timeout,
    /// Error status or a body that did not decode.
    Api,
    Config,
    Unknown,
}

/// Lower-cased message fragments that identify a kind, checked in order.
const MESSAGE_HINTS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::Dns,
        &["dns", "failed to lookup address", "no such host", "name or service not known"],
    ),
    (ErrorKind::Timeout, &["timed out", "timeout", "deadline"]),
    (
        ErrorKind::Network,
        &[
            "connection refused",
            "connection reset",
            "connection closed",
            "network unreachable",
            "host unreachable",
            "broken pipe",
            "tcp connect error",
            "error sending request",
        ],
    ),
    (ErrorKind::Api, &["status", "error decoding response", "expected value"]),
];

impl ErrorKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Network | ErrorKind::Dns | ErrorKind::Timeout => {
                exit_codes::NETWORK_ERROR
            }
            ErrorKind::Api => exit_codes::API_ERROR,
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
            ErrorKind::Unknown => exit_codes::UNKNOWN_ERROR,
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            ErrorKind::Network => {
                Some("Check that `speed-probe serve` is running and reachable.")
            }
            ErrorKind::Dns => Some("Check the host name passed to --server."),
            ErrorKind::Timeout => {
                Some("The server is slow to answer. Try again or raise --timeout.")
            }
            ErrorKind::Api => {
                Some("--server must include the endpoint prefix, e.g. /api/speed-test.")
            }
            ErrorKind::Config | ErrorKind::Unknown => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Network => "Network error",
            ErrorKind::Dns => "DNS resolution error",
            ErrorKind::Timeout => "Timed out",
            ErrorKind::Api => "Unexpected server response",
            ErrorKind::Config => "Configuration error",
            ErrorKind::Unknown => "Unexpected error",
        })
    }
}

#[derive(Debug)]
pub struct SpeedTestError {
    pub kind: ErrorKind,
    pub message: String,
    pub suggestion: Option<String>,
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl SpeedTestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), suggestion: None, source: None }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl fmt::Display for SpeedTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for SpeedTestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

fn classify_reqwest(error: &reqwest::Error) -> Option<ErrorKind> {
    if error.is_timeout() {
        Some(ErrorKind::Timeout)
    } else if error.is_status() || error.is_decode() {
        Some(ErrorKind::Api)
    } else if error.is_builder() {
        Some(ErrorKind::Config)
    } else {
        // Connect errors may still be DNS failures; the message decides.
        None
    }
}

/// Work out what kind of failure `error` is.
///
/// reqwest errors are asked directly; everything else, including the
/// connect errors whose cause is only visible in the text, is matched on
/// the lower-cased messages of the whole source chain.
pub fn classify_error(error: &(dyn Error + 'static)) -> ErrorKind {
    let mut text = String::new();
    let mut current: Option<&(dyn Error + 'static)> = Some(error);

    while let Some(err) = current {
        if let Some(kind) = err.downcast_ref::<reqwest::Error>().and_then(classify_reqwest) {
            return kind;
        }
        text.push_str(&err.to_string().to_lowercase());
        text.push(' ');
        current = err.source();
    }

    MESSAGE_HINTS
        .iter()
        .find(|(_, hints)| hints.iter().any(|hint| text.contains(hint)))
        .map_or(ErrorKind::Unknown, |(kind, _)| *kind)
}

/// Wrap a boxed sub-request error with `context` and a suggestion.
pub fn to_speed_test_error(
    error: Box<dyn Error + Send + Sync>,
    context: &str,
) -> SpeedTestError {
    let kind = classify_error(error.as_ref());

    let wrapped = SpeedTestError {
        kind,
        message: format!("{}: {}", context, error),
        suggestion: None,
        source: Some(error),
    };

    match kind.suggestion() {
        Some(suggestion) => wrapped.with_suggestion(suggestion),
        None => wrapped,
    }
}

pub fn format_error_for_display(error: &SpeedTestError) -> String {
    match error.suggestion {
        Some(ref suggestion) => {
            format!("Error: {}\n\nSuggestion: {}", error.message, suggestion)
        }
        None => format!("Error: {}", error.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn io_error(kind: io::ErrorKind, message: &str) -> io::Error {
        io::Error::new(kind, message.to_string())
    }

    #[test]
    fn test_network_kinds_share_an_exit_code() {
        for kind in [ErrorKind::Network, ErrorKind::Dns, ErrorKind::Timeout] {
            assert_eq!(kind.exit_code(), exit_codes::NETWORK_ERROR);
        }
        assert_eq!(ErrorKind::Api.exit_code(), exit_codes::API_ERROR);
        assert_eq!(ErrorKind::Config.exit_code(), exit_codes::CONFIG_ERROR);
        assert_eq!(ErrorKind::Unknown.exit_code(), exit_codes::UNKNOWN_ERROR);
    }

    #[test]
    fn test_display_prefixes_kind() {
        let error = SpeedTestError::config("failed to bind 0.0.0.0:3001");
        assert_eq!(
            error.to_string(),
            "Configuration error: failed to bind 0.0.0.0:3001"
        );
    }

    #[test]
    fn test_classify_by_message() {
        let cases = [
            ("connection timed out", ErrorKind::Timeout),
            ("connection refused", ErrorKind::Network),
            ("failed to lookup address information", ErrorKind::Dns),
            ("HTTP status client error (404 Not Found)", ErrorKind::Api),
            ("something odd", ErrorKind::Unknown),
        ];
        for (message, expected) in cases {
            let error = io::Error::other(message.to_string());
            assert_eq!(classify_error(&error), expected, "{}", message);
        }
    }

    #[test]
    fn test_classify_walks_source_chain() {
        let outer = SpeedTestError::new(ErrorKind::Unknown, "identity lookup")
            .with_source(io_error(io::ErrorKind::ConnectionRefused, "connection refused"));
        assert_eq!(classify_error(&outer), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_classify_reqwest_status_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n")
                    .await;
            }
        });

        let error = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .error_for_status()
            .unwrap_err();
        assert_eq!(classify_error(&error), ErrorKind::Api);
    }

    #[test]
    fn test_to_speed_test_error_adds_context_and_suggestion() {
        let error: Box<dyn Error + Send + Sync> =
            Box::new(io_error(io::ErrorKind::ConnectionRefused, "connection refused"));

        let wrapped = to_speed_test_error(error, "identity lookup failed");

        assert_eq!(wrapped.kind, ErrorKind::Network);
        assert_eq!(wrapped.message, "identity lookup failed: connection refused");
        assert!(wrapped.source().is_some());

        let shown = format_error_for_display(&wrapped);
        assert!(shown.starts_with("Error: identity lookup failed"));
        assert!(shown.contains("\n\nSuggestion: "));
    }

    #[test]
    fn test_display_without_suggestion() {
        let error = SpeedTestError::new(ErrorKind::Unknown, "boom");
        assert_eq!(format_error_for_display(&error), "Error: boom");
    }
}
