use thiserror::Error;

/// Type alias for Result with AutomationError
pub type Result<T> = std::result::Result<T, AutomationError>;

/// Error types shared by the Gmail and Sheets workflows
#[derive(Error, Debug)]
pub enum AutomationError {
    /// Google API returned an error that fits no other variant
    #[error("API error: {0}")]
    ApiError(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Response was missing a field we rely on
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Label lookup or creation failed
    #[error("Label error: {0}")]
    LabelError(String),

    /// Spreadsheet read or write failed
    #[error("Sheet error: {0}")]
    SheetError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AutomationError {
    /// The remote API asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AutomationError::RateLimitExceeded { .. })
    }

    /// Check if the error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AutomationError::RateLimitExceeded { .. }
                | AutomationError::ServerError { .. }
                | AutomationError::NetworkError(_)
        )
    }

    /// Convert an error from the Sheets hub.
    ///
    /// Both hubs are generated from the same client library, so the
    /// classification is shared with the `From` impl for Gmail errors.
    pub fn from_sheets(error: google_sheets4::Error) -> Self {
        match error {
            google_sheets4::Error::Failure(ref response) => {
                classify_status(response.status(), parse_retry_after_header(response))
            }
            google_sheets4::Error::BadRequest(ref err) => {
                AutomationError::BadRequest(format!("{}", err))
            }
            google_sheets4::Error::HttpError(ref err) => {
                AutomationError::NetworkError(format!("Connection error: {}", err))
            }
            google_sheets4::Error::Io(err) => AutomationError::NetworkError(err.to_string()),
            _ => AutomationError::ApiError(error.to_string()),
        }
    }
}

/// Parse the Retry-After header from an HTTP response
///
/// The Retry-After header can be specified in two formats:
/// 1. Delay-seconds: An integer indicating seconds to wait (e.g., "120")
/// 2. HTTP-date: An HTTP date format (e.g., "Wed, 21 Oct 2015 07:28:00 GMT")
///
/// Returns the number of seconds to wait. If the header is missing or invalid,
/// returns a default of 5 seconds.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    if let Some(retry_after_value) = response.headers().get("retry-after") {
        if let Ok(retry_after_str) = retry_after_value.to_str() {
            if let Ok(seconds) = retry_after_str.parse::<u64>() {
                return seconds;
            }

            if let Ok(http_date) = httpdate::parse_http_date(retry_after_str) {
                let now = std::time::SystemTime::now();
                if let Ok(duration) = http_date.duration_since(now) {
                    return duration.as_secs();
                }
            }
        }
    }

    DEFAULT_RETRY_AFTER
}

/// Map a non-success HTTP status onto the error taxonomy
fn classify_status(status: hyper::StatusCode, retry_after: u64) -> AutomationError {
    let status_code = status.as_u16();
    let message = format!(
        "HTTP {}: {}",
        status_code,
        status.canonical_reason().unwrap_or("Unknown")
    );

    match status_code {
        429 => AutomationError::RateLimitExceeded { retry_after },
        404 => AutomationError::NotFound("Resource not found".to_string()),
        400 => AutomationError::BadRequest(message),
        403 => AutomationError::Forbidden(message),
        500..=599 => AutomationError::ServerError {
            status: status_code,
            message,
        },
        _ => AutomationError::ApiError(message),
    }
}

impl From<google_gmail1::Error> for AutomationError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                classify_status(response.status(), parse_retry_after_header(response))
            }
            google_gmail1::Error::BadRequest(ref err) => {
                AutomationError::BadRequest(format!("{}", err))
            }
            google_gmail1::Error::HttpError(ref err) => {
                AutomationError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => AutomationError::NetworkError(err.to_string()),
            _ => AutomationError::ApiError(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_only_rate_limited_variant() {
        assert!(AutomationError::RateLimitExceeded { retry_after: 5 }.is_rate_limited());
        assert!(!AutomationError::ServerError {
            status: 503,
            message: "Service unavailable".to_string(),
        }
        .is_rate_limited());
        assert!(!AutomationError::NotFound("msg".to_string()).is_rate_limited());
    }

    #[test]
    fn test_transient_errors() {
        let rate_limit = AutomationError::RateLimitExceeded { retry_after: 5 };
        assert!(rate_limit.is_transient());

        let network_error = AutomationError::NetworkError("Connection timeout".to_string());
        assert!(network_error.is_transient());
    }

    #[test]
    fn test_non_transient_errors() {
        assert!(!AutomationError::BadRequest("Invalid query".to_string()).is_transient());
        assert!(!AutomationError::NotFound("msg123".to_string()).is_transient());
        assert!(!AutomationError::SheetError("unreadable".to_string()).is_transient());
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(hyper::StatusCode::TOO_MANY_REQUESTS, 7),
            AutomationError::RateLimitExceeded { retry_after: 7 }
        ));
        assert!(matches!(
            classify_status(hyper::StatusCode::NOT_FOUND, 5),
            AutomationError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(hyper::StatusCode::FORBIDDEN, 5),
            AutomationError::Forbidden(_)
        ));
        assert!(matches!(
            classify_status(hyper::StatusCode::BAD_GATEWAY, 5),
            AutomationError::ServerError { status: 502, .. }
        ));
        assert!(matches!(
            classify_status(hyper::StatusCode::CONFLICT, 5),
            AutomationError::ApiError(_)
        ));
    }

    #[test]
    fn test_error_display() {
        let error = AutomationError::RateLimitExceeded { retry_after: 10 };
        let display = format!("{}", error);
        assert!(display.contains("Rate limit exceeded"));
        assert!(display.contains("10 seconds"));

        let sheet_error = AutomationError::SheetError("range not found".to_string());
        assert_eq!(sheet_error.to_string(), "Sheet error: range not found");
    }

    #[test]
    fn test_parse_retry_after_header_integer() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("120"),
        );

        assert_eq!(parse_retry_after_header(&response), 120);
    }

    #[test]
    fn test_parse_retry_after_header_missing() {
        let response = hyper::Response::builder().status(429).body(()).unwrap();
        assert_eq!(parse_retry_after_header(&response), 5);
    }

    #[test]
    fn test_parse_retry_after_header_invalid() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("invalid"),
        );

        assert_eq!(parse_retry_after_header(&response), 5);
    }

    #[test]
    fn test_parse_retry_after_header_http_date() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();

        let future_time = std::time::SystemTime::now() + std::time::Duration::from_secs(60);
        let http_date = httpdate::fmt_http_date(future_time);

        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_str(&http_date).unwrap(),
        );

        let retry_after = parse_retry_after_header(&response);
        assert!(
            (58..=61).contains(&retry_after),
            "Expected ~60, got {}",
            retry_after
        );
    }

    #[test]
    fn test_parse_retry_after_header_past_http_date() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();

        let past_time = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
        let http_date = httpdate::fmt_http_date(past_time);

        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_str(&http_date).unwrap(),
        );

        // Past dates fall back to the default
        assert_eq!(parse_retry_after_header(&response), 5);
    }
}
