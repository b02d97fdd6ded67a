/// Unified error types for Downloader NinjaX.
use thiserror::Error;
use tracing::warn;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum NinjaError {
    #[error("Extractor error: {0}")]
    Extractor(#[from] ExtractorError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cookie error: {0}")]
    Cookie(#[from] CookieError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NinjaError {
    /// Message that may be returned to API clients.
    ///
    /// Never contains filesystem paths, cookie values or raw child stderr.
    pub fn public_message(&self) -> String {
        match self {
            NinjaError::Media(e) => e.to_string(),
            NinjaError::Validation(e) => e.to_string(),
            NinjaError::Extractor(ExtractorError::Timeout(secs)) => {
                format!("Request timed out after {}s", secs)
            }
            NinjaError::Extractor(ExtractorError::NoOutputFile) => {
                "File not found after download".to_string()
            }
            NinjaError::Extractor(_) => "Media extractor failed".to_string(),
            NinjaError::Http(e) if e.is_timeout() => "Upstream request timed out".to_string(),
            NinjaError::Http(e) => match e.status() {
                Some(status) => format!("Upstream returned HTTP {}", status.as_u16()),
                None => "Upstream request failed".to_string(),
            },
            NinjaError::Cookie(_) | NinjaError::Config(_) | NinjaError::Io(_) | NinjaError::Json(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Errors driving the yt-dlp child process.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("Extractor binary not found: {0}")]
    NotInstalled(String),

    #[error("Failed to spawn extractor: {0}")]
    SpawnFailed(String),

    #[error("Extractor timed out after {0}s")]
    Timeout(u64),

    #[error("Extractor exited with code {code}: {stderr}")]
    Exited { code: i32, stderr: String },

    #[error("Extractor returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Extractor finished without producing a file")]
    NoOutputFile,
}

/// What the upstream site reported about the requested media.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    /// Carries one of a fixed set of reasons, never upstream text.
    #[error("Video unavailable: {0}")]
    Unavailable(&'static str),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Rate limited by upstream")]
    RateLimited,

    #[error("Media not available in this region")]
    GeoRestricted,

    #[error("Unsupported URL")]
    Unsupported,

    #[error("{0}")]
    NotFound(String),

    #[error("Requested format not available")]
    FormatUnavailable,

    /// The detail is upstream text for logs only; clients see the fixed message.
    #[error("Download failed")]
    Remote(String),

    #[error("Downloaded file exceeds the {0} byte limit")]
    TooLarge(u64),

    #[error("Upstream stopped sending data for {0}s")]
    Stalled(u64),
}

impl MediaError {
    /// Classify yt-dlp stderr output.
    pub fn from_stderr(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        let last_error = stderr
            .lines()
            .rev()
            .find(|l| l.starts_with("ERROR:"))
            .map(|l| l.trim_start_matches("ERROR:").trim().to_string());

        if lower.contains("http error 429") || lower.contains("too many requests") {
            MediaError::RateLimited
        } else if lower.contains("sign in to confirm")
            || lower.contains("login required")
            || lower.contains("cookies")
            || lower.contains("age-restricted")
        {
            MediaError::AuthRequired
        } else if lower.contains("not available in your country") || lower.contains("geo restrict") {
            MediaError::GeoRestricted
        } else if lower.contains("unsupported url") {
            MediaError::Unsupported
        } else if lower.contains("requested format is not available") {
            MediaError::FormatUnavailable
        } else if lower.contains("private video") {
            MediaError::Unavailable("private video")
        } else if lower.contains("has been removed") {
            MediaError::Unavailable("removed by the uploader")
        } else if lower.contains("does not exist") {
            MediaError::Unavailable("does not exist")
        } else if lower.contains("video unavailable") {
            MediaError::Unavailable("no longer available")
        } else {
            let detail = strip_ids(last_error.as_deref().unwrap_or("unknown error"));
            warn!(%detail, "Unrecognised extractor error");
            MediaError::Remote(detail)
        }
    }

    /// Whether retrying the same request later might succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            MediaError::RateLimited | MediaError::Remote(_) | MediaError::Stalled(_)
        )
    }
}

/// Drop the `[extractor] id:` prefix yt-dlp puts in front of messages and cap the length.
fn strip_ids(message: &str) -> String {
    let message = match message.find("]") {
        Some(idx) if message.starts_with('[') => message[idx + 1..].trim_start(),
        _ => message,
    };
    let message = match message.split_once(": ") {
        Some((head, tail)) if !head.contains(' ') && !tail.is_empty() => tail,
        _ => message,
    };
    message.chars().take(200).collect()
}

/// Input rejected by URL validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid URL format")]
    InvalidFormat,

    #[error("Access to this domain is not allowed")]
    BlockedDomain,

    #[error("URL contains invalid characters")]
    InvalidCharacters,
}

/// Errors reading a Netscape cookie export file.
#[derive(Debug, Error)]
pub enum CookieError {
    #[error("line {line_number}: {reason} (got: {content})")]
    InvalidLine {
        line_number: usize,
        /// Offending line with the value field redacted.
        content: String,
        reason: String,
    },

    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound { malformed_count: usize },
}

/// Result type alias for NinjaX operations.
pub type NinjaResult<T> = Result<T, NinjaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_private_video() {
        let err = MediaError::from_stderr("ERROR: [youtube] abc123def45: Private video. Sign in if you've been granted access");
        assert_eq!(err, MediaError::Unavailable("private video"));
        assert_eq!(err.to_string(), "Video unavailable: private video");
    }

    #[test]
    fn test_classify_rate_limited() {
        let err = MediaError::from_stderr("ERROR: unable to download webpage: HTTP Error 429: Too Many Requests");
        assert_eq!(err, MediaError::RateLimited);
        assert!(err.is_retriable());
    }

    #[test]
    fn test_classify_sign_in() {
        let err = MediaError::from_stderr("ERROR: [youtube] x: Sign in to confirm you're not a bot");
        assert_eq!(err, MediaError::AuthRequired);
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_classify_unsupported() {
        assert_eq!(
            MediaError::from_stderr("ERROR: Unsupported URL: https://example.com/"),
            MediaError::Unsupported
        );
    }

    #[test]
    fn test_classify_unknown_keeps_last_error_line() {
        let err = MediaError::from_stderr("WARNING: something\nERROR: [generic] boom: exploded");
        assert_eq!(err, MediaError::Remote("exploded".to_string()));
        assert_eq!(err.to_string(), "Download failed");
    }

    #[test]
    fn test_unrecognised_error_does_not_reach_clients() {
        let err = NinjaError::from(MediaError::from_stderr(
            "ERROR: unable to open for writing: [Errno 13] Permission denied: \
             '/srv/app/downloads/Downloader_NinjaX_1.mp4.part'",
        ));
        let message = err.public_message();
        assert_eq!(message, "Download failed");
        assert!(!message.contains("/srv"));
        assert!(!message.contains("Permission"));
    }

    #[test]
    fn test_unavailable_reason_is_fixed_text() {
        let err = MediaError::from_stderr(
            "ERROR: [youtube] abc: Video unavailable. This video has been removed by the user /home/u",
        );
        assert_eq!(err, MediaError::Unavailable("removed by the uploader"));
        assert!(!NinjaError::from(err).public_message().contains("/home"));
    }

    #[test]
    fn test_public_message_hides_stderr() {
        let err = NinjaError::Extractor(ExtractorError::Exited {
            code: 1,
            stderr: "/srv/app/downloads/secret path".into(),
        });
        assert_eq!(err.public_message(), "Media extractor failed");

        let io = NinjaError::Io(std::io::Error::new(std::io::ErrorKind::Other, "/etc/passwd"));
        assert_eq!(io.public_message(), "Internal server error");
    }

    #[test]
    fn test_public_message_for_validation() {
        let err = NinjaError::from(ValidationError::BlockedDomain);
        assert_eq!(err.public_message(), "Access to this domain is not allowed");
    }
}
