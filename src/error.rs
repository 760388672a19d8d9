use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// All different error types this crate uses.
#[derive(Error, Debug)]
pub enum ShuiyuanError {
    /// Received a non success Http response.
    #[error("Expected a 2xx Success but got: {status} for {url}")]
    NoHttpSuccess {
        /// Status code of the response.
        status: StatusCode,
        /// The requested url.
        url: Url,
    },
    /// Failed to get a response.
    #[error("Request failed: {error}")]
    HttpRequestFailure {
        /// The reqwest error.
        error: reqwest::Error,
    },
    /// The topic or the post inside the topic no longer exists.
    #[error("Post {post_number} of topic {topic_id} does not exist")]
    MissingResource { topic_id: u64, post_number: u64 },
    /// A local asset the run depends on could not be loaded.
    #[error("Missing {kind} at {}", path.display())]
    ResourceNotFound {
        /// What the file was supposed to provide, e.g. `font`.
        kind: &'static str,
        /// Where it was looked up.
        path: PathBuf,
    },
    /// The response was valid json but not in the expected shape.
    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: Url, reason: String },
}

impl ShuiyuanError {
    /// Whether a response with this status means the topic is gone rather
    /// than the request having failed.
    ///
    /// `403` is not among them: an expired session or a hidden topic must
    /// not shrink the corpus unnoticed.
    pub fn is_missing_status(status: StatusCode) -> bool {
        status == StatusCode::NOT_FOUND || status == StatusCode::GONE
    }

    /// Whether `err` reports a post that no longer exists.
    pub fn is_missing_resource(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<ShuiyuanError>(),
            Some(ShuiyuanError::MissingResource { .. })
        )
    }
}

impl From<reqwest::Error> for ShuiyuanError {
    fn from(error: reqwest::Error) -> Self {
        ShuiyuanError::HttpRequestFailure { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_statuses() {
        assert!(ShuiyuanError::is_missing_status(StatusCode::NOT_FOUND));
        assert!(ShuiyuanError::is_missing_status(StatusCode::GONE));
        assert!(!ShuiyuanError::is_missing_status(StatusCode::FORBIDDEN));
        assert!(!ShuiyuanError::is_missing_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn detect_missing_resource() {
        let missing: anyhow::Error = ShuiyuanError::MissingResource {
            topic_id: 1,
            post_number: 2,
        }
        .into();
        assert!(ShuiyuanError::is_missing_resource(&missing));
        assert!(!ShuiyuanError::is_missing_resource(&anyhow::anyhow!("boom")));
    }
}
