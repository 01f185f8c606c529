/// All errors that can occur while fetching a profile page.
///
/// These never escape [`crate::OpggClient::scrape_player`]; they are folded into a
/// failed [`crate::model::PlayerRecord`] and kept for diagnostics.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The configured base URL cannot be turned into a profile URL.
    #[error("invalid profile url {base}: {reason}")]
    InvalidUrl { base: String, reason: String },

    /// HTTP request failed (network, DNS, TLS, timeout, too many redirects).
    #[error("http request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    /// Server returned a non-success HTTP status code.
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Failed to read the response body as text.
    #[error("failed to read response body from {url}: {source}")]
    ResponseBody {
        url: String,
        source: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
