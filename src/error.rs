use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScraperError>;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid search target: {0}")]
    InvalidTarget(String),

    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    /// Error envelope returned by the ads archive API; the message is kept verbatim.
    #[error("{0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ScraperError {
    /// Failures of the browser or the network. These end the current request
    /// and are reported on the result; everything else is a caller mistake.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ScraperError::BrowserLaunch(_)
                | ScraperError::Navigation(_)
                | ScraperError::Network(_)
                | ScraperError::Http { .. }
                | ScraperError::Api(_)
                | ScraperError::Parse(_)
        )
    }
}

impl From<ureq::Error> for ScraperError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => ScraperError::Http {
                status,
                message: String::new(),
            },
            other => ScraperError::Network(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ScraperError {
    fn from(err: serde_json::Error) -> Self {
        ScraperError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for ScraperError {
    fn from(err: std::io::Error) -> Self {
        ScraperError::Io(err.to_string())
    }
}
