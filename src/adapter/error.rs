//! Shared error type for the registry, the site adapters and the retrieval service.

use crate::model::Site;
use thiserror::Error;

/// Why a page could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    Timeout,
    Connect,
    /// Non-success HTTP status.
    Status(u16),
    /// The response arrived but its body could not be read as text.
    Body,
    Other(String),
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::Timeout => write!(f, "request timed out"),
            FetchFailure::Connect => write!(f, "could not connect"),
            FetchFailure::Status(code) => write!(f, "HTTP {}", code),
            FetchFailure::Body => write!(f, "failed to read response body"),
            FetchFailure::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// Every way a retrieval can fail. Nothing is retried and nothing is partially returned.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Site not supported: '{host}'. Supported: fanfiction.net, archiveofourown.org.")]
    SiteNotSupported { host: String },

    #[error("Invalid chapter range {start}-{end}: start must be at least 1 and not greater than end.")]
    InvalidRange { start: u32, end: u32 },

    #[error("{site} does not support {operation}.")]
    UnsupportedOperation {
        site: Site,
        operation: &'static str,
    },

    #[error("Could not fetch {}{url}: {kind}", chapter_prefix(.index))]
    Fetch {
        url: String,
        /// Chapter (or work) index the fetch belonged to, when known.
        index: Option<u32>,
        kind: FetchFailure,
    },

    #[error("Could not parse {}{url}: {message}", chapter_prefix(.index))]
    Parse {
        url: String,
        index: Option<u32>,
        message: String,
    },

    #[error("Series work {position} ({url}) failed: {source}")]
    SeriesWork {
        /// 1-based position of the work in the series.
        position: u32,
        url: String,
        #[source]
        source: Box<RetrievalError>,
    },

    #[error("Retrieval cancelled.")]
    Cancelled,
}

fn chapter_prefix(index: &Option<u32>) -> String {
    match index {
        Some(i) => format!("chapter {} at ", i),
        None => String::new(),
    }
}

impl RetrievalError {
    pub(crate) fn parse(url: &str, index: Option<u32>, message: impl Into<String>) -> Self {
        RetrievalError::Parse {
            url: url.to_string(),
            index,
            message: message.into(),
        }
    }

    /// Attach a chapter index to a fetch or parse error that does not carry one yet.
    pub(crate) fn at_index(self, i: u32) -> Self {
        match self {
            RetrievalError::Fetch {
                url,
                index: None,
                kind,
            } => RetrievalError::Fetch {
                url,
                index: Some(i),
                kind,
            },
            RetrievalError::Parse {
                url,
                index: None,
                message,
            } => RetrievalError::Parse {
                url,
                index: Some(i),
                message,
            },
            other => other,
        }
    }

    /// Wrap a failure of the `position`-th work of a series. Cancellation passes through as is.
    pub(crate) fn in_series_work(self, position: u32, url: &str) -> Self {
        match self {
            RetrievalError::Cancelled => RetrievalError::Cancelled,
            other => RetrievalError::SeriesWork {
                position,
                url: url.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Index of the chapter that failed, if the error is tied to one.
    pub fn index(&self) -> Option<u32> {
        match self {
            RetrievalError::Fetch { index, .. } | RetrievalError::Parse { index, .. } => *index,
            RetrievalError::SeriesWork { source, .. } => source.index(),
            _ => None,
        }
    }

    /// True when the caller sent something we cannot serve, as opposed to an upstream failure.
    pub fn is_client_error(&self) -> bool {
        if let RetrievalError::SeriesWork { source, .. } = self {
            return source.is_client_error();
        }
        matches!(
            self,
            RetrievalError::InvalidUrl { .. }
                | RetrievalError::SiteNotSupported { .. }
                | RetrievalError::InvalidRange { .. }
                | RetrievalError::UnsupportedOperation { .. }
        )
    }

    /// HTTP-style status an outer layer can answer with.
    pub fn status_hint(&self) -> u16 {
        match self {
            RetrievalError::InvalidUrl { .. }
            | RetrievalError::InvalidRange { .. }
            | RetrievalError::UnsupportedOperation { .. } => 400,
            RetrievalError::SiteNotSupported { .. } => 404,
            RetrievalError::Fetch { .. } => 502,
            RetrievalError::Parse { .. } => 500,
            RetrievalError::SeriesWork { source, .. } => source.status_hint(),
            RetrievalError::Cancelled => 499,
        }
    }
}
