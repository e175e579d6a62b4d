//! fanficdl: fetch fan fiction from FanFiction.Net and Archive of Our Own as plain text.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod model;
pub mod render;
pub mod service;

#[cfg(test)]
mod testing;

// Re-exports for CLI and consumers.
pub use adapter::{
    AdapterRegistry, CancelFlag, FetchContext, FetchFailure, HttpClient, HttpClientBuilder,
    PageFetcher, RetrievalError, SiteAdapter,
};
pub use model::{
    Chapter, ChapterRange, RetrievalKind, RetrievalRequest, RetrievalResult, Series, Site,
    StoryReference, Work,
};
pub use service::FanficRetrievalService;
