//! Site adapters. Registry, adapter trait, shared fetch context, fetch pool, and the two adapters.

mod client;
mod error;
mod pool;
mod registry;
mod text;

pub mod ao3;
pub mod ffn;

pub use client::{HttpClient, HttpClientBuilder, PageFetcher, DEFAULT_TIMEOUT_SECS};
pub use error::{FetchFailure, RetrievalError};
pub use pool::{DEFAULT_MAX_CONCURRENT, MAX_CONCURRENT_LIMIT};
pub use registry::{AdapterRegistry, SiteSignature, SITE_SIGNATURES};

use crate::model::{Chapter, ChapterRange, Series, Site, StoryReference, Work};
use scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything an adapter needs for one retrieval call.
pub struct FetchContext<'a> {
    pub fetcher: &'a dyn PageFetcher,
    pub cancel: &'a CancelFlag,
    /// Upper bound on concurrent page fetches, clamped to 1..=8 by the pool.
    pub max_concurrent: usize,
}

impl<'a> FetchContext<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, cancel: &'a CancelFlag) -> Self {
        Self {
            fetcher,
            cancel,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), RetrievalError> {
        if self.cancel.is_cancelled() {
            Err(RetrievalError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Fetch one page, honouring cancellation before the request goes out.
    pub(crate) fn get(&self, url: &str) -> Result<String, RetrievalError> {
        self.check_cancelled()?;
        tracing::debug!(url, "fetching page");
        self.fetcher.fetch(url)
    }
}

/// Capability interface implemented by every site adapter.
///
/// Adapters are stateless: all per-call state lives in the [FetchContext] and the
/// [StoryReference]. Errors carry the offending URL and, where one applies, the chapter index.
pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> Site;

    /// Build a reference from a URL already matched to this adapter's site.
    fn parse_reference(&self, url: &str) -> Result<StoryReference, RetrievalError>;

    /// Fetch exactly the chapter the reference points at.
    fn fetch_single_chapter(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
    ) -> Result<Chapter, RetrievalError>;

    /// Fetch `range` inclusive, ascending by index. Any failing page fails the whole range.
    fn fetch_chapter_range(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
        range: ChapterRange,
    ) -> Result<Vec<Chapter>, RetrievalError>;

    /// Discover the chapter list and fetch all of it.
    fn fetch_entire_work(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
    ) -> Result<Work, RetrievalError>;

    /// Discover the works of a series and fetch each in full.
    fn fetch_series(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
    ) -> Result<Series, RetrievalError>;
}

impl Site {
    /// Fresh adapter for this site.
    pub fn adapter(self) -> Box<dyn SiteAdapter> {
        match self {
            Site::FanFictionNet => Box::new(ffn::FanFictionNet),
            Site::ArchiveOfOurOwn => Box::new(ao3::ArchiveOfOurOwn),
        }
    }
}

/// Parse a CSS selector, mapping failure to a parse error instead of panicking.
pub(crate) fn parse_selector(sel: &str) -> Result<Selector, RetrievalError> {
    Selector::parse(sel)
        .map_err(|e| RetrievalError::parse("", None, format!("invalid selector {:?}: {}", sel, e)))
}

/// Trimmed text of the first element matching `sel`, if any and non-empty.
pub(crate) fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

/// Whitespace-collapsed text of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) use text::html_to_text;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_clones_share_state() {
        let a = CancelFlag::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn site_adapter_matches_site() {
        assert_eq!(Site::FanFictionNet.adapter().site(), Site::FanFictionNet);
        assert_eq!(Site::ArchiveOfOurOwn.adapter().site(), Site::ArchiveOfOurOwn);
    }

    #[test]
    fn element_text_collapses_whitespace() -> Result<(), RetrievalError> {
        let doc = Html::parse_document("<h2 class=\"title\">\n   The  Long\n Road </h2>");
        let sel = parse_selector("h2.title")?;
        assert_eq!(first_text(&doc, &sel).as_deref(), Some("The Long Road"));
        Ok(())
    }
}
