//! Retrieval use-cases: resolve the URL, let the site adapter fetch, render plain text, package.

use crate::adapter::{
    AdapterRegistry, CancelFlag, FetchContext, PageFetcher, RetrievalError, DEFAULT_MAX_CONCURRENT,
};
use crate::model::{
    ChapterRange, RetrievalKind, RetrievalRequest, RetrievalResult, TEXT_CONTENT_TYPE,
};
use crate::render::{
    render_chapters, render_series, render_single_chapter, render_work, text_filename,
};
use std::sync::Arc;

/// Entry point for callers. Holds only shared, immutable state, so one instance can serve
/// concurrent calls from several threads.
#[derive(Clone)]
pub struct FanficRetrievalService<'r> {
    registry: &'r AdapterRegistry,
    fetcher: Arc<dyn PageFetcher>,
    max_concurrent: usize,
}

impl<'r> FanficRetrievalService<'r> {
    pub fn new(registry: &'r AdapterRegistry, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            registry,
            fetcher,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Bound on concurrent page fetches per call (clamped to 1..=8 when used).
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn get_single_chapter(&self, url: &str) -> Result<RetrievalResult, RetrievalError> {
        self.retrieve(&RetrievalRequest::new(url, RetrievalKind::SingleChapter))
    }

    /// Chapters `start..=end`. Bounds are checked before the URL is even resolved.
    pub fn get_multiple_chapters(
        &self,
        url: &str,
        start: u32,
        end: u32,
    ) -> Result<RetrievalResult, RetrievalError> {
        self.retrieve(&RetrievalRequest::new(
            url,
            RetrievalKind::ChapterRange { start, end },
        ))
    }

    pub fn get_entire_fanfic(&self, url: &str) -> Result<RetrievalResult, RetrievalError> {
        self.retrieve(&RetrievalRequest::new(url, RetrievalKind::EntireFanfic))
    }

    pub fn get_entire_series(&self, url: &str) -> Result<RetrievalResult, RetrievalError> {
        self.retrieve(&RetrievalRequest::new(url, RetrievalKind::EntireSeries))
    }

    pub fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResult, RetrievalError> {
        self.retrieve_with_cancel(request, &CancelFlag::new())
    }

    /// Like [Self::retrieve], but stops with [RetrievalError::Cancelled] once `cancel` is set.
    pub fn retrieve_with_cancel(
        &self,
        request: &RetrievalRequest,
        cancel: &CancelFlag,
    ) -> Result<RetrievalResult, RetrievalError> {
        let span = tracing::info_span!("retrieve", url = %request.url, kind = ?request.kind);
        let _guard = span.enter();
        let result = self.run(request, cancel);
        match &result {
            Ok(r) => tracing::info!(filename = %r.filename, bytes = r.bytes.len(), "retrieval complete"),
            Err(RetrievalError::Cancelled) => tracing::info!("retrieval cancelled"),
            Err(e) => tracing::warn!(error = %e, "retrieval failed"),
        }
        result
    }

    fn run(
        &self,
        request: &RetrievalRequest,
        cancel: &CancelFlag,
    ) -> Result<RetrievalResult, RetrievalError> {
        let range = match request.kind {
            RetrievalKind::ChapterRange { start, end } => Some(ChapterRange::new(start, end)?),
            _ => None,
        };
        let (adapter, story) = self.registry.resolve_reference(&request.url)?;
        let ctx = FetchContext::new(self.fetcher.as_ref(), cancel).max_concurrent(self.max_concurrent);
        tracing::info!(site = %story.site, story_id = %story.story_id, "starting retrieval");

        let (text, filename) = match (request.kind, range) {
            (RetrievalKind::ChapterRange { .. }, Some(range)) => {
                let chapters = adapter.fetch_chapter_range(&ctx, &story, range)?;
                let name = format!(
                    "{}-chapters-{}-{}",
                    story.story_id,
                    range.start(),
                    range.end()
                );
                (render_chapters(&chapters), text_filename(&name, &story.story_id))
            }
            (RetrievalKind::EntireFanfic, _) => {
                let work = adapter.fetch_entire_work(&ctx, &story)?;
                let name = work.title.clone().unwrap_or_default();
                (render_work(&work), text_filename(&name, &story.story_id))
            }
            (RetrievalKind::EntireSeries, _) => {
                let series = adapter.fetch_series(&ctx, &story)?;
                let name = series.title.clone().unwrap_or_default();
                let fallback = format!("series-{}", story.story_id);
                (render_series(&series), text_filename(&name, &fallback))
            }
            _ => {
                let chapter = adapter.fetch_single_chapter(&ctx, &story)?;
                let name = chapter.title.clone().unwrap_or_default();
                (render_single_chapter(&chapter), text_filename(&name, &story.story_id))
            }
        };
        ctx.check_cancelled()?;
        Ok(RetrievalResult {
            bytes: text.into_bytes(),
            filename,
            content_type: TEXT_CONTENT_TYPE,
        })
    }
}
