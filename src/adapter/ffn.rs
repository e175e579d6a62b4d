//! FanFiction.Net adapter. Chapters are numbered pages `/s/{story}/{n}/`; the chapter count and
//! chapter titles come from the `#chap_select` dropdown on any chapter page.

use crate::adapter::error::RetrievalError;
use crate::adapter::pool::fetch_ordered;
use crate::adapter::{
    element_text, first_text, html_to_text, parse_selector, FetchContext, SiteAdapter,
};
use crate::model::{Chapter, ChapterRange, Series, Site, StoryReference, Work};
use reqwest::Url;
use scraper::Html;

const FFN_BASE: &str = "https://www.fanfiction.net";

/// Stateless FanFiction.Net adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanFictionNet;

/// Everything one chapter page yields.
#[derive(Debug)]
struct ChapterPage {
    chapter: Chapter,
    chapter_count: u32,
    story_title: Option<String>,
    author: Option<String>,
}

fn chapter_url(story_id: &str, n: u32) -> String {
    format!("{}/s/{}/{}/", FFN_BASE, story_id, n)
}

/// "3. The Title" -> "The Title". Leaves titles without the numeric prefix alone.
fn strip_number_prefix(title: &str, n: u32) -> String {
    let prefix = format!("{}. ", n);
    title
        .strip_prefix(&prefix)
        .unwrap_or(title)
        .trim()
        .to_string()
}

/// Parse one chapter page. `index` is the chapter the page was requested for.
fn parse_chapter_page(html: &str, index: u32, url: &str) -> Result<ChapterPage, RetrievalError> {
    let doc = Html::parse_document(html);

    let body_sel = parse_selector("#storytext")?;
    let Some(body_el) = doc.select(&body_sel).next() else {
        let warning_sel = parse_selector("span.gui_warning")?;
        let message = match first_text(&doc, &warning_sel) {
            Some(w) => format!("site reported: {}", w),
            None => "missing #storytext (not a story page, or layout changed)".to_string(),
        };
        return Err(RetrievalError::parse(url, Some(index), message));
    };
    let body = html_to_text(body_el);
    if body.is_empty() {
        return Err(RetrievalError::parse(url, Some(index), "chapter has no text"));
    }

    // The dropdown appears twice (top and bottom); only the first one counts.
    let select_sel = parse_selector("select#chap_select")?;
    let option_sel = parse_selector("option")?;
    let (chapter_count, title) = match doc.select(&select_sel).next() {
        Some(select) => {
            let options: Vec<_> = select.select(&option_sel).collect();
            let wanted = index.to_string();
            let title = options
                .iter()
                .find(|o| o.value().attr("value") == Some(wanted.as_str()))
                .map(|o| strip_number_prefix(&element_text(*o), index))
                .filter(|t| !t.is_empty());
            (options.len() as u32, title)
        }
        None => (1, None),
    };
    if index > chapter_count {
        return Err(RetrievalError::parse(
            url,
            Some(index),
            format!("story has only {} chapter(s)", chapter_count),
        ));
    }

    let title_sel = parse_selector("#profile_top b.xcontrast_txt")?;
    let author_sel = parse_selector("#profile_top a.xcontrast_txt")?;
    Ok(ChapterPage {
        chapter: Chapter { index, title, body },
        chapter_count,
        story_title: first_text(&doc, &title_sel),
        author: first_text(&doc, &author_sel),
    })
}

impl FanFictionNet {
    fn fetch_page(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
        n: u32,
    ) -> Result<ChapterPage, RetrievalError> {
        let url = chapter_url(&story.story_id, n);
        let html = ctx.get(&url).map_err(|e| e.at_index(n))?;
        parse_chapter_page(&html, n, &url)
    }
}

impl SiteAdapter for FanFictionNet {
    fn site(&self) -> Site {
        Site::FanFictionNet
    }

    fn parse_reference(&self, url: &str) -> Result<StoryReference, RetrievalError> {
        let invalid = |reason: &str| RetrievalError::InvalidUrl {
            input: url.to_string(),
            reason: reason.to_string(),
        };
        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let mut segments = parsed
            .path_segments()
            .ok_or_else(|| invalid("URL has no path"))?
            .filter(|s| !s.is_empty());
        if segments.next() != Some("s") {
            return Err(invalid(
                "expected a story URL like https://www.fanfiction.net/s/12345/1/",
            ));
        }
        let story_id = segments
            .next()
            .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| invalid("missing numeric story id after /s/"))?;
        let chapter_number = segments
            .next()
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(1);
        Ok(StoryReference {
            url: url.to_string(),
            site: Site::FanFictionNet,
            story_id: story_id.to_string(),
            chapter_number: Some(chapter_number),
            chapter_id: None,
            is_series: false,
        })
    }

    fn fetch_single_chapter(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
    ) -> Result<Chapter, RetrievalError> {
        let n = story.chapter_number.unwrap_or(1);
        Ok(self.fetch_page(ctx, story, n)?.chapter)
    }

    fn fetch_chapter_range(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
        range: ChapterRange,
    ) -> Result<Vec<Chapter>, RetrievalError> {
        let pages = fetch_ordered(range.indices(), ctx, |n| self.fetch_page(ctx, story, n))?;
        Ok(pages.into_iter().map(|p| p.chapter).collect())
    }

    fn fetch_entire_work(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
    ) -> Result<Work, RetrievalError> {
        // Chapter 1 tells us how many chapters there are.
        let first = self.fetch_page(ctx, story, 1)?;
        let count = first.chapter_count;
        tracing::info!(story_id = %story.story_id, chapters = count, "discovered chapter list");
        let rest = fetch_ordered(2..=count, ctx, |n| self.fetch_page(ctx, story, n))?;

        let mut chapters = Vec::with_capacity(count as usize);
        chapters.push(first.chapter);
        chapters.extend(rest.into_iter().map(|p| p.chapter));
        Ok(Work {
            reference: story.clone(),
            title: first.story_title,
            author: first.author,
            chapters,
        })
    }

    fn fetch_series(
        &self,
        _ctx: &FetchContext<'_>,
        _story: &StoryReference,
    ) -> Result<Series, RetrievalError> {
        Err(RetrievalError::UnsupportedOperation {
            site: Site::FanFictionNet,
            operation: "series downloads",
        })
    }
}
