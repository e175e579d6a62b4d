//! Archive of Our Own adapter. Chapters are addressed by opaque chapter IDs, so the chapter list
//! comes from the work's `/navigate` index. Series listings are paginated.
//!
//! Every work page is requested with `view_adult=true` so the adult-content interstitial is skipped.

use crate::adapter::error::RetrievalError;
use crate::adapter::pool::fetch_ordered;
use crate::adapter::{
    element_text, first_text, html_to_text, parse_selector, FetchContext, SiteAdapter,
};
use crate::model::{Chapter, ChapterRange, Series, Site, StoryReference, Work};
use reqwest::Url;
use scraper::Html;
use std::collections::HashSet;

const AO3_BASE: &str = "https://archiveofourown.org";
/// Guard against pagination loops on a malformed listing.
const MAX_SERIES_PAGES: usize = 100;

/// Stateless Archive of Our Own adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveOfOurOwn;

/// One entry of the navigation index, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TocEntry {
    chapter_id: String,
    title: Option<String>,
}

#[derive(Debug)]
struct ChapterPage {
    chapter: Chapter,
    work_title: Option<String>,
    author: Option<String>,
}

fn work_url(work_id: &str) -> String {
    format!("{}/works/{}?view_adult=true", AO3_BASE, work_id)
}

fn chapter_url(work_id: &str, chapter_id: &str) -> String {
    format!(
        "{}/works/{}/chapters/{}?view_adult=true",
        AO3_BASE, work_id, chapter_id
    )
}

fn navigate_url(work_id: &str) -> String {
    format!("{}/works/{}/navigate?view_adult=true", AO3_BASE, work_id)
}

fn series_url(series_id: &str) -> String {
    format!("{}/series/{}", AO3_BASE, series_id)
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Numeric id following `kind` in an AO3 path such as `/works/123` or `/series/9?page=2`.
fn id_after(href: &str, kind: &str) -> Option<String> {
    let path = href.split(|c| c == '?' || c == '#').next()?;
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments.find(|s| *s == kind)?;
    segments
        .next()
        .filter(|id| is_numeric_id(id))
        .map(String::from)
}

/// "Chapter 2: Homecoming" -> Some("Homecoming"); "Chapter 2" -> None; other titles kept.
fn chapter_name(title: &str, n: u32) -> Option<String> {
    let prefix = format!("Chapter {}", n);
    let rest = match title.strip_prefix(&prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with(':') => rest.trim_start_matches(':'),
        _ => title,
    };
    Some(rest.trim().to_string()).filter(|s| !s.is_empty())
}

/// Navigation index: `ol.chapter.index li a`, each linking to `/works/{id}/chapters/{cid}`.
fn parse_navigation(html: &str, url: &str) -> Result<Vec<TocEntry>, RetrievalError> {
    let doc = Html::parse_document(html);
    let link_sel = parse_selector("ol.chapter.index li a")?;
    let mut toc = Vec::new();
    for a in doc.select(&link_sel) {
        let Some(chapter_id) = a.value().attr("href").and_then(|h| id_after(h, "chapters")) else {
            continue;
        };
        let n = toc.len() as u32 + 1;
        // Untitled chapters are listed as "N. Chapter N".
        let text = element_text(a);
        let title = chapter_name(text.strip_prefix(&format!("{}. ", n)).unwrap_or(&text), n);
        toc.push(TocEntry { chapter_id, title });
    }
    if toc.is_empty() {
        return Err(RetrievalError::parse(
            url,
            None,
            "no chapters in navigation index (work deleted, restricted, or layout changed)",
        ));
    }
    Ok(toc)
}

/// Position of the selected chapter in the chapter dropdown, if the page has one.
fn selected_position(doc: &Html) -> Result<Option<u32>, RetrievalError> {
    let option_sel = parse_selector("select#selected_id option")?;
    Ok(doc
        .select(&option_sel)
        .position(|o| o.value().attr("selected").is_some())
        .map(|p| p as u32 + 1))
}

/// Parse a work or chapter page. `index` of `None` means "work out the position from the page".
fn parse_chapter_page(
    html: &str,
    index: Option<u32>,
    url: &str,
) -> Result<ChapterPage, RetrievalError> {
    let doc = Html::parse_document(html);
    let index = match index {
        Some(i) => i,
        None => selected_position(&doc)?.unwrap_or(1),
    };

    let body_sel = parse_selector("#chapters div.userstuff")?;
    let Some(body_el) = doc.select(&body_sel).next() else {
        return Err(RetrievalError::parse(
            url,
            Some(index),
            "missing #chapters content (work may be restricted to registered users, or layout changed)",
        ));
    };
    let body = html_to_text(body_el);
    if body.is_empty() {
        return Err(RetrievalError::parse(url, Some(index), "chapter has no text"));
    }

    let chapter_title_sel = parse_selector("#chapters div.chapter.preface h3.title")?;
    let work_title_sel = parse_selector("h2.title.heading")?;
    let author_sel = parse_selector("a[rel=\"author\"]")?;
    let title = first_text(&doc, &chapter_title_sel).and_then(|t| chapter_name(&t, index));
    Ok(ChapterPage {
        chapter: Chapter { index, title, body },
        work_title: first_text(&doc, &work_title_sel),
        author: first_text(&doc, &author_sel),
    })
}

/// One page of a series listing: (series title, work ids in order, next page URL).
fn parse_series_page(
    html: &str,
    url: &str,
) -> Result<(Option<String>, Vec<String>, Option<String>), RetrievalError> {
    let doc = Html::parse_document(html);
    let title_sel = parse_selector("#main h2.heading")?;
    let work_link_sel = parse_selector("ul.series li.work h4.heading a")?;
    let next_sel = parse_selector("ol.pagination li.next a")?;

    let mut works = Vec::new();
    for a in doc.select(&work_link_sel) {
        if let Some(id) = a.value().attr("href").and_then(|h| id_after(h, "works")) {
            if !works.contains(&id) {
                works.push(id);
            }
        }
    }
    let base = Url::parse(url).map_err(|e| RetrievalError::parse(url, None, e.to_string()))?;
    let next = doc
        .select(&next_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .filter(|h| !h.is_empty() && *h != "#")
        .and_then(|h| base.join(h).ok())
        .map(|u| u.to_string());
    Ok((first_text(&doc, &title_sel), works, next))
}

/// Series the work belongs to, from `dd.series` in the work meta.
fn parse_work_series(html: &str) -> Result<Option<String>, RetrievalError> {
    let doc = Html::parse_document(html);
    let link_sel = parse_selector("dd.series span.position a")?;
    Ok(doc
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|h| id_after(h, "series")))
}

impl ArchiveOfOurOwn {
    fn fetch_toc(
        &self,
        ctx: &FetchContext<'_>,
        work_id: &str,
    ) -> Result<Vec<TocEntry>, RetrievalError> {
        let url = navigate_url(work_id);
        let html = ctx.get(&url)?;
        parse_navigation(&html, &url)
    }

    /// Fetch chapter `n` (1-based) listed at `toc[n - 1]`.
    fn fetch_listed_chapter(
        &self,
        ctx: &FetchContext<'_>,
        work_id: &str,
        toc: &[TocEntry],
        n: u32,
    ) -> Result<ChapterPage, RetrievalError> {
        let entry = toc.get(n as usize - 1).ok_or_else(|| {
            RetrievalError::parse(
                &navigate_url(work_id),
                Some(n),
                format!("work has only {} chapter(s)", toc.len()),
            )
        })?;
        let url = chapter_url(work_id, &entry.chapter_id);
        let html = ctx.get(&url).map_err(|e| e.at_index(n))?;
        let mut page = parse_chapter_page(&html, Some(n), &url)?;
        if page.chapter.title.is_none() && toc.len() > 1 {
            page.chapter.title = entry.title.clone();
        }
        Ok(page)
    }

    fn fetch_all_chapters(
        &self,
        ctx: &FetchContext<'_>,
        work_id: &str,
    ) -> Result<Vec<ChapterPage>, RetrievalError> {
        let toc = self.fetch_toc(ctx, work_id)?;
        tracing::info!(work_id, chapters = toc.len(), "discovered chapter list");
        fetch_ordered(1..=toc.len() as u32, ctx, |n| {
            self.fetch_listed_chapter(ctx, work_id, &toc, n)
        })
    }

    fn series_id_for(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
    ) -> Result<String, RetrievalError> {
        if story.is_series {
            return Ok(story.story_id.clone());
        }
        let url = work_url(&story.story_id);
        let html = ctx.get(&url)?;
        parse_work_series(&html)?
            .ok_or_else(|| RetrievalError::parse(&url, None, "work is not part of a series"))
    }

    /// Walk every page of the series listing. Returns the title and work ids in series order.
    fn fetch_series_listing(
        &self,
        ctx: &FetchContext<'_>,
        series_id: &str,
    ) -> Result<(Option<String>, Vec<String>), RetrievalError> {
        let mut title = None;
        let mut works: Vec<String> = Vec::new();
        let mut seen_pages = HashSet::new();
        let mut next = Some(series_url(series_id));
        while let Some(url) = next.take() {
            if seen_pages.contains(&url) {
                tracing::warn!(url = %url, "series pagination revisits a page; stopping");
                break;
            }
            if seen_pages.len() >= MAX_SERIES_PAGES {
                return Err(RetrievalError::parse(
                    &url,
                    None,
                    format!("series listing exceeds {} pages", MAX_SERIES_PAGES),
                ));
            }
            seen_pages.insert(url.clone());
            let html = ctx.get(&url)?;
            let (page_title, page_works, page_next) = parse_series_page(&html, &url)?;
            title = title.or(page_title);
            for w in page_works {
                if !works.contains(&w) {
                    works.push(w);
                }
            }
            next = page_next;
        }
        if works.is_empty() {
            return Err(RetrievalError::parse(
                &series_url(series_id),
                None,
                "series lists no works",
            ));
        }
        Ok((title, works))
    }
}

impl SiteAdapter for ArchiveOfOurOwn {
    fn site(&self) -> Site {
        Site::ArchiveOfOurOwn
    }

    fn parse_reference(&self, url: &str) -> Result<StoryReference, RetrievalError> {
        let invalid = |reason: &str| RetrievalError::InvalidUrl {
            input: url.to_string(),
            reason: reason.to_string(),
        };
        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let path = parsed.path();
        let reference = |story_id: String, chapter_id: Option<String>, is_series: bool| {
            StoryReference {
                url: url.to_string(),
                site: Site::ArchiveOfOurOwn,
                story_id,
                chapter_number: None,
                chapter_id,
                is_series,
            }
        };
        if let Some(work_id) = id_after(path, "works") {
            return Ok(reference(work_id, id_after(path, "chapters"), false));
        }
        if let Some(series_id) = id_after(path, "series") {
            return Ok(reference(series_id, None, true));
        }
        Err(invalid(
            "expected a work or series URL like https://archiveofourown.org/works/12345",
        ))
    }

    fn fetch_single_chapter(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
    ) -> Result<Chapter, RetrievalError> {
        if story.is_series {
            return Err(RetrievalError::UnsupportedOperation {
                site: Site::ArchiveOfOurOwn,
                operation: "chapter downloads from a series URL",
            });
        }
        let (url, index) = match &story.chapter_id {
            Some(cid) => (chapter_url(&story.story_id, cid), None),
            None => (work_url(&story.story_id), Some(1)),
        };
        let html = ctx.get(&url)?;
        Ok(parse_chapter_page(&html, index, &url)?.chapter)
    }

    fn fetch_chapter_range(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
        range: ChapterRange,
    ) -> Result<Vec<Chapter>, RetrievalError> {
        if story.is_series {
            return Err(RetrievalError::UnsupportedOperation {
                site: Site::ArchiveOfOurOwn,
                operation: "chapter downloads from a series URL",
            });
        }
        let toc = self.fetch_toc(ctx, &story.story_id)?;
        if range.end() as usize > toc.len() {
            return Err(RetrievalError::parse(
                &navigate_url(&story.story_id),
                Some(toc.len() as u32 + 1),
                format!("work has only {} chapter(s)", toc.len()),
            ));
        }
        let pages = fetch_ordered(range.indices(), ctx, |n| {
            self.fetch_listed_chapter(ctx, &story.story_id, &toc, n)
        })?;
        Ok(pages.into_iter().map(|p| p.chapter).collect())
    }

    fn fetch_entire_work(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
    ) -> Result<Work, RetrievalError> {
        if story.is_series {
            return Err(RetrievalError::UnsupportedOperation {
                site: Site::ArchiveOfOurOwn,
                operation: "whole-work downloads from a series URL (use a series download)",
            });
        }
        let pages = self.fetch_all_chapters(ctx, &story.story_id)?;
        let (title, author) = pages
            .first()
            .map(|p| (p.work_title.clone(), p.author.clone()))
            .unwrap_or_default();
        Ok(Work {
            reference: story.clone(),
            title,
            author,
            chapters: pages.into_iter().map(|p| p.chapter).collect(),
        })
    }

    fn fetch_series(
        &self,
        ctx: &FetchContext<'_>,
        story: &StoryReference,
    ) -> Result<Series, RetrievalError> {
        let series_id = self.series_id_for(ctx, story)?;
        let (title, work_ids) = self.fetch_series_listing(ctx, &series_id)?;
        tracing::info!(series_id = %series_id, works = work_ids.len(), "discovered series");

        let mut works = Vec::with_capacity(work_ids.len());
        for (i, work_id) in work_ids.iter().enumerate() {
            let position = i as u32 + 1;
            let url = format!("{}/works/{}", AO3_BASE, work_id);
            let reference = self.parse_reference(&url)?;
            let work = self
                .fetch_entire_work(ctx, &reference)
                .map_err(|e| e.in_series_work(position, &url))?;
            works.push(work);
        }
        Ok(Series { title, works })
    }
}
