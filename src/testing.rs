//! In-memory [PageFetcher] and page builders shared by the unit tests.

use crate::adapter::{FetchFailure, PageFetcher, RetrievalError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

enum Canned {
    Html(String),
    Status(u16),
}

/// Serves canned pages by exact URL; unknown URLs answer 404. Records every request.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    pages: HashMap<String, Canned>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), Canned::Html(html.into()));
        self
    }

    pub(crate) fn status(mut self, url: &str, code: u16) -> Self {
        self.pages.insert(url.to_string(), Canned::Status(code));
        self
    }

    pub(crate) fn delay(mut self, url: &str, d: Duration) -> Self {
        self.delays.insert(url.to_string(), d);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl PageFetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        if let Some(d) = self.delays.get(url) {
            std::thread::sleep(*d);
        }
        let status = match self.pages.get(url) {
            Some(Canned::Html(html)) => return Ok(html.clone()),
            Some(Canned::Status(code)) => *code,
            None => 404,
        };
        Err(RetrievalError::Fetch {
            url: url.to_string(),
            index: None,
            kind: FetchFailure::Status(status),
        })
    }
}

pub(crate) fn ffn_chapter_url(story_id: &str, n: u32) -> String {
    format!("https://www.fanfiction.net/s/{}/{}/", story_id, n)
}

/// FanFiction.Net chapter page with the chapter selector duplicated top and bottom, as the site does.
pub(crate) fn ffn_page(n: u32, total: u32) -> String {
    let options: String = (1..=total)
        .map(|i| {
            let selected = if i == n { " selected" } else { "" };
            format!("<option value={}{}>{}. Part {}</option>", i, selected, i, i)
        })
        .collect();
    let select = if total > 1 {
        format!(
            "<select id=chap_select title='Chapter Navigation'>{}</select>",
            options
        )
    } else {
        String::new()
    };
    format!(
        r#"<html><head><title>Test Story Chapter {n}</title></head><body>
<div id=profile_top><b class='xcontrast_txt'>Test Story</b> By: <a class='xcontrast_txt' href='/u/1/Writer'>Writer</a></div>
<span>{select}</span>
<div class='storytextp' id='storytextp'><div class='storytext xcontrast_txt nocopy' id='storytext'>
<p>Text of chapter {n}.</p><p>Second paragraph of chapter {n}.</p>
</div></div>
<span>{select}</span>
</body></html>"#,
        n = n,
        select = select
    )
}

/// Register chapters 1..=total of an FFN story on `fetcher`.
pub(crate) fn ffn_story(mut fetcher: FakeFetcher, story_id: &str, total: u32) -> FakeFetcher {
    for n in 1..=total {
        fetcher = fetcher.page(&ffn_chapter_url(story_id, n), ffn_page(n, total));
    }
    fetcher
}

pub(crate) fn ao3_work_url(work_id: &str) -> String {
    format!("https://archiveofourown.org/works/{}?view_adult=true", work_id)
}

pub(crate) fn ao3_navigate_url(work_id: &str) -> String {
    format!(
        "https://archiveofourown.org/works/{}/navigate?view_adult=true",
        work_id
    )
}

pub(crate) fn ao3_chapter_url(work_id: &str, chapter_id: &str) -> String {
    format!(
        "https://archiveofourown.org/works/{}/chapters/{}?view_adult=true",
        work_id, chapter_id
    )
}

/// Chapter IDs for a test work: `{work_id}0{n}` so they are unique and not sequential from 1.
pub(crate) fn ao3_chapter_id(work_id: &str, n: u32) -> String {
    format!("{}0{}", work_id, n)
}

pub(crate) fn ao3_navigate_page(work_id: &str, total: u32) -> String {
    let items: String = (1..=total)
        .map(|n| {
            format!(
                "<li><a href=\"/works/{w}/chapters/{c}\">{n}. Part {n}</a> <span class=\"datetime\">(2020-01-0{n})</span></li>",
                w = work_id,
                c = ao3_chapter_id(work_id, n),
                n = n
            )
        })
        .collect();
    format!(
        r#"<html><body><div id="main"><h2 class="heading">Chapter Index for <a href="/works/{w}">Work {w}</a></h2>
<ol class="chapter index group" role="navigation">{items}</ol></div></body></html>"#,
        w = work_id,
        items = items
    )
}

/// AO3 chapter page. `series_id` adds the series block to the work meta.
pub(crate) fn ao3_chapter_page(work_id: &str, n: u32, total: u32, series_id: Option<&str>) -> String {
    let preface = if total > 1 {
        format!(
            "<div class=\"chapter preface group\" role=\"complementary\"><h3 class=\"title\"><a href=\"/works/{w}/chapters/{c}\">Chapter {n}</a>: Part {n}</h3>\
             <div class=\"summary module\"><h3 class=\"heading\">Summary:</h3><blockquote class=\"userstuff\"><p>Summary {n}</p></blockquote></div></div>",
            w = work_id,
            c = ao3_chapter_id(work_id, n),
            n = n
        )
    } else {
        String::new()
    };
    let options: String = (1..=total)
        .map(|i| {
            let selected = if i == n { " selected=\"selected\"" } else { "" };
            format!(
                "<option{} value=\"{}\">{}. Part {}</option>",
                selected,
                ao3_chapter_id(work_id, i),
                i,
                i
            )
        })
        .collect();
    let series = series_id
        .map(|s| {
            format!(
                "<dt class=\"series\">Series:</dt><dd class=\"series\"><span class=\"series\"><span class=\"position\">Part 1 of the <a href=\"/series/{}\">Test Series</a> series</span></span></dd>",
                s
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body><div id="main">
<ul class="work navigation actions"><li class="chapter" id="chapter_index"><form><select name="selected_id" id="selected_id">{options}</select></form></li></ul>
<div class="wrapper"><dl class="work meta group">{series}</dl></div>
<div id="workskin"><div class="preface group"><h2 class="title heading">Work {w}</h2><h3 class="byline heading"><a rel="author" href="/users/author">Author {w}</a></h3></div>
<div id="chapters" role="article"><div class="chapter" id="chapter-{n}">{preface}
<div class="userstuff module" role="article"><h3 class="landmark heading" id="work">Chapter Text</h3><p>Body of work {w} chapter {n}.</p><p>More text.</p></div>
</div></div></div></div></body></html>"#,
        options = options,
        series = series,
        w = work_id,
        n = n,
        preface = preface
    )
}

/// Register navigation, work URL (chapter 1) and every chapter URL of an AO3 work.
pub(crate) fn ao3_work(
    mut fetcher: FakeFetcher,
    work_id: &str,
    total: u32,
    series_id: Option<&str>,
) -> FakeFetcher {
    fetcher = fetcher
        .page(&ao3_navigate_url(work_id), ao3_navigate_page(work_id, total))
        .page(
            &ao3_work_url(work_id),
            ao3_chapter_page(work_id, 1, total, series_id),
        );
    for n in 1..=total {
        fetcher = fetcher.page(
            &ao3_chapter_url(work_id, &ao3_chapter_id(work_id, n)),
            ao3_chapter_page(work_id, n, total, series_id),
        );
    }
    fetcher
}

pub(crate) fn ao3_series_url(series_id: &str, page: u32) -> String {
    if page <= 1 {
        format!("https://archiveofourown.org/series/{}", series_id)
    } else {
        format!("https://archiveofourown.org/series/{}?page={}", series_id, page)
    }
}

/// One page of an AO3 series listing. `next_page` adds pagination.
pub(crate) fn ao3_series_page(series_id: &str, work_ids: &[&str], next_page: Option<u32>) -> String {
    let items: String = work_ids
        .iter()
        .map(|w| {
            format!(
                "<li class=\"work blurb group\" id=\"work_{w}\"><div class=\"header module\"><h4 class=\"heading\"><a href=\"/works/{w}\">Work {w}</a> by <a rel=\"author\" href=\"/users/author\">author</a></h4></div></li>",
                w = w
            )
        })
        .collect();
    let pagination = next_page
        .map(|p| {
            format!(
                "<ol class=\"pagination actions\"><li class=\"next\"><a rel=\"next\" href=\"/series/{}?page={}\">Next</a></li></ol>",
                series_id, p
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body><div id="main"><h2 class="heading">Test Series</h2>
<ul class="series work index group">{items}</ul>{pagination}</div></body></html>"#,
        items = items,
        pagination = pagination
    )
}
