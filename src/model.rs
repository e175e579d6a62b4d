//! Data model shared by the adapters and the retrieval service.
//!
//! Everything here is built per call and never mutated after construction.

use crate::adapter::RetrievalError;

/// Supported fiction site. Closed set; adding a site means adding a variant and a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    FanFictionNet,
    ArchiveOfOurOwn,
}

impl Site {
    pub fn name(self) -> &'static str {
        match self {
            Site::FanFictionNet => "FanFiction.Net",
            Site::ArchiveOfOurOwn => "Archive of Our Own",
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies a story (or an AO3 series) on a supported site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryReference {
    /// URL as given by the caller.
    pub url: String,
    pub site: Site,
    /// Story ID from the URL (FFN story id, AO3 work id, or AO3 series id when `is_series`).
    pub story_id: String,
    /// FFN: chapter number named in the URL (1 when absent). AO3: always `None`.
    pub chapter_number: Option<u32>,
    /// AO3: chapter ID from a `/works/{id}/chapters/{chapter_id}` URL.
    pub chapter_id: Option<String>,
    /// AO3: the URL points at a series page rather than a work.
    pub is_series: bool,
}

/// One chapter of plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based position in the story.
    pub index: u32,
    pub title: Option<String>,
    /// Plain UTF-8 text, paragraphs separated by blank lines. Never contains site markup.
    pub body: String,
}

/// A complete story: its reference, metadata when the site exposes it, and every chapter in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    pub reference: StoryReference,
    pub title: Option<String>,
    pub author: Option<String>,
    pub chapters: Vec<Chapter>,
}

/// Ordered works of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub title: Option<String>,
    pub works: Vec<Work>,
}

/// Inclusive 1-based chapter range. Only constructible with `1 <= start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterRange {
    start: u32,
    end: u32,
}

impl ChapterRange {
    pub fn new(start: u32, end: u32) -> Result<Self, RetrievalError> {
        if start < 1 || start > end {
            return Err(RetrievalError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

/// Which use-case a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalKind {
    SingleChapter,
    /// Unvalidated bounds; the service rejects bad ones before any fetch.
    ChapterRange { start: u32, end: u32 },
    EntireFanfic,
    EntireSeries,
}

/// A use-case plus the URL it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub url: String,
    pub kind: RetrievalKind,
}

impl RetrievalRequest {
    pub fn new(url: impl Into<String>, kind: RetrievalKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Fully assembled output, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalResult {
    pub bytes: Vec<u8>,
    /// Suggested filename, always ending in `.txt`.
    pub filename: String,
    pub content_type: &'static str,
}
