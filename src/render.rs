//! Plain-text output: chapter, work and series layouts, plus filename sanitizing.
//! Pure functions over the model; identical input always renders identical bytes.

use crate::model::{Chapter, Series, Work};

/// Body of one chapter, no header.
pub fn render_single_chapter(chapter: &Chapter) -> String {
    let mut out = String::with_capacity(chapter.body.len() + 1);
    out.push_str(chapter.body.trim_end());
    out.push('\n');
    out
}

/// Chapters in the given order, each under a `Chapter {n}` line and its title when known.
pub fn render_chapters(chapters: &[Chapter]) -> String {
    let mut out = String::new();
    push_chapters(&mut out, chapters);
    out
}

/// Work header (title, author) followed by every chapter.
pub fn render_work(work: &Work) -> String {
    let mut out = String::new();
    push_work(&mut out, work);
    out
}

/// Series title, then each work behind a `=== Work {k}: {title} ===` marker.
pub fn render_series(series: &Series) -> String {
    let mut out = String::new();
    if let Some(title) = &series.title {
        out.push_str(title);
        out.push_str("\n\n");
    }
    for (i, work) in series.works.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "=== Work {}: {} ===\n\n",
            i + 1,
            work_label(work)
        ));
        push_work(&mut out, work);
    }
    out
}

fn work_label(work: &Work) -> &str {
    work.title
        .as_deref()
        .unwrap_or(work.reference.story_id.as_str())
}

fn push_work(out: &mut String, work: &Work) {
    if let Some(title) = &work.title {
        out.push_str(title);
        out.push('\n');
        if let Some(author) = &work.author {
            out.push_str(&format!("By {}\n", author));
        }
        out.push('\n');
    }
    push_chapters(out, &work.chapters);
}

fn push_chapters(out: &mut String, chapters: &[Chapter]) {
    for (i, ch) in chapters.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("Chapter {}\n", ch.index));
        if let Some(title) = &ch.title {
            out.push_str(title);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(ch.body.trim_end());
        out.push('\n');
    }
}

/// Filesystem-safe stem: ASCII alphanumerics lowercased, every other run becomes one `-`.
/// Falls back to `fallback` (sanitized the same way) when nothing survives, then to `story`.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let stem = slug(name);
    let stem = if stem.is_empty() { slug(fallback) } else { stem };
    if stem.is_empty() {
        "story".to_string()
    } else {
        stem
    }
}

/// `sanitize_filename` plus the `.txt` extension.
pub fn text_filename(name: &str, fallback: &str) -> String {
    format!("{}.txt", sanitize_filename(name, fallback))
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    // Keep the stem well under common filesystem name limits.
    if out.len() > 100 {
        out.truncate(100);
        while out.ends_with('-') {
            out.pop();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Site, StoryReference};

    fn chapter(index: u32, title: Option<&str>) -> Chapter {
        Chapter {
            index,
            title: title.map(String::from),
            body: format!("Body {}.\n\nSecond paragraph.", index),
        }
    }

    fn work(id: &str, title: Option<&str>) -> Work {
        Work {
            reference: StoryReference {
                url: format!("https://archiveofourown.org/works/{}", id),
                site: Site::ArchiveOfOurOwn,
                story_id: id.to_string(),
                chapter_number: None,
                chapter_id: None,
                is_series: false,
            },
            title: title.map(String::from),
            author: Some("Someone".to_string()),
            chapters: vec![chapter(1, None), chapter(2, Some("The Return"))],
        }
    }

    #[test]
    fn single_chapter_is_body_only() {
        assert_eq!(
            render_single_chapter(&chapter(3, Some("Ignored"))),
            "Body 3.\n\nSecond paragraph.\n"
        );
    }

    #[test]
    fn chapters_get_headers_and_titles() {
        let text = render_chapters(&[chapter(2, None), chapter(3, Some("Storm"))]);
        assert_eq!(
            text,
            "Chapter 2\n\nBody 2.\n\nSecond paragraph.\n\nChapter 3\nStorm\n\nBody 3.\n\nSecond paragraph.\n"
        );
    }

    #[test]
    fn work_header_names_title_and_author() {
        let text = render_work(&work("1", Some("Long Road")));
        assert!(text.starts_with("Long Road\nBy Someone\n\nChapter 1\n"));
        assert!(text.contains("Chapter 2\nThe Return\n"));
    }

    #[test]
    fn series_marks_each_work_in_order() {
        let series = Series {
            title: Some("Saga".to_string()),
            works: vec![work("1", Some("First")), work("2", None)],
        };
        let text = render_series(&series);
        assert!(text.starts_with("Saga\n\n=== Work 1: First ===\n"));
        let first = text.find("=== Work 1: First ===");
        let second = text.find("=== Work 2: 2 ===");
        assert!(first < second && second.is_some());
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("The Long Road: Part 2!", "x"), "the-long-road-part-2");
        assert_eq!(sanitize_filename("  ", "67890"), "67890");
        assert_eq!(sanitize_filename("日本語", ""), "story");
        assert_eq!(text_filename("A/B\\C", "x"), "a-b-c.txt");
        assert!(sanitize_filename(&"ab ".repeat(80), "x").len() <= 100);
    }
}
