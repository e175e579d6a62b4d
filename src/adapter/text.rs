//! HTML story body to plain text. Block elements become paragraphs separated by blank lines,
//! `<br>` becomes a line break, `<hr>` becomes a `* * *` scene break. Scripts, forms and AO3
//! landmark headings are dropped.

use scraper::ElementRef;

const SKIPPED: &[&str] = &[
    "script", "style", "noscript", "button", "select", "form", "iframe", "template",
];
const BLOCKS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "li", "ul", "ol", "center",
    "section", "article", "table", "tr", "pre", "dl", "dt", "dd", "figure",
];

#[derive(Default)]
struct TextWriter {
    raw: String,
}

impl TextWriter {
    fn push_inline(&mut self, s: &str) {
        let starts_ws = s.starts_with(char::is_whitespace);
        let ends_ws = s.ends_with(char::is_whitespace);
        let words: Vec<&str> = s.split_whitespace().collect();
        if words.is_empty() {
            if !s.is_empty() {
                self.space();
            }
            return;
        }
        if starts_ws {
            self.space();
        }
        self.raw.push_str(&words.join(" "));
        if ends_ws {
            self.space();
        }
    }

    fn space(&mut self) {
        if !self.raw.is_empty() && !self.raw.ends_with(|c| c == ' ' || c == '\n') {
            self.raw.push(' ');
        }
    }

    fn block_break(&mut self) {
        self.raw.push_str("\n\n");
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        if SKIPPED.contains(&name) {
            return;
        }
        if name == "h3" && el.value().classes().any(|c| c == "landmark") {
            return;
        }
        match name {
            "br" => self.raw.push('\n'),
            "hr" => {
                self.block_break();
                self.raw.push_str("* * *");
                self.block_break();
            }
            _ => {
                let block = BLOCKS.contains(&name);
                if block {
                    self.block_break();
                }
                self.children(el);
                if block {
                    self.block_break();
                }
            }
        }
    }

    fn children(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            if let Some(text) = child.value().as_text() {
                self.push_inline(text);
            } else if let Some(child_el) = ElementRef::wrap(child) {
                self.element(child_el);
            }
        }
    }

    /// Trim every line and squeeze runs of blank lines down to one.
    fn finish(self) -> String {
        let mut out = String::with_capacity(self.raw.len());
        let mut blank_pending = false;
        for line in self.raw.split('\n') {
            let line = line.trim();
            if line.is_empty() {
                if !out.is_empty() {
                    blank_pending = true;
                }
                continue;
            }
            if !out.is_empty() {
                out.push_str(if blank_pending { "\n\n" } else { "\n" });
            }
            out.push_str(line);
            blank_pending = false;
        }
        out
    }
}

/// Plain text of `root`'s descendants (the root's own tag does not add a break).
pub(crate) fn html_to_text(root: ElementRef<'_>) -> String {
    let mut w = TextWriter::default();
    w.children(root);
    w.finish()
}
