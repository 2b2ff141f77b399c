use std::sync::OnceLock;

use regex::Regex;

/// A page's worth of markdown recovered from a converted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSegment {
    pub content: String,
    pub page: u32,
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<!-- Page (\d+) -->").expect("static page marker pattern"))
}

/// Split converted markdown into per-page segments on `<!-- Page N -->`
/// markers.
///
/// Content following marker N belongs to page N. Text before the first
/// marker has no page attribution and is dropped, matching the converter's
/// output layout where every page body is preceded by its marker. Text with
/// no markers at all is a single page-1 segment, so hand-written markdown
/// still ingests. Empty segments are filtered out.
pub fn split_pages(text: &str) -> Vec<PageSegment> {
    let mut segments = Vec::new();
    let mut last_page: u32 = 1;
    let mut current_pos: usize = 0;

    for caps in marker_pattern().captures_iter(text) {
        let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let page: u32 = caps
            .get(1)
            .and_then(|d| d.as_str().parse().ok())
            .unwrap_or(last_page);

        if current_pos > 0 {
            push_segment(&mut segments, &text[current_pos..m.0], last_page);
        }
        last_page = page;
        current_pos = m.1;
    }

    // current_pos == 0 here means no marker matched; the whole text is the
    // tail segment and lands on page 1.
    if current_pos < text.len() {
        push_segment(&mut segments, &text[current_pos..], last_page);
    }

    segments
}

fn push_segment(segments: &mut Vec<PageSegment>, raw: &str, page: u32) {
    let content = raw.trim();
    if !content.is_empty() {
        segments.push(PageSegment {
            content: content.to_string(),
            page,
        });
    }
}
