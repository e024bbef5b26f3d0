//! Sentence segmentation for CJK and Latin text

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

/// A run of terminal marks, any closing brackets or quotes right after it
/// and one trailing newline, or a bare newline
fn terminator() -> &'static Regex {
    static TERMINATOR: OnceLock<Regex> = OnceLock::new();
    TERMINATOR.get_or_init(|| {
        Regex::new(r#"[。！？!?.…]+[」』”"）)】]*\n?|\n"#).expect("sentence terminator pattern is valid")
    })
}

/// Split `text` into sentence byte spans.
///
/// The spans tile the text with no gaps. Whitespace-only pieces are merged
/// into a neighbouring sentence. Text without any terminal mark is a single
/// sentence.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut start = 0;

    for m in terminator().find_iter(text) {
        let span = start..m.end();
        if text[span.clone()].trim().is_empty() {
            match spans.last_mut() {
                Some(last) => last.end = span.end,
                // Leading blank lines join the first real sentence
                None => continue,
            }
        } else {
            spans.push(span);
        }
        start = m.end();
    }

    if start < text.len() {
        let rest = start..text.len();
        match spans.last_mut() {
            Some(last) if text[rest.clone()].trim().is_empty() => last.end = rest.end,
            _ => spans.push(rest),
        }
    }

    spans
}

/// Index of the span containing byte offset `at`
pub fn sentence_at(spans: &[Range<usize>], at: usize) -> Option<usize> {
    let index = spans.partition_point(|span| span.end <= at);
    (index < spans.len()).then_some(index)
}
