//! Narrow markup-to-HTML transform for assistant replies.
//!
//! The chat model is told to use `**bold**` headings, numbered points and `*`
//! bullets. This module handles exactly that subset; it is not a markdown
//! parser and does not try to repair nested or unbalanced markers.

use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    numbered_heading: Regex,
    bold_heading: Regex,
    bold_then_colon: Regex,
    bullet_marker: Regex,
    paragraph_break: Regex,
    bold: Regex,
    bullet_line: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("formatter pattern is valid");
        Patterns {
            numbered_heading: re(r"(\d+\.[ \t]*[A-Z][^:\n]*):[ \t]*([^\n])"),
            bold_heading: re(r"(\*\*[^*\n:]+:\*\*)[ \t]*([^\n])"),
            bold_then_colon: re(r"(\*\*[^*\n]+\*\*):[ \t]*([^\n])"),
            bullet_marker: re(r"(?m)^[ \t]*\*[ \t]+"),
            paragraph_break: re(r"\n\s*\n"),
            bold: re(r"\*\*([^*\n]+)\*\*"),
            bullet_line: re(r"(?m)^\* (.+)$"),
        }
    })
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Breaks the line after headings and normalizes bullet markers.
fn prepare(text: &str) -> String {
    let p = patterns();
    let text = text.replace("\r\n", "\n");
    let text = escape_html(&text);
    let text = p.numbered_heading.replace_all(&text, "${1}:\n${2}");
    let text = p.bold_heading.replace_all(&text, "${1}\n${2}");
    let text = p.bold_then_colon.replace_all(&text, "${1}:\n${2}");
    p.bullet_marker.replace_all(&text, "* ").into_owned()
}

fn render_paragraph(paragraph: &str) -> String {
    let p = patterns();
    let html = p.bold.replace_all(paragraph, "<strong>${1}</strong>");
    let html = p.bullet_line.replace_all(&html, "\u{2022} ${1}");
    html.trim().replace('\n', "<br/>")
}

/// Lazy sequence of HTML paragraph fragments for one reply.
pub struct Paragraphs {
    text: String,
    pos: usize,
}

impl Iterator for Paragraphs {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.pos < self.text.len() {
            let (end, next_pos) = match patterns().paragraph_break.find_at(&self.text, self.pos) {
                Some(m) => (m.start(), m.end()),
                None => (self.text.len(), self.text.len()),
            };
            let raw = &self.text[self.pos..end];
            self.pos = next_pos;

            if !raw.trim().is_empty() {
                return Some(render_paragraph(raw));
            }
        }
        None
    }
}

pub fn format_reply(text: &str) -> Paragraphs {
    Paragraphs {
        text: prepare(text),
        pos: 0,
    }
}

/// Whole reply as `<p>` blocks.
pub fn reply_to_html(text: &str) -> String {
    format_reply(text)
        .map(|paragraph| format!("<p class=\"mb-2\">{}</p>", paragraph))
        .collect()
}
