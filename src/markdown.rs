//! Reply normalization: provider pages hand back rich HTML, notes want
//! Markdown with the streaming artifacts (runs of blank lines) collapsed.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkdownError {
    #[error("failed to convert reply markup: {0}")]
    Convert(String),
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+?\s*\n").expect("blank-run pattern is valid"))
}

/// Convert reply HTML to Markdown.
pub fn html_to_markdown(html: &str) -> Result<String, MarkdownError> {
    htmd::convert(html).map_err(|err| MarkdownError::Convert(err.to_string()))
}

/// Collapse consecutive blank lines down to single line breaks.
pub fn collapse_blank_runs(text: &str) -> String {
    blank_runs().replace_all(text, "\n").into_owned()
}

/// Full reply normalization: HTML to Markdown, then blank-run collapsing.
pub fn normalize_reply(html: &str) -> Result<String, MarkdownError> {
    Ok(collapse_blank_runs(html_to_markdown(html)?.trim()))
}
