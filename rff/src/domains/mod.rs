//! Bundled problem domains.
//!
//! Each domain implements [`crate::strategy::Strategy`] on top of a
//! [`crate::io::generator::Generator`]. Model output is untrusted text: anything
//! that does not parse becomes an absent proposal, never an error.

pub mod game24;
pub mod prompt;
pub mod word_problem;

use std::sync::LazyLock;

use regex::Regex;

static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*\n?(.*?)```").expect("valid code fence regex")
});

/// Body of the first fenced block, or the whole text when there is none.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    CODE_FENCE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |body| body.as_str())
        .trim()
}

/// First non-empty line after fence stripping, with inline backticks removed.
pub(crate) fn first_line(text: &str) -> String {
    strip_code_fence(text)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .trim_matches('`')
        .trim()
        .to_string()
}
