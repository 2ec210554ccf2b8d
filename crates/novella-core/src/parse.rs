//! Structured data extraction from generated text.
//!
//! Generated text is never assumed to be well formed. JSON payloads go
//! through several recovery strategies before giving up, and judgment
//! verdicts are normalized before they are compared against the two
//! recognized answers.

use serde::de::DeserializeOwned;

/// A two-valued judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The judged goal has been achieved.
    Complete,
    /// The judged goal has not been achieved.
    Incomplete,
}

impl Verdict {
    /// Parse a judgment response.
    ///
    /// Accepts `complete` and `incomplete` in any ASCII case, surrounded by
    /// whitespace, quotes, backticks, asterisks or a trailing period.
    /// Anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '.') || c.is_whitespace())
            .to_ascii_lowercase();
        match word.as_str() {
            "complete" => Some(Self::Complete),
            "incomplete" => Some(Self::Incomplete),
            _ => None,
        }
    }

    /// Whether this verdict is [`Verdict::Complete`].
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Parse a JSON value of type `T` out of generated text.
///
/// Attempts multiple recovery strategies if the raw text is not clean JSON:
/// 1. Direct `serde_json` deserialization
/// 2. Extract JSON from a markdown code block
/// 3. Strip trailing commas and retry
/// 4. Extract from a code block, then strip trailing commas
/// 5. The outermost `{...}` span, with trailing commas stripped
///
/// Returns the last deserialization error if every strategy fails.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let trimmed = raw.trim();

    // Strategy 1: direct parse
    let direct = serde_json::from_str::<T>(trimmed);
    if direct.is_ok() {
        return direct;
    }

    // Strategy 2: extract from markdown code block
    let fenced = extract_json_from_codeblock(trimmed);
    if let Some(json_str) = fenced
        && let Ok(parsed) = serde_json::from_str::<T>(json_str)
    {
        return Ok(parsed);
    }

    // Strategy 3: strip trailing commas and retry
    if let Ok(parsed) = serde_json::from_str::<T>(&strip_trailing_commas(trimmed)) {
        return Ok(parsed);
    }

    // Strategy 4: extract from code block then strip commas
    if let Some(json_str) = fenced
        && let Ok(parsed) = serde_json::from_str::<T>(&strip_trailing_commas(json_str))
    {
        return Ok(parsed);
    }

    // Strategy 5: the outermost object embedded in prose
    if let Some(span) = outermost_object(trimmed) {
        return serde_json::from_str::<T>(&strip_trailing_commas(span));
    }

    direct
}

/// Extract the body of the first markdown code block.
///
/// Prefers a block tagged ```` ```json ````; falls back to an untagged one.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text
        .find("```json")
        .map(|i| body_start(text, i, "```json".len()))
        .or_else(|| text.find("```").map(|i| body_start(text, i, "```".len())))?;
    let remaining = text.get(start..)?;
    let end = remaining.find("```")?;
    remaining.get(..end).map(str::trim)
}

/// Position just past the newline following a fence opened at `fence`.
fn body_start(text: &str, fence: usize, tag_len: usize) -> usize {
    let after_tag = fence.saturating_add(tag_len);
    text.get(after_tag..)
        .and_then(|s| s.find('\n'))
        .and_then(|nl| after_tag.checked_add(nl))
        .and_then(|pos| pos.checked_add(1))
        .unwrap_or(after_tag)
}

/// The span from the first `{` to the last `}`, inclusive.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

/// Remove commas that directly precede a closing `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ',' {
            let rest = chars.clone().find(|next| !next.is_whitespace());
            if matches!(rest, Some('}' | ']')) {
                continue;
            }
        }
        result.push(c);
    }
    result
}
