//! Split a model response into prose and fenced code blocks.

use regex::Regex;

use crate::domain::models::{CodeCandidate, CodeLanguage};

/// Prose segments and code blocks of one response, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub text_segments: Vec<String>,
    pub candidates: Vec<CodeCandidate>,
}

const FENCE_PATTERN: &str = r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)```";

/// Splits responses on triple-backtick fences.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    fence: Regex,
}

impl ResponseParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            fence: Regex::new(FENCE_PATTERN)?,
        })
    }

    /// Extract fenced blocks; an untagged fence is `Text`, `python` is executable.
    pub fn parse(&self, text: &str) -> ParsedResponse {
        let mut parsed = ParsedResponse::default();
        let mut cursor = 0;

        for caps in self.fence.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            push_segment(&mut parsed.text_segments, &text[cursor..whole.start()]);
            cursor = whole.end();

            let tag = caps.get(1).map_or("", |m| m.as_str());
            let body = caps.get(2).map_or("", |m| m.as_str());
            parsed.candidates.push(CodeCandidate {
                index: parsed.candidates.len(),
                language: CodeLanguage::from_tag(tag),
                source: body.trim_end_matches(['\n', '\r']).to_string(),
            });
        }
        push_segment(&mut parsed.text_segments, &text[cursor..]);
        parsed
    }
}

fn push_segment(segments: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
}
