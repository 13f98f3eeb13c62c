//! Summary response parser: recover `[{Section Title, Summary, page_no}]`
//! from free-form model output.
//!
//! Models asked for "ONLY the JSON array" still wrap it in fences, prepend
//! chatter, break lines inside strings or truncate the tail. Four independent
//! strategies are tried in order and the first that yields a list wins:
//!
//! 1. [`fenced_block`]  — first ```` ```json [ … ] ``` ```` block
//! 2. [`bracket_slice`] — first `[` to last `]` of the raw text
//! 3. [`cleaned_bracket_slice`] — same after stripping fences and newlines
//! 4. [`object_literals`] — every exact three-key object literal, re-joined
//!
//! When none applies the caller gets a [`ParseFailure`] carrying the raw
//! text, which is never confused with an empty (but valid) list.

use crate::output::SummaryRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::debug;

/// Default title when the model omitted one.
pub const UNTITLED_SECTION: &str = "Untitled Section";

/// Default page when the model omitted or garbled one.
pub const DEFAULT_PAGE: u32 = 1;

static RE_FENCED_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*(\[[\s\S]*?\])\s*```").unwrap());

static RE_FENCE_AND_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"```json|```|\n").unwrap());

static RE_OBJECT_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\{\s*"Section Title":\s*"[^"]*",\s*"Summary":\s*"[^"]*",\s*"page_no":\s*\d+\s*\}"#,
    )
    .unwrap()
});

/// One entry as the model wrote it. Missing fields stay `None` until
/// [`ParsedEntry::into_record`] applies the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEntry {
    #[serde(rename = "Section Title", default, deserialize_with = "lenient_text")]
    pub section_title: Option<String>,
    #[serde(rename = "Summary", default, deserialize_with = "lenient_text")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_page")]
    pub page_no: Option<u32>,
}

impl ParsedEntry {
    /// Apply the defaults: "Untitled Section", empty summary, page 1.
    pub fn into_record(self) -> SummaryRecord {
        SummaryRecord {
            section_title: self
                .section_title
                .unwrap_or_else(|| UNTITLED_SECTION.to_string()),
            summary: self.summary.unwrap_or_default(),
            page: self.page_no.unwrap_or(DEFAULT_PAGE),
        }
    }
}

/// Strings as-is, numbers and booleans stringified, anything else `None`.
///
/// One odd entry must not make the whole array fail to deserialize.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Accept `3`, `"3"`, `3.0`; page 0, fractions and garbage become `None`.
fn lenient_page<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let page = match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(page.filter(|n| *n > 0).and_then(|n| u32::try_from(n).ok()))
}

/// No strategy recovered a list. Keeps the raw reply for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub raw_response: String,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not extract JSON from response ({} bytes)",
            self.raw_response.len()
        )
    }
}

impl std::error::Error for ParseFailure {}

/// Which strategy produced the entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    FencedBlock,
    BracketSlice,
    CleanedBracketSlice,
    ObjectLiterals,
}

type Strategy = fn(&str) -> Option<Vec<ParsedEntry>>;

/// Strategies in the order they are attempted.
const STRATEGIES: &[(RecoveryStrategy, Strategy)] = &[
    (RecoveryStrategy::FencedBlock, fenced_block),
    (RecoveryStrategy::BracketSlice, bracket_slice),
    (RecoveryStrategy::CleanedBracketSlice, cleaned_bracket_slice),
    (RecoveryStrategy::ObjectLiterals, object_literals),
];

/// Parse a model reply into entries, or fail with the raw text.
pub fn parse_summary_response(raw: &str) -> Result<Vec<ParsedEntry>, ParseFailure> {
    match recover_entries(raw) {
        Some((strategy, entries)) => {
            debug!(
                "Recovered {} entries via {:?} from {} bytes",
                entries.len(),
                strategy,
                raw.len()
            );
            Ok(entries)
        }
        None => Err(ParseFailure {
            raw_response: raw.to_string(),
        }),
    }
}

/// First-success-wins over [`STRATEGIES`].
pub fn recover_entries(raw: &str) -> Option<(RecoveryStrategy, Vec<ParsedEntry>)> {
    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(raw).map(|entries| (*name, entries)))
}

fn parse_array(candidate: &str) -> Option<Vec<ParsedEntry>> {
    serde_json::from_str(candidate).ok()
}

fn slice_brackets(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Strategy 1: the first fenced block (optionally tagged `json`) holding an array.
pub fn fenced_block(raw: &str) -> Option<Vec<ParsedEntry>> {
    let caps = RE_FENCED_ARRAY.captures(raw)?;
    parse_array(caps.get(1)?.as_str())
}

/// Strategy 2: everything from the first `[` to the last `]`.
pub fn bracket_slice(raw: &str) -> Option<Vec<ParsedEntry>> {
    parse_array(slice_brackets(raw)?)
}

/// Strategy 3: strip fence markers and newlines, then slice brackets.
pub fn cleaned_bracket_slice(raw: &str) -> Option<Vec<ParsedEntry>> {
    let cleaned = RE_FENCE_AND_NEWLINES.replace_all(raw, "");
    parse_array(slice_brackets(&cleaned)?)
}

/// Strategy 4: collect exact `{"Section Title", "Summary", "page_no"}` literals.
pub fn object_literals(raw: &str) -> Option<Vec<ParsedEntry>> {
    let objects: Vec<&str> = RE_OBJECT_LITERAL
        .find_iter(raw)
        .map(|m| m.as_str())
        .collect();
    if objects.is_empty() {
        return None;
    }
    parse_array(&format!("[{}]", objects.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, summary: &str, page: u32) -> ParsedEntry {
        ParsedEntry {
            section_title: Some(title.into()),
            summary: Some(summary.into()),
            page_no: Some(page),
        }
    }

    #[test]
    fn fenced_json_scenario() {
        let raw = "```json\n[{\"Section Title\":\"1. Intro\",\"Summary\":\"S.\",\"page_no\":1}]\n```";
        let entries = parse_summary_response(raw).unwrap();
        assert_eq!(entries, vec![entry("1. Intro", "S.", 1)]);
        assert_eq!(recover_entries(raw).unwrap().0, RecoveryStrategy::FencedBlock);
    }

    #[test]
    fn fenced_block_without_language_tag() {
        let raw = "Here you go:\n```\n[{\"Section Title\":\"A\",\"Summary\":\"B\",\"page_no\":2}]\n```\nThanks";
        assert_eq!(fenced_block(raw).unwrap(), vec![entry("A", "B", 2)]);
    }

    #[test]
    fn bare_array_with_prose_uses_bracket_slice() {
        let raw = "Sure! [{\"Section Title\":\"2 Method\",\"Summary\":\"We do M.\",\"page_no\":3}] Hope this helps.";
        let (strategy, entries) = recover_entries(raw).unwrap();
        assert_eq!(strategy, RecoveryStrategy::BracketSlice);
        assert_eq!(entries, vec![entry("2 Method", "We do M.", 3)]);
    }

    #[test]
    fn newline_inside_string_needs_cleaning() {
        let raw = "[{\"Section Title\":\"Intro\",\"Summary\":\"Line one\nline two.\",\"page_no\":1}]";
        assert!(bracket_slice(raw).is_none());
        let (strategy, entries) = recover_entries(raw).unwrap();
        assert_eq!(strategy, RecoveryStrategy::CleanedBracketSlice);
        assert_eq!(entries[0].summary.as_deref(), Some("Line oneline two."));
    }

    #[test]
    fn truncated_array_recovers_complete_objects() {
        let raw = concat!(
            "[{\"Section Title\": \"1 Intro\", \"Summary\": \"First.\", \"page_no\": 1},\n",
            " {\"Section Title\": \"2 Method\", \"Summary\": \"Second.\", \"page_no\": 2},\n",
            " {\"Section Title\": \"3 Res"
        );
        let (strategy, entries) = recover_entries(raw).unwrap();
        assert_eq!(strategy, RecoveryStrategy::ObjectLiterals);
        assert_eq!(
            entries,
            vec![entry("1 Intro", "First.", 1), entry("2 Method", "Second.", 2)]
        );
    }

    #[test]
    fn object_literals_scattered_in_prose() {
        let raw = "Section one is {\"Section Title\": \"A\", \"Summary\": \"x\", \"page_no\": 1} and \
                   then {\"Section Title\": \"B\", \"Summary\": \"y\", \"page_no\": 4} (see [ref).";
        let (strategy, entries) = recover_entries(raw).unwrap();
        assert_eq!(strategy, RecoveryStrategy::ObjectLiterals);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], entry("B", "y", 4));
    }

    #[test]
    fn prose_without_json_is_a_failure() {
        let raw = "I'm sorry, but I can't summarize this document.";
        let err = parse_summary_response(raw).unwrap_err();
        assert_eq!(err.raw_response, raw);
    }

    #[test]
    fn empty_array_is_success_not_failure() {
        assert_eq!(parse_summary_response("[]").unwrap(), Vec::<ParsedEntry>::new());
    }

    #[test]
    fn missing_fields_stay_none_until_defaulted() {
        let raw = r#"[{"Section Title":"Only title"},{"Summary":"No title"}]"#;
        let entries = parse_summary_response(raw).unwrap();
        assert_eq!(entries[0].page_no, None);
        assert_eq!(entries[1].section_title, None);

        let records: Vec<SummaryRecord> = entries.into_iter().map(ParsedEntry::into_record).collect();
        assert_eq!(records[0], SummaryRecord::new("Only title", "", 1));
        assert_eq!(records[1], SummaryRecord::new(UNTITLED_SECTION, "No title", 1));
    }

    #[test]
    fn page_numbers_are_lenient() {
        let raw = r#"[{"page_no":"7"},{"page_no":3.0},{"page_no":"seven"},{"page_no":null},{"page_no":-2},{"page_no":3.7},{"page_no":0},{"page_no":"0"}]"#;
        let pages: Vec<Option<u32>> = parse_summary_response(raw)
            .unwrap()
            .into_iter()
            .map(|e| e.page_no)
            .collect();
        assert_eq!(pages, vec![Some(7), Some(3), None, None, None, None, None, None]);
    }

    #[test]
    fn page_zero_defaults_to_first_page() {
        let records: Vec<SummaryRecord> = parse_summary_response(r#"[{"page_no":0},{"page_no":3.7}]"#)
            .unwrap()
            .into_iter()
            .map(ParsedEntry::into_record)
            .collect();
        let pages: Vec<u32> = records.iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 1]);
    }

    #[test]
    fn mixed_value_types_keep_every_entry() {
        let raw = r#"[{"Section Title":"A","Summary":"a","page_no":1},{"Section Title":"B","Summary":["b1","b2"],"page_no":2},{"Section Title":3,"Summary":true}]"#;
        let (strategy, entries) = recover_entries(raw).unwrap();
        assert_eq!(strategy, RecoveryStrategy::BracketSlice);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], entry("A", "a", 1));
        assert_eq!(entries[1].section_title.as_deref(), Some("B"));
        assert_eq!(entries[1].summary, None);
        assert_eq!(entries[1].page_no, Some(2));
        assert_eq!(entries[2].section_title.as_deref(), Some("3"));
        assert_eq!(entries[2].summary.as_deref(), Some("true"));
    }

    #[test]
    fn non_object_array_falls_through() {
        assert!(parse_summary_response("[1, 2, 3]").is_err());
    }

    #[test]
    fn parse_failure_display_hides_body() {
        let f = ParseFailure {
            raw_response: "abc".into(),
        };
        assert_eq!(f.to_string(), "could not extract JSON from response (3 bytes)");
    }
}
