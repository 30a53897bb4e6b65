//! Structured output extraction, in two independent stages.
//!
//! 1. [`extract_json_object`] finds the first balanced `{...}` span in free
//!    text by brace depth, ignoring braces inside string literals.
//! 2. [`parse_categorization`] deserializes that span; when either stage
//!    fails it falls back to [`categorize_by_keywords`] on the title.
//!
//! Nothing here returns an error: unusable output degrades to a keyword
//! category with empty text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::entity::category::Category;

/// Length of the balanced object starting at the first byte of `text`
/// (which must be `{`), or `None` if it never closes.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// The first balanced `{...}` span in `text`.
///
/// If an opening brace never closes, later opening braces are tried, so
/// `"note {unfinished ... {"a":1}"` still yields `{"a":1}`.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    text.char_indices()
        .filter(|&(_, c)| c == '{')
        .find_map(|(start, _)| balanced_len(&text[start..]).map(|len| &text[start..start + len]))
}

/// Keyword sets, checked in this order; the first match wins.
static CATEGORY_KEYWORDS: LazyLock<Vec<(Category, Regex)>> = LazyLock::new(|| {
    [
        (
            Category::ErrorHandling,
            r"(?i)\b(errors?|exceptions?|panics?|err|unwrap|error[- ]handling|fallible)\b",
        ),
        (
            Category::Testing,
            r"(?i)\b(tests?|testing|flaky|coverage|mocks?|fixtures?|e2e|unit[- ]tests?)\b",
        ),
        (
            Category::Performance,
            r"(?i)\b(perf|performance|faster|slow|speed\s*up|optimi[sz]e[sd]?|optimi[sz]ation|latency|throughput|allocations?|benchmarks?)\b",
        ),
        (
            Category::Concurrency,
            r"(?i)\b(race|races|race[- ]condition|deadlocks?|mutex(es)?|locks?|locking|threads?|concurren(t|cy)|async|atomics?|parallel)\b",
        ),
        (
            Category::ApiDesign,
            r"(?i)\b(api|apis|interfaces?|signatures?|endpoints?|deprecat(e|ed|ion)|breaking|public)\b",
        ),
        (
            Category::Tooling,
            r"(?i)\b(build|ci|lint|linter|clippy|tooling|scripts?|makefile|bazel|cmake|toolchain|bump|dependenc(y|ies)|formatting)\b",
        ),
        (
            Category::Documentation,
            r"(?i)\b(docs?|documentation|readme|typos?|changelog|comments?)\b",
        ),
    ]
    .into_iter()
    .map(|(category, pattern)| (category, Regex::new(pattern).expect("valid regex")))
    .collect()
});

/// Best-effort category from a change title.
#[must_use]
pub fn categorize_by_keywords(title: &str) -> Category {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, pattern)| pattern.is_match(title))
        .map(|(category, _)| *category)
        .unwrap_or_default()
}

/// Where a [`Categorization`]'s category came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySource {
    Model,
    Keywords,
}

/// Parsed categorization output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorization {
    pub category: Category,
    pub source: CategorySource,
    pub summary: String,
    pub discussion: String,
    pub philosophy_notes: String,
    pub insights: Vec<String>,
    pub key_changes: Vec<String>,
}

impl Categorization {
    /// Keyword category, no text.
    #[must_use]
    pub fn fallback(title: &str) -> Self {
        Self {
            category: categorize_by_keywords(title),
            source: CategorySource::Keywords,
            summary: String::new(),
            discussion: String::new(),
            philosophy_notes: String::new(),
            insights: Vec::new(),
            key_changes: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CategorizationJson {
    category: Option<String>,
    summary: serde_json::Value,
    discussion: serde_json::Value,
    philosophy_notes: serde_json::Value,
    insights: serde_json::Value,
    key_changes: serde_json::Value,
}

fn text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Accept a list of strings, a single string, or anything else as empty.
fn string_list(value: serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(text)
            .filter(|s| !s.is_empty())
            .collect(),
        serde_json::Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Parse a categorization response, falling back to the title's keywords.
///
/// A valid object with a missing or unknown category keeps its text but
/// takes the keyword category.
#[must_use]
pub fn parse_categorization(response: &str, title: &str) -> Categorization {
    let Some(span) = extract_json_object(response) else {
        tracing::debug!("No JSON object in model response, using keyword category");
        return Categorization::fallback(title);
    };

    let parsed: CategorizationJson = match serde_json::from_str(span) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable JSON in model response, using keyword category");
            return Categorization::fallback(title);
        }
    };

    let (category, source) = match parsed.category.as_deref().map(str::parse::<Category>) {
        Some(Ok(category)) => (category, CategorySource::Model),
        _ => (categorize_by_keywords(title), CategorySource::Keywords),
    };

    Categorization {
        category,
        source,
        summary: text(parsed.summary),
        discussion: text(parsed.discussion),
        philosophy_notes: text(parsed.philosophy_notes),
        insights: string_list(parsed.insights),
        key_changes: string_list(parsed.key_changes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let response = "Here is the result: {\"category\":\"testing\",\"summary\":\"x\"}\nthanks";
        assert_eq!(
            extract_json_object(response),
            Some("{\"category\":\"testing\",\"summary\":\"x\"}")
        );

        let parsed = parse_categorization(response, "anything");
        assert_eq!(parsed.category, Category::Testing);
        assert_eq!(parsed.source, CategorySource::Model);
        assert_eq!(parsed.summary, "x");
    }

    #[test]
    fn braces_inside_strings_do_not_count() {
        let response = r#"{"summary": "uses } and { and \" quotes", "category": "tooling"} trailing }"#;
        let span = extract_json_object(response).expect("balanced");
        assert!(span.ends_with("\"tooling\"}"));
        assert_eq!(parse_categorization(response, "").category, Category::Tooling);
    }

    #[test]
    fn nested_objects_are_kept_whole() {
        let response = "```json\n{\"a\": {\"b\": 1}, \"c\": 2}\n```";
        assert_eq!(
            extract_json_object(response),
            Some("{\"a\": {\"b\": 1}, \"c\": 2}")
        );
    }

    #[test]
    fn unclosed_brace_skips_to_a_later_object() {
        let response = "note {unfinished and then {\"category\": \"performance\"}";
        assert_eq!(
            extract_json_object(response),
            Some("{\"category\": \"performance\"}")
        );
    }

    #[test]
    fn no_balanced_braces_falls_back_to_keywords() {
        assert_eq!(extract_json_object("no json { here"), None);
        let parsed = parse_categorization("I think it's about locks {", "Fix race condition in scheduler");
        assert_eq!(parsed.category, Category::Concurrency);
        assert_eq!(parsed.source, CategorySource::Keywords);
        assert!(parsed.summary.is_empty());
        assert!(parsed.insights.is_empty());
    }

    #[test]
    fn invalid_json_falls_back_to_keywords() {
        let parsed = parse_categorization("{category: testing,}", "Update README");
        assert_eq!(parsed.category, Category::Documentation);
        assert_eq!(parsed.source, CategorySource::Keywords);
    }

    #[test]
    fn unknown_category_keeps_text_with_keyword_category() {
        let parsed = parse_categorization(
            r#"{"category": "refactoring", "summary": "Moves code", "insights": ["a", "", "b"]}"#,
            "Speed up manifest parsing",
        );
        assert_eq!(parsed.category, Category::Performance);
        assert_eq!(parsed.source, CategorySource::Keywords);
        assert_eq!(parsed.summary, "Moves code");
        assert_eq!(parsed.insights, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn loose_field_shapes_are_accepted() {
        let parsed = parse_categorization(
            r#"{"category": "API design", "key_changes": "Renames the builder", "discussion": null}"#,
            "",
        );
        assert_eq!(parsed.category, Category::ApiDesign);
        assert_eq!(parsed.key_changes, vec!["Renames the builder".to_string()]);
        assert!(parsed.discussion.is_empty());
    }

    #[test]
    fn keyword_categories() {
        let cases = [
            ("Fix race condition in cache", Category::Concurrency),
            ("fix RACE CONDITION", Category::Concurrency),
            ("Handle errors from the loader", Category::ErrorHandling),
            ("Add tests for the parser", Category::Testing),
            ("Speed up startup", Category::Performance),
            ("Deprecate the old endpoint", Category::ApiDesign),
            ("Bump serde to 1.0.200", Category::Tooling),
            ("Fix typo in README", Category::Documentation),
            ("Rename variables", Category::Other),
            ("", Category::Other),
        ];
        for (title, expected) in cases {
            assert_eq!(categorize_by_keywords(title), expected, "{title}");
        }
    }

    #[test]
    fn earlier_keyword_sets_win() {
        assert_eq!(
            categorize_by_keywords("Add tests for error handling"),
            Category::ErrorHandling
        );
    }
}
