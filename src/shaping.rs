//! Turns a free-form model completion into a length-bounded `AnalysisResult`.
//!
//! The completion is expected to hold one JSON object, possibly wrapped in
//! prose. Extraction takes the span from the first `{` to the last `}` and
//! parses it as-is; it is not a balanced-brace scanner, so completions with
//! several objects or stray braces inside strings can mis-extract.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{AnalysisResult, Limits};

// ── Constants ────────────────────────────────────────────────────────────────

const ELLIPSIS: &str = "...";
const TAG_SEPARATOR: &str = ", ";

const FALLBACK_TITLE: &str = "Image Analysis Complete";
const FALLBACK_DESCRIPTION: &str =
    "The image was analyzed successfully, but a detailed description could not be generated.";
const FALLBACK_TAGS: &[&str] = &["image", "photo", "analysis"];

static TAG_NOISE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#\s]+").unwrap());

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ShapingError {
    #[error("completion contained no JSON object")]
    Extraction,
    #[error("completion contained malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("completion JSON has the wrong shape: {0}")]
    Shape(&'static str),
}

impl ShapingError {
    pub fn kind(&self) -> &'static str {
        match self {
            ShapingError::Extraction => "extraction",
            ShapingError::Parse(_) => "parse",
            ShapingError::Shape(_) => "shape",
        }
    }
}

/// A shape-checked completion, not yet fitted to any budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

// ── Public API ───────────────────────────────────────────────────────────────

pub fn shape_completion(raw: &str, limits: &Limits) -> Result<AnalysisResult, ShapingError> {
    let value = extract_candidate(raw)?;
    let candidate = validate_candidate(value)?;
    Ok(fit_result(candidate, limits))
}

// ── Extraction ───────────────────────────────────────────────────────────────

pub fn extract_candidate(raw: &str) -> Result<Value, ShapingError> {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(ShapingError::Extraction);
    };
    // A `}` that only precedes the first `{` leaves an empty span.
    let span = if end > start { &raw[start..=end] } else { "" };
    Ok(serde_json::from_str(span)?)
}

// ── Validation ───────────────────────────────────────────────────────────────

pub fn validate_candidate(value: Value) -> Result<Candidate, ShapingError> {
    let Value::Object(mut object) = value else {
        return Err(ShapingError::Shape("expected a JSON object"));
    };

    let title = take_text(&mut object, "title").ok_or(ShapingError::Shape("missing title"))?;
    let description = take_text(&mut object, "description")
        .ok_or(ShapingError::Shape("missing description"))?;
    let Some(Value::Array(raw_tags)) = object.remove("tags") else {
        return Err(ShapingError::Shape("tags must be a list"));
    };

    let tags = raw_tags
        .into_iter()
        .filter_map(|tag| match tag {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect();

    Ok(Candidate { title, description, tags })
}

fn take_text(object: &mut serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

// ── Fitting ──────────────────────────────────────────────────────────────────

pub fn fit_result(candidate: Candidate, limits: &Limits) -> AnalysisResult {
    AnalysisResult {
        title: fit_text(&candidate.title, limits.title),
        description: fit_text(&candidate.description, limits.description),
        tags: fit_tags(candidate.tags.iter().map(String::as_str), limits.tags),
    }
}

/// Truncate to `limit` characters, ending in `...` when there is room for it.
/// Below three characters there is no room, so the text is cut bare.
pub fn fit_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit < ELLIPSIS.len() {
        return text.chars().take(limit).collect();
    }
    let mut fitted: String = text.chars().take(limit - ELLIPSIS.len()).collect();
    fitted.push_str(ELLIPSIS);
    fitted
}

/// Collapse runs of `#` and whitespace to one space, then trim.
pub fn normalize_tag(tag: &str) -> String {
    TAG_NOISE_RE.replace_all(tag, " ").trim().to_string()
}

/// Admit normalized tags in order while the `", "`-joined rendering fits the
/// budget; the first tag that doesn't fit ends the list.
pub fn fit_tags<'a>(tags: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<String> {
    let mut fitted = Vec::new();
    let mut used = 0usize;

    for tag in tags.into_iter().map(normalize_tag).filter(|t| !t.is_empty()) {
        let separator = if fitted.is_empty() { 0 } else { TAG_SEPARATOR.len() };
        let cost = separator + tag.chars().count();
        if used + cost > limit {
            break;
        }
        used += cost;
        fitted.push(tag);
    }

    fitted
}

// ── Fallback ─────────────────────────────────────────────────────────────────

/// Fixed result returned when no usable completion is available. Goes
/// through the same fitting as a real answer so the budgets still hold.
pub fn fallback_result(limits: &Limits) -> AnalysisResult {
    AnalysisResult {
        title: fit_text(FALLBACK_TITLE, limits.title),
        description: fit_text(FALLBACK_DESCRIPTION, limits.description),
        tags: fit_tags(FALLBACK_TAGS.iter().copied(), limits.tags),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn limits(title: usize, description: usize, tags: usize) -> Limits {
        Limits { title, description, tags }
    }

    fn joined_len(tags: &[String]) -> usize {
        tags.join(TAG_SEPARATOR).chars().count()
    }

    #[test]
    fn prose_wrapped_completion_is_fitted() {
        let raw = r#"Sure! {"title":"A cat on a mat","description":"A small orange cat sits on a blue mat in a sunlit room.","tags":["cat","mat","indoor","pet"]} Hope that helps!"#;
        let result = shape_completion(raw, &limits(20, 40, 20)).unwrap();

        assert_eq!(result.title, "A cat on a mat");
        assert_eq!(result.description.chars().count(), 40);
        assert_eq!(result.description, "A small orange cat sits on a blue mat...");
        assert_eq!(result.tags, vec!["cat", "mat", "indoor"]);
    }

    #[test]
    fn completion_without_braces_is_an_extraction_error() {
        let err = extract_candidate("I cannot describe this image.").unwrap_err();
        assert!(matches!(err, ShapingError::Extraction));
        assert!(matches!(extract_candidate("only a closing }"), Err(ShapingError::Extraction)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let truncated = r#"{"title":"A dog","description":"A dog runs"#;
        assert!(matches!(extract_candidate(truncated), Err(ShapingError::Extraction)));

        let trailing_comma = r#"{"title":"A dog","tags":["a",],}"#;
        assert!(matches!(extract_candidate(trailing_comma), Err(ShapingError::Parse(_))));

        assert!(matches!(extract_candidate("} then {"), Err(ShapingError::Parse(_))));
    }

    #[test]
    fn extraction_spans_first_to_last_brace() {
        // Two objects make the greedy span invalid JSON.
        let raw = r#"{"a":1} and {"b":2}"#;
        assert!(matches!(extract_candidate(raw), Err(ShapingError::Parse(_))));

        let nested = r#"text {"outer":{"inner":true}} text"#;
        assert_eq!(extract_candidate(nested).unwrap(), json!({"outer": {"inner": true}}));
    }

    #[test]
    fn extraction_is_deterministic() {
        let raw = r#"x {"title":"t","description":"d","tags":[]} y"#;
        assert_eq!(extract_candidate(raw).unwrap(), extract_candidate(raw).unwrap());
    }

    #[test]
    fn missing_tags_is_a_shape_error() {
        let value = extract_candidate(r#"{"title":"X","description":"Y"}"#).unwrap();
        assert!(matches!(validate_candidate(value), Err(ShapingError::Shape(_))));
    }

    #[test]
    fn empty_or_non_string_fields_are_shape_errors() {
        for value in [
            json!({"title": "", "description": "d", "tags": []}),
            json!({"title": "t", "description": 5, "tags": []}),
            json!({"title": "t", "description": "d", "tags": "a, b"}),
            json!(["not", "an", "object"]),
        ] {
            assert!(matches!(validate_candidate(value), Err(ShapingError::Shape(_))));
        }
    }

    #[test]
    fn scalar_tags_are_kept_and_others_dropped() {
        let candidate = validate_candidate(json!({
            "title": "t",
            "description": "d",
            "tags": ["cat", 42, true, null, {"x": 1}]
        }))
        .unwrap();
        assert_eq!(candidate.tags, vec!["cat", "42", "true"]);
    }

    #[test]
    fn fit_text_truncates_with_ellipsis() {
        assert_eq!(fit_text("hello", 5), "hello");
        assert_eq!(fit_text("hello world", 8), "hello...");
        assert_eq!(fit_text("hello", 3), "...");
    }

    #[test]
    fn fit_text_below_ellipsis_width_cuts_bare() {
        assert_eq!(fit_text("hello", 2), "he");
        assert_eq!(fit_text("hello", 1), "h");
        assert_eq!(fit_text("hello", 0), "");
        assert_eq!(fit_text("hi", 2), "hi");
    }

    #[test]
    fn fit_text_counts_characters_not_bytes() {
        assert_eq!(fit_text("café au lait", 7), "café...");
        assert_eq!(fit_text("日本語のテキスト", 8), "日本語のテキスト");
        assert_eq!(fit_text("日本語のテキスト", 5), "日本...");
    }

    #[test]
    fn tags_are_normalized() {
        assert_eq!(normalize_tag("#sunset"), "sunset");
        assert_eq!(normalize_tag("  golden\t\thour "), "golden hour");
        assert_eq!(normalize_tag("##beach # life##"), "beach life");
        assert_eq!(normalize_tag(" ## "), "");
    }

    #[test]
    fn empty_tags_are_discarded_before_accumulating() {
        let tags = fit_tags(["#", "  ", "dog"], 3);
        assert_eq!(tags, vec!["dog"]);
    }

    #[test]
    fn tag_accumulation_stops_at_first_miss() {
        // "sky, mountain" is 13; "lake" would need 6 more; "a" would fit but
        // comes after the first rejection.
        let tags = fit_tags(["sky", "mountain", "lake", "a"], 15);
        assert_eq!(tags, vec!["sky", "mountain"]);

        let tags = fit_tags(["a-very-long-tag", "ok"], 5);
        assert!(tags.is_empty());
    }

    #[test]
    fn tag_budget_is_inclusive() {
        assert_eq!(fit_tags(["cat", "mat"], 8), vec!["cat", "mat"]);
        assert_eq!(fit_tags(["cat", "mat"], 7), vec!["cat"]);
    }

    #[test]
    fn fitting_is_idempotent() {
        let candidate = Candidate {
            title: "A remarkably long title about a lighthouse at dusk".into(),
            description: "Waves crash below a white lighthouse as the sun sets.".into(),
            tags: vec!["#lighthouse".into(), "sea  shore".into(), "dusk".into(), "waves".into()],
        };
        let l = limits(16, 30, 25);
        let once = fit_result(candidate, &l);
        let again = fit_result(
            Candidate {
                title: once.title.clone(),
                description: once.description.clone(),
                tags: once.tags.clone(),
            },
            &l,
        );
        assert_eq!(once, again);
    }

    #[test]
    fn fitted_results_respect_every_budget() {
        let candidate = Candidate {
            title: "t".repeat(200),
            description: "d".repeat(500),
            tags: (0..40).map(|i| format!("tag number {i}")).collect(),
        };
        for (t, d, g) in [(1, 1, 1), (2, 3, 4), (10, 50, 30), (60, 300, 150), (500, 1000, 1000)] {
            let l = limits(t, d, g);
            let result = fit_result(candidate.clone(), &l);
            assert!(result.title.chars().count() <= t);
            assert!(result.description.chars().count() <= d);
            assert!(joined_len(&result.tags) <= g);
        }
    }

    #[test]
    fn fallback_respects_every_budget() {
        let roomy = fallback_result(&limits(100, 200, 100));
        assert_eq!(roomy.title, FALLBACK_TITLE);
        assert_eq!(roomy.description, FALLBACK_DESCRIPTION);
        assert_eq!(roomy.tags, vec!["image", "photo", "analysis"]);

        let tight = fallback_result(&limits(10, 20, 12));
        assert_eq!(tight.title, "Image A...");
        assert_eq!(tight.description.chars().count(), 20);
        assert!(tight.description.ends_with("..."));
        assert_eq!(tight.tags, vec!["image", "photo"]);
    }
}
