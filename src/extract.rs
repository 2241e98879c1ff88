use crate::inventory::Inventory;
use crate::models::RecommendationItem;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

// First `[ { ... } ]` span, lazy on the body and allowed to cross newlines.
// This is a salvage heuristic, not a JSON tokenizer: it stops at the first
// `}` followed by `]`, so an object holding an array of objects is cut short
// and then fails to parse.
static JSON_ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").expect("static regex"));

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("parse error: {source}\nraw: {raw}")]
    Parse {
        #[source]
        source: serde_json::Error,
        raw: String,
    },
    #[error("zero options from model")]
    Empty,
}

/// Returns the first substring shaped like an array of objects, if any.
pub fn first_json_array(text: &str) -> Option<&str> {
    JSON_ARRAY_RE.find(text).map(|m| m.as_str())
}

/// Parses raw model output into items, salvaging an embedded array when
/// the model wrapped it in prose. Falls back to the whole trimmed text.
pub fn parse_recommendations(raw: &str) -> Result<Vec<RecommendationItem>, ExtractError> {
    let content = raw.trim();
    let candidate = first_json_array(content).unwrap_or(content);
    let items: Vec<RecommendationItem> =
        serde_json::from_str(candidate).map_err(|source| ExtractError::Parse {
            source,
            raw: content.to_string(),
        })?;
    if items.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(items)
}

/// Rewrites matching titles to canonical casing and attaches the image.
/// Unmatched titles keep the model's text and lose any image. Returns the
/// number of unmatched items.
pub fn reconcile(items: &mut [RecommendationItem], inventory: &Inventory) -> usize {
    let mut unresolved = 0;
    for item in items.iter_mut() {
        match inventory.lookup(&item.title) {
            Some(entry) => {
                item.title = entry.canonical_title.clone();
                item.image_url = Some(entry.image_url.clone());
            }
            None => {
                warn!(
                    target = "hungry.chat",
                    title = %item.title,
                    "model returned title outside inventory"
                );
                crate::metrics::unresolved_title();
                item.image_url = None;
                unresolved += 1;
            }
        }
    }
    unresolved
}

pub fn extract_recommendations(
    raw: &str,
    inventory: &Inventory,
) -> Result<Vec<RecommendationItem>, ExtractError> {
    let mut items = parse_recommendations(raw)?;
    reconcile(&mut items, inventory);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RICE_JSON: &str = r#"[{"id":"1","title":"rice","description":"Fluffy.","brand":"Farm","mainFeatures":["short grain","10kg"],"tags":["staple"],"priceKRW":32900,"deliveryDays":1,"category":"staple"}]"#;

    #[test]
    fn bare_array_parses_directly() {
        assert_eq!(first_json_array(RICE_JSON), Some(RICE_JSON));
        let items = extract_recommendations(RICE_JSON, Inventory::builtin()).expect("items");
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "rice");
        assert_eq!(item.main_features, vec!["short grain", "10kg"]);
        assert_eq!(item.tags.as_deref(), Some(&["staple".to_string()][..]));
        assert_eq!(item.price_krw, 32900);
        assert_eq!(item.delivery_days, 1);
        assert!(item.is_resolved());
    }

    #[test]
    fn prose_wrapped_array_is_salvaged() {
        let raw = format!("Sure! Here you go:\n{RICE_JSON}\nEnjoy!");
        assert_eq!(first_json_array(&raw), Some(RICE_JSON));
        let items = extract_recommendations(&raw, Inventory::builtin()).expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "rice");
    }

    #[test]
    fn markdown_fenced_multiline_array_is_salvaged() {
        let raw = "```json\n[\n  {\n    \"id\": \"a\",\n    \"title\": \"Seoul Milk\"\n  },\n  {\n    \"id\": \"b\",\n    \"title\": \"rice\"\n  }\n]\n```";
        let items = extract_recommendations(raw, Inventory::builtin()).expect("items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "seoul milk");
        assert_eq!(items[1].title, "rice");
    }

    #[test]
    fn uppercase_title_is_rewritten_to_canonical() {
        let raw = r#"[{"id":"1","title":"RICE"}]"#;
        let items = extract_recommendations(raw, Inventory::builtin()).expect("items");
        assert_eq!(items[0].title, "rice");
        let expected = Inventory::builtin().lookup("rice").unwrap().image_url.clone();
        assert_eq!(items[0].image_url.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn unknown_title_is_kept_without_image() {
        let raw = r#"[{"id":"1","title":"unknown snack","imageUrl":"https://evil.example/x.png"}]"#;
        let mut items = parse_recommendations(raw).expect("items");
        let unresolved = reconcile(&mut items, Inventory::builtin());
        assert_eq!(unresolved, 1);
        assert_eq!(items[0].title, "unknown snack");
        assert!(items[0].image_url.is_none());
        assert!(!items[0].is_resolved());
    }

    #[test]
    fn non_json_is_a_parse_error_carrying_raw_text() {
        let err = parse_recommendations("  not json at all \n").expect_err("parse error");
        match &err {
            ExtractError::Parse { raw, .. } => assert_eq!(raw, "not json at all"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("raw: not json at all"));
    }

    #[test]
    fn empty_array_is_rejected() {
        assert!(matches!(parse_recommendations("[]"), Err(ExtractError::Empty)));
        assert!(matches!(
            parse_recommendations("  [ ]  "),
            Err(ExtractError::Empty)
        ));
    }

    #[test]
    fn nested_object_array_defeats_the_salvage_heuristic() {
        let raw = r#"note: [{"title":"rice","variants":[{"size":"5kg"}]}]"#;
        assert_eq!(
            first_json_array(raw),
            Some(r#"[{"title":"rice","variants":[{"size":"5kg"}]"#)
        );
        assert!(matches!(
            parse_recommendations(raw),
            Err(ExtractError::Parse { .. })
        ));
    }

    #[test]
    fn no_bracketed_span_falls_back_to_whole_text() {
        assert_eq!(first_json_array(r#"{"title":"rice"}"#), None);
        assert!(matches!(
            parse_recommendations(r#"{"title":"rice"}"#),
            Err(ExtractError::Parse { .. })
        ));
    }
}
