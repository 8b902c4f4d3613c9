use crate::oracle::Oracle;
use crate::prompts;
use crate::types::{Digest, DigestError, DigestItem, Result, ScoredEntry};
use crate::utils::time;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

pub const DEFAULT_THEME: &str = "AI Tech Digest";
pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_SOURCE_TYPE: &str = "Unknown";
pub const DEFAULT_RELEVANCE: &str = "🔵 Low";
pub const DEFAULT_SUMMARY: &str = "No summary available";

/// Ask the synthesis oracle for a digest of the scored entries.
///
/// Oracle failure is fatal. A response that is JSON but incomplete is
/// repaired, never rejected.
pub async fn synthesize(oracle: &dyn Oracle, entries: &[ScoredEntry]) -> Result<Digest> {
    let now = Utc::now();
    let today = time::digest_date(now);
    let entries_json = serde_json::to_string_pretty(entries)?;
    let user_prompt = prompts::synthesis_user_prompt(&today, &entries_json);

    info!("Synthesizing digest from {} entries with {}", entries.len(), oracle.name());
    let response = oracle
        .call_json(prompts::SYNTHESIS_SYSTEM_PROMPT, &user_prompt)
        .await
        .map_err(|e| {
            error!("Synthesis oracle call failed: {}", e);
            DigestError::oracle("synthesize", e.to_string())
        })?;

    let digest = repair(response, now)?;
    info!("Digest ready: {} items, theme {:?}", digest.items.len(), digest.theme);
    Ok(digest)
}

/// Fill every gap in an oracle digest so delivery always sees a complete shape.
///
/// Only a non-object response is refused: there is nothing to repair.
pub fn repair(response: Value, now: DateTime<Utc>) -> Result<Digest> {
    let Value::Object(mut root) = response else {
        return Err(DigestError::oracle("synthesize", "digest response is not a JSON object"));
    };

    let date = take_string(&mut root, "date").unwrap_or_else(|| time::digest_date(now));
    let theme = take_string(&mut root, "theme").unwrap_or_else(|| DEFAULT_THEME.to_string());

    let items = match root.remove("items") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(repair_item(fields)),
                other => {
                    debug!("Dropping non-object digest item: {}", other);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    debug!("Digest structure validated");
    Ok(Digest { date, theme, items })
}

fn repair_item(mut fields: Map<String, Value>) -> DigestItem {
    let mut field = |key: &str| take_string(&mut fields, key);

    DigestItem {
        title: field("title").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        publish_date: field("publish_date").unwrap_or_default(),
        source_type: field("source_type").unwrap_or_else(|| DEFAULT_SOURCE_TYPE.to_string()),
        source_name: field("source_name").unwrap_or_default(),
        erp_relevance: field("erp_relevance").unwrap_or_else(|| DEFAULT_RELEVANCE.to_string()),
        summary: field("summary").unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
        key_facts: field("key_facts").unwrap_or_default(),
        implementation_method: field("implementation_method").unwrap_or_default(),
        exploration_direction: field("exploration_direction").unwrap_or_default(),
        link: field("link").unwrap_or_default(),
    }
}

/// Strings pass through, other scalars are rendered, null counts as missing.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 20, 0, 0).unwrap()
    }

    fn full_item(n: usize) -> Value {
        json!({
            "title": format!("Title {}", n),
            "publish_date": "2024-05-10",
            "source_type": "Tech blog",
            "source_name": "OpenAI",
            "erp_relevance": "🔴 High",
            "summary": format!("Summary {}", n),
            "key_facts": "facts",
            "implementation_method": "LangChain",
            "exploration_direction": "try it",
            "link": format!("https://example.com/{}", n),
        })
    }

    #[test]
    fn complete_response_is_untouched() {
        let digest = repair(
            json!({"date": "2024-05-09", "theme": "Agents", "items": [full_item(1)]}),
            now(),
        )
        .unwrap();

        assert_eq!(digest.date, "2024-05-09");
        assert_eq!(digest.theme, "Agents");
        assert_eq!(digest.items.len(), 1);
        assert_eq!(digest.items[0].source_name, "OpenAI");
        assert_eq!(digest.items[0].implementation_method, "LangChain");
    }

    #[test]
    fn missing_theme_and_summary_get_placeholders() {
        let mut item = full_item(1);
        item.as_object_mut().unwrap().remove("summary");

        let digest = repair(json!({"date": "2024-05-10", "items": [item, full_item(2)]}), now()).unwrap();

        assert_eq!(digest.theme, DEFAULT_THEME);
        assert_eq!(digest.items[0].summary, DEFAULT_SUMMARY);
        assert_eq!(digest.items[0].title, "Title 1");
        assert_eq!(digest.items[0].erp_relevance, "🔴 High");
        assert_eq!(digest.items[0].link, "https://example.com/1");
        assert_eq!(digest.items[1].summary, "Summary 2");
    }

    #[test]
    fn empty_object_becomes_a_complete_empty_digest() {
        let digest = repair(json!({}), now()).unwrap();

        // 20:00 UTC is already the next day at UTC+8.
        assert_eq!(digest.date, "2024-05-11");
        assert_eq!(digest.theme, DEFAULT_THEME);
        assert!(digest.items.is_empty());
    }

    #[test]
    fn non_array_items_and_non_object_entries_are_dropped() {
        let digest = repair(json!({"items": "oops"}), now()).unwrap();
        assert!(digest.items.is_empty());

        let digest = repair(json!({"items": [42, {"link": "https://example.com/x"}]}), now()).unwrap();
        assert_eq!(digest.items.len(), 1);
        let item = &digest.items[0];
        assert_eq!(item.title, DEFAULT_TITLE);
        assert_eq!(item.source_type, DEFAULT_SOURCE_TYPE);
        assert_eq!(item.erp_relevance, DEFAULT_RELEVANCE);
        assert_eq!(item.summary, DEFAULT_SUMMARY);
        assert_eq!(item.key_facts, "");
    }

    #[test]
    fn null_is_missing_and_numbers_are_rendered() {
        let digest = repair(
            json!({"theme": null, "items": [{"title": null, "publish_date": 20240510}]}),
            now(),
        )
        .unwrap();

        assert_eq!(digest.theme, DEFAULT_THEME);
        assert_eq!(digest.items[0].title, DEFAULT_TITLE);
        assert_eq!(digest.items[0].publish_date, "20240510");
    }

    #[test]
    fn non_object_response_is_an_oracle_failure() {
        let err = repair(json!([1, 2, 3]), now()).unwrap_err();
        assert!(matches!(err, DigestError::Oracle { ref stage, .. } if stage == "synthesize"));
    }
}
