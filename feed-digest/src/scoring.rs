use crate::oracle::Oracle;
use crate::prompts;
use crate::types::{CandidateEntry, DigestError, Result, ScoredEntry};
use crate::utils::text;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};

pub const DEFAULT_TOP_K: usize = 3;
pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_SNIPPET_CHARS: usize = 160;

/// Size-bounded view of a candidate sent to the scoring oracle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactEntry {
    pub title: String,
    pub link: String,
    pub published: String,
    pub snippet: String,
}

pub fn compact_for_scoring(candidates: &[CandidateEntry]) -> Vec<CompactEntry> {
    candidates
        .iter()
        .map(|c| CompactEntry {
            title: text::take_chars(&c.title, MAX_TITLE_CHARS),
            link: c.link.clone(),
            published: c.published_raw.clone(),
            snippet: text::truncate_with_ellipsis(c.summary.trim(), MAX_SNIPPET_CHARS),
        })
        .collect()
}

/// One `{link, score, reason}` row as the oracle returned it.
#[derive(Debug, Clone, PartialEq)]
struct OracleScore {
    link: String,
    score: f64,
    reason: String,
}

/// Ask the oracle to score `candidates` and keep the best `k`.
///
/// An oracle failure is fatal and returned as `DigestError::Oracle`. Rows whose
/// link is not among the candidates are dropped before `k` is applied.
pub async fn score(oracle: &dyn Oracle, candidates: &[CandidateEntry], k: usize) -> Result<Vec<ScoredEntry>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let compact = serde_json::to_string_pretty(&compact_for_scoring(candidates))?;
    let user_prompt = prompts::scoring_user_prompt(candidates.len(), &compact);

    info!("Scoring {} candidates with {}", candidates.len(), oracle.name());
    let response = oracle
        .call_json(prompts::SCORING_SYSTEM_PROMPT, &user_prompt)
        .await
        .map_err(|e| {
            error!("Scoring oracle call failed: {}", e);
            DigestError::oracle("score", e.to_string())
        })?;

    let rows = parse_scores(&response)?;
    let top = select_top(candidates, rows, k);

    info!("Scoring complete, top {}: {} entries", k, top.len());
    Ok(top)
}

fn parse_scores(response: &Value) -> Result<Vec<OracleScore>> {
    let rows = match response {
        Value::Array(rows) => rows,
        Value::Object(map) => match map.get("scores") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(DigestError::oracle("score", "response has no \"scores\" array")),
        },
        _ => return Err(DigestError::oracle("score", "response is neither an object nor an array")),
    };

    Ok(rows
        .iter()
        .filter_map(|row| {
            let Some(link) = row.get("link").and_then(Value::as_str) else {
                warn!("Dropping score row without a link: {}", row);
                return None;
            };
            Some(OracleScore {
                link: link.to_string(),
                score: score_value(row.get("score")),
                reason: row
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect())
}

fn score_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Join rows back to candidates, rank by score descending, and cut to `k`.
/// Equal scores keep candidate order.
fn select_top(candidates: &[CandidateEntry], rows: Vec<OracleScore>, k: usize) -> Vec<ScoredEntry> {
    let index_by_link: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .rev()
        .map(|(i, c)| (c.link.as_str(), i))
        .collect();

    let mut seen = HashSet::new();
    let mut matched: Vec<(usize, OracleScore)> = Vec::with_capacity(rows.len());
    for row in rows {
        match index_by_link.get(row.link.as_str()) {
            Some(&index) => {
                if seen.insert(index) {
                    matched.push((index, row));
                }
            }
            None => warn!("Oracle scored an unknown link, ignoring: {}", row.link),
        }
    }

    matched.sort_by(|(ia, a), (ib, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(ia.cmp(ib))
    });

    matched
        .into_iter()
        .take(k)
        .map(|(index, row)| ScoredEntry {
            entry: candidates[index].clone(),
            score: row.score,
            reason: row.reason,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fingerprint;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedOracle {
        response: Result<Value>,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedOracle {
        fn ok(response: Value) -> Self {
            Self {
                response: Ok(response),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Oracle for FixedOracle {
        fn name(&self) -> String {
            "fixed".to_string()
        }

        async fn call_json(&self, _system_prompt: &str, user_prompt: &str) -> Result<Value> {
            self.prompts.lock().unwrap().push(user_prompt.to_string());
            match &self.response {
                Ok(value) => Ok(value.clone()),
                Err(e) => Err(DigestError::oracle("fixed", e.to_string())),
            }
        }
    }

    fn candidates(n: usize) -> Vec<CandidateEntry> {
        (0..n)
            .map(|i| {
                let link = format!("https://example.com/{}", i);
                CandidateEntry {
                    title: format!("Entry {}", i),
                    fingerprint: fingerprint(&link),
                    link,
                    summary: format!("Summary {}", i),
                    published_at: Utc::now(),
                    published_raw: "Fri, 10 May 2024 10:00:00 GMT".to_string(),
                }
            })
            .collect()
    }

    #[test]
    fn compact_projection_bounds_title_and_snippet() {
        let mut input = candidates(1);
        input[0].title = "t".repeat(300);
        input[0].summary = format!("  {}  ", "s".repeat(400));

        let compact = compact_for_scoring(&input);

        assert_eq!(compact[0].title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(compact[0].snippet.chars().count(), MAX_SNIPPET_CHARS + 3);
        assert!(compact[0].snippet.starts_with('s'));
        assert_eq!(compact[0].link, "https://example.com/0");
        assert_eq!(compact[0].published, "Fri, 10 May 2024 10:00:00 GMT");
    }

    #[tokio::test]
    async fn keeps_top_k_by_descending_score() {
        let input = candidates(10);
        let rows: Vec<Value> = (0..10)
            .map(|i| json!({"link": format!("https://example.com/{}", i), "score": i as f64 * 0.5, "reason": format!("r{}", i)}))
            .collect();
        let oracle = FixedOracle::ok(json!({ "scores": rows }));

        let top = score(&oracle, &input, 3).await.unwrap();

        let links: Vec<&str> = top.iter().map(|s| s.link()).collect();
        assert_eq!(
            links,
            vec!["https://example.com/9", "https://example.com/8", "https://example.com/7"]
        );
        assert_eq!(top[0].score, 4.5);
        assert_eq!(top[0].reason, "r9");
        assert!(oracle.prompts.lock().unwrap()[0].contains("10 feed entries"));
    }

    #[tokio::test]
    async fn unknown_links_do_not_count_against_k() {
        let input = candidates(4);
        let oracle = FixedOracle::ok(json!({"scores": [
            {"link": "https://elsewhere.example/x", "score": 10, "reason": "hallucinated"},
            {"link": "https://example.com/0", "score": 2, "reason": "a"},
            {"link": "https://example.com/1", "score": 9, "reason": "b"},
            {"link": "https://example.com/2", "score": 5, "reason": "c"},
            {"link": "https://example.com/3", "score": 1, "reason": "d"},
        ]}));

        let top = score(&oracle, &input, 3).await.unwrap();

        let links: Vec<&str> = top.iter().map(|s| s.link()).collect();
        assert_eq!(
            links,
            vec!["https://example.com/1", "https://example.com/2", "https://example.com/0"]
        );
    }

    #[tokio::test]
    async fn ties_keep_candidate_order() {
        let input = candidates(3);
        let oracle = FixedOracle::ok(json!([
            {"link": "https://example.com/2", "score": 7, "reason": ""},
            {"link": "https://example.com/0", "score": 7, "reason": ""},
            {"link": "https://example.com/1", "score": "7", "reason": ""},
        ]));

        let top = score(&oracle, &input, 3).await.unwrap();

        let links: Vec<&str> = top.iter().map(|s| s.link()).collect();
        assert_eq!(
            links,
            vec!["https://example.com/0", "https://example.com/1", "https://example.com/2"]
        );
    }

    #[tokio::test]
    async fn zero_usable_rows_is_an_empty_success() {
        let input = candidates(2);
        let oracle = FixedOracle::ok(json!({"scores": [
            {"score": 9, "reason": "no link"},
            {"link": "https://elsewhere.example/y", "score": 8},
        ]}));

        assert!(score(&oracle, &input, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_rows_keep_the_first() {
        let input = candidates(2);
        let oracle = FixedOracle::ok(json!({"scores": [
            {"link": "https://example.com/0", "score": 3, "reason": "first"},
            {"link": "https://example.com/0", "score": 9, "reason": "second"},
        ]}));

        let top = score(&oracle, &input, 3).await.unwrap();

        assert_eq!(top.len(), 1);
        assert_eq!(top[0].reason, "first");
    }

    #[tokio::test]
    async fn oracle_failure_and_wrong_shape_are_fatal() {
        let input = candidates(2);

        let failing = FixedOracle {
            response: Err(DigestError::oracle("fixed", "boom")),
            prompts: Mutex::new(Vec::new()),
        };
        let err = score(&failing, &input, 3).await.unwrap_err();
        assert!(matches!(err, DigestError::Oracle { ref stage, .. } if stage == "score"));

        let wrong_shape = FixedOracle::ok(json!({"results": []}));
        assert!(score(&wrong_shape, &input, 3).await.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn empty_candidates_skip_the_oracle() {
        let oracle = FixedOracle::ok(json!({"scores": []}));
        assert!(score(&oracle, &[], 3).await.unwrap().is_empty());
        assert!(oracle.prompts.lock().unwrap().is_empty());
    }
}
