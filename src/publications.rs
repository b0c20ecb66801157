use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::error::ExtractError;
use crate::models::{
    CohortRecords, JournalRank, ParsedPublication, PublicationOutcome, PublicationScore, Quartile,
};

/// Similarity of exactly 80 is still "no match"; only strictly higher
/// scores count as a recognized venue.
const MATCH_THRESHOLD: f64 = 80.0;
const CATEGORY_CAP: f64 = 15.0;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// The extraction service as a capability: raw citation text in, a flat
/// field list out, grouped in fours (title, journal, year/volume/issue,
/// DOI) per detected publication.
pub trait Extract {
    fn extract(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<String>, ExtractError>> + Send;
}

pub struct HttpExtractor {
    client: reqwest::Client,
    endpoint: String,
    auth_token: String,
}

impl HttpExtractor {
    pub fn new(
        endpoint: String,
        auth_token: String,
        timeout: Duration,
    ) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            auth_token,
        })
    }
}

impl Extract for HttpExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<String>, ExtractError> {
        let body = serde_json::json!({ "input": { "text": text } });
        let response = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", self.auth_token),
            )
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: serde_json::Value = response.json().await?;
        parse_output(&payload)
    }
}

/// The service wraps its field list in an `output` property, either as a
/// JSON array or as a stringified one.
fn parse_output(payload: &serde_json::Value) -> Result<Vec<String>, ExtractError> {
    let output = payload
        .get("output")
        .ok_or_else(|| ExtractError::BadResponse("missing output field".to_string()))?;

    match output {
        serde_json::Value::String(raw) => serde_json::from_str(raw).map_err(|err| {
            ExtractError::BadResponse(format!("output is not a JSON list of strings: {err}"))
        }),
        other => serde_json::from_value(other.clone()).map_err(|err| {
            ExtractError::BadResponse(format!("output is not a list of strings: {err}"))
        }),
    }
}

fn validate_fields(fields: Vec<String>) -> Result<Vec<String>, ExtractError> {
    if fields.len() % 4 != 0 {
        return Err(ExtractError::UnevenFields(fields.len()));
    }
    Ok(fields)
}

async fn extract_with_retry<E: Extract>(
    extractor: &E,
    text: &str,
) -> Result<Vec<String>, ExtractError> {
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match extractor.extract(text).await.and_then(validate_fields) {
            Ok(fields) => return Ok(fields),
            Err(err) if attempt < MAX_ATTEMPTS => {
                warn!(attempt, error = %err, "extraction attempt failed, backing off");
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn token_sort_key(value: &str) -> String {
    let mut tokens: Vec<String> = value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect();
    tokens.sort();
    tokens.join(" ")
}

/// Token-order-insensitive similarity on a 0-100 scale.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&token_sort_key(a), &token_sort_key(b)) * 100.0
}

pub fn best_match<'a>(
    journal_name: &str,
    journals: &'a [JournalRank],
) -> Option<(&'a JournalRank, f64)> {
    let mut best: Option<(&JournalRank, f64)> = None;
    for entry in journals {
        let similarity = token_sort_ratio(journal_name, &entry.title);
        if best.map_or(true, |(_, current)| similarity > current) {
            best = Some((entry, similarity));
        }
    }
    best
}

fn quartile_points(quartile: Quartile) -> f64 {
    match quartile {
        Quartile::Q1 => 3.0,
        Quartile::Q2 => 2.0,
        Quartile::Q3 => 1.0,
        Quartile::Q4 | Quartile::Unranked => 0.5,
    }
}

fn contribution(similarity: f64, quartile: Quartile) -> f64 {
    if similarity > MATCH_THRESHOLD {
        quartile_points(quartile)
    } else {
        0.0
    }
}

fn fields_points(fields: &[String], journals: &[JournalRank]) -> f64 {
    let mut total = 0.0;
    for chunk in fields.chunks_exact(4) {
        if let Some((entry, similarity)) = best_match(&chunk[1], journals) {
            total += contribution(similarity, entry.quartile);
        }
    }
    total.min(CATEGORY_CAP)
}

async fn process_candidate<E>(
    pool: PgPool,
    extractor: Arc<E>,
    journals: Arc<Vec<JournalRank>>,
    candidate_id: Uuid,
    text: String,
) -> anyhow::Result<PublicationScore>
where
    E: Extract + Send + Sync,
{
    let fields = match extract_with_retry(extractor.as_ref(), &text).await {
        Ok(fields) => fields,
        Err(err) => {
            warn!(candidate = %candidate_id, error = %err, "publication score unavailable after retries");
            return Ok(PublicationScore {
                candidate_id,
                outcome: PublicationOutcome::Unavailable,
            });
        }
    };

    for (index, chunk) in fields.chunks_exact(4).enumerate() {
        let publication = ParsedPublication {
            candidate_id,
            seq: index as i32 + 1,
            title: chunk[0].clone(),
            journal: chunk[1].clone(),
            year_volume_issue: chunk[2].clone(),
            doi: chunk[3].clone(),
            source_text: text.clone(),
        };
        db::upsert_parsed_publication(&pool, &publication).await?;
    }

    Ok(PublicationScore {
        candidate_id,
        outcome: PublicationOutcome::Scored(fields_points(&fields, &journals)),
    })
}

/// Runs the pipeline across the cohort with a bounded worker pool: at most
/// `concurrency` extraction calls in flight, one per candidate. Candidates
/// without a citation blob are `NoData` and never hit the service.
pub async fn score_cohort<E>(
    pool: &PgPool,
    extractor: Arc<E>,
    cohort: &CohortRecords,
    journals: Arc<Vec<JournalRank>>,
    concurrency: usize,
) -> anyhow::Result<Vec<PublicationScore>>
where
    E: Extract + Send + Sync + 'static,
{
    let concurrency = concurrency.max(1);
    let mut scores = Vec::with_capacity(cohort.candidates.len());
    let mut tasks = JoinSet::new();

    for candidate in &cohort.candidates {
        let Some(text) = cohort.citations.get(&candidate.id) else {
            scores.push(PublicationScore {
                candidate_id: candidate.id,
                outcome: PublicationOutcome::NoData,
            });
            continue;
        };

        while tasks.len() >= concurrency {
            if let Some(joined) = tasks.join_next().await {
                scores.push(joined??);
            }
        }

        tasks.spawn(process_candidate(
            pool.clone(),
            Arc::clone(&extractor),
            Arc::clone(&journals),
            candidate.id,
            text.clone(),
        ));
    }

    while let Some(joined) = tasks.join_next().await {
        scores.push(joined??);
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn journal(title: &str, quartile: Quartile) -> JournalRank {
        JournalRank {
            title: title.to_string(),
            quartile,
        }
    }

    #[test]
    fn token_sort_ratio_is_order_insensitive() {
        let ratio = token_sort_ratio(
            "Journal of Machine Learning Research",
            "research journal, of machine learning",
        );
        assert_eq!(ratio, 100.0);
    }

    #[test]
    fn token_sort_ratio_penalizes_different_titles() {
        let ratio = token_sort_ratio("Annals of Botany", "IEEE Transactions on Robotics");
        assert!(ratio < 50.0);
    }

    #[test]
    fn best_match_returns_highest_similarity() {
        let journals = vec![
            journal("Nature Communications", Quartile::Q1),
            journal("Nature Machine Intelligence", Quartile::Q1),
            journal("Annals of Botany", Quartile::Q3),
        ];
        let (entry, similarity) = best_match("nature communications", &journals).unwrap();
        assert_eq!(entry.title, "Nature Communications");
        assert_eq!(similarity, 100.0);
    }

    #[test]
    fn similarity_of_exactly_eighty_is_not_a_match() {
        assert_eq!(contribution(80.0, Quartile::Q1), 0.0);
        assert_eq!(contribution(81.0, Quartile::Q1), 3.0);
    }

    #[test]
    fn quartile_tiers_map_to_points() {
        assert_eq!(contribution(100.0, Quartile::Q1), 3.0);
        assert_eq!(contribution(100.0, Quartile::Q2), 2.0);
        assert_eq!(contribution(100.0, Quartile::Q3), 1.0);
        assert_eq!(contribution(100.0, Quartile::Q4), 0.5);
        assert_eq!(contribution(100.0, Quartile::Unranked), 0.5);
    }

    #[test]
    fn candidate_total_caps_at_fifteen() {
        let journals = vec![journal("Nature Communications", Quartile::Q1)];
        let mut fields = Vec::new();
        for n in 0..6 {
            fields.push(format!("Paper {n}"));
            fields.push("Nature Communications".to_string());
            fields.push("2021".to_string());
            fields.push(format!("10.1000/{n}"));
        }

        assert_eq!(fields_points(&fields, &journals), 15.0);
    }

    #[test]
    fn unrecognized_venue_contributes_zero() {
        let journals = vec![journal("Nature Communications", Quartile::Q1)];
        let fields = vec![
            "An Essay".to_string(),
            "Unindexed Newsletter of Nowhere".to_string(),
            "2019".to_string(),
            "n/a".to_string(),
        ];

        assert_eq!(fields_points(&fields, &journals), 0.0);
    }

    #[test]
    fn uneven_field_count_is_rejected() {
        let fields = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(matches!(
            validate_fields(fields),
            Err(ExtractError::UnevenFields(3))
        ));
    }

    #[test]
    fn parse_output_accepts_stringified_list() {
        let payload = serde_json::json!({
            "output": "[\"Title\", \"Journal\", \"2020\", \"10.1/x\"]"
        });
        let fields = parse_output(&payload).unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[1], "Journal");
    }

    #[test]
    fn parse_output_rejects_missing_field() {
        let payload = serde_json::json!({ "result": [] });
        assert!(matches!(
            parse_output(&payload),
            Err(ExtractError::BadResponse(_))
        ));
    }

    struct FlakyExtractor {
        calls: AtomicU32,
        failures: u32,
    }

    impl FlakyExtractor {
        fn new(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
            }
        }
    }

    impl Extract for FlakyExtractor {
        async fn extract(&self, _text: &str) -> Result<Vec<String>, ExtractError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(ExtractError::BadResponse("stub outage".to_string()))
            } else {
                Ok(vec![
                    "Title".to_string(),
                    "Journal".to_string(),
                    "2020".to_string(),
                    "10.1/x".to_string(),
                ])
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_from_transient_failures() {
        let extractor = FlakyExtractor::new(2);
        let fields = extract_with_retry(&extractor, "blob").await.unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_bounded_attempts() {
        let extractor = FlakyExtractor::new(10);
        let err = extract_with_retry(&extractor, "blob").await.unwrap_err();
        assert!(matches!(err, ExtractError::BadResponse(_)));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
