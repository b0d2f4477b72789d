//! Per-record LLM enrichment. Each candidate's description goes to an
//! external extraction service through the [`ExtractionService`] port;
//! responses come back as loose JSON and are decoded through a narrow typed
//! contract where every missing or mistyped field maps to a documented
//! default. A failed, malformed or slow call only ever affects its own
//! candidate.

use crate::domain::{CandidateField, Enrichment, IncidentCandidate, IssueKind};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

/// Case status assumed when the extraction response does not state one.
pub const DEFAULT_STATUS: &str = "Reported";

/// Request DTO sent to the extraction service.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    pub description: String,
    pub location: String,
}

/// Port to the external extraction collaborator.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Value>;
}

/// HTTP implementation posting the request as JSON.
pub struct HttpExtractionService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExtractionService {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ExtractionService for HttpExtractionService {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Extraction {
                message: format!("extraction service returned {}", status),
            });
        }

        Ok(response.json().await?)
    }
}

impl Enrichment {
    /// Validating decoder for the extraction response. Missing or mistyped
    /// fields become their documented defaults (empty text, empty keyword
    /// list, status `Reported`) instead of errors.
    pub fn decode(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let status = {
            let s = text("status");
            if s.is_empty() {
                DEFAULT_STATUS.to_string()
            } else {
                s
            }
        };

        let keywords = value
            .get("keywords")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Enrichment {
            animals: text("animals"),
            quantity: text("quantity"),
            suspects: text("suspects"),
            vehicle: text("vehicle"),
            source: text("source"),
            status,
            keywords,
            summary: text("summary"),
        }
    }
}

/// Runs enrichment across a batch with bounded parallelism and a per-call
/// timeout. Results are reassembled by candidate id, so completion order is
/// irrelevant.
pub struct EnrichmentAgent {
    service: Arc<dyn ExtractionService>,
    max_in_flight: usize,
    call_timeout: Duration,
}

impl EnrichmentAgent {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        max_in_flight: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            service,
            max_in_flight: max_in_flight.max(1),
            call_timeout,
        }
    }

    pub async fn enrich_batch(&self, candidates: &mut [IncidentCandidate]) {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut calls: JoinSet<(Uuid, std::result::Result<Enrichment, String>)> = JoinSet::new();

        for candidate in candidates.iter() {
            let request = ExtractionRequest {
                description: candidate.description.clone(),
                location: candidate.division.clone(),
            };
            let id = candidate.id;
            let service = self.service.clone();
            let semaphore = semaphore.clone();
            let call_timeout = self.call_timeout;

            calls.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (id, Err("enrichment pool closed".to_string())),
                };

                let outcome = match tokio::time::timeout(call_timeout, service.extract(&request))
                    .await
                {
                    Ok(Ok(value)) => Ok(Enrichment::decode(&value)),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "extraction call exceeded {}s timeout",
                        call_timeout.as_secs()
                    )),
                };
                (id, outcome)
            });
        }

        let mut outcomes: HashMap<Uuid, std::result::Result<Enrichment, String>> = HashMap::new();
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((id, outcome)) => {
                    outcomes.insert(id, outcome);
                }
                Err(e) => warn!("enrichment task did not complete: {}", e),
            }
        }

        for candidate in candidates.iter_mut() {
            match outcomes.remove(&candidate.id) {
                Some(Ok(mut enrichment)) => {
                    debug!(candidate = %candidate.id, "enrichment succeeded");
                    // Keep locally detected species when the service names none
                    if enrichment.animals.is_empty() {
                        if let Some(existing) = &candidate.enrichment {
                            enrichment.animals = existing.animals.clone();
                        }
                    }
                    candidate.enrichment = Some(enrichment);
                    candidate.ai_enriched = true;
                }
                Some(Err(reason)) => {
                    warn!(candidate = %candidate.id, reason = %reason, "enrichment failed");
                    candidate.ai_enriched = false;
                    candidate.add_issue(
                        IssueKind::EnrichmentFailed,
                        CandidateField::Enrichment,
                        reason,
                    );
                }
                None => {
                    candidate.ai_enriched = false;
                    candidate.add_issue(
                        IssueKind::EnrichmentFailed,
                        CandidateField::Enrichment,
                        "enrichment task did not complete",
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Mock service: fails for descriptions containing a marker, optionally
    /// sleeps longer than the agent timeout, records peak concurrency.
    struct MockExtraction {
        delay: Option<Duration>,
        in_flight: Mutex<usize>,
        peak: Mutex<usize>,
    }

    impl MockExtraction {
        fn new() -> Self {
            Self {
                delay: None,
                in_flight: Mutex::new(0),
                peak: Mutex::new(0),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ExtractionService for MockExtraction {
        async fn extract(&self, request: &ExtractionRequest) -> Result<Value> {
            {
                let mut in_flight = self.in_flight.lock().unwrap();
                *in_flight += 1;
                let mut peak = self.peak.lock().unwrap();
                *peak = (*peak).max(*in_flight);
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            *self.in_flight.lock().unwrap() -= 1;

            if request.description.contains("FAIL") {
                return Err(IngestError::Extraction {
                    message: "synthetic failure".to_string(),
                });
            }
            Ok(json!({
                "animals": format!("animals for {}", request.description),
                "quantity": "2 tusks",
                "status": "Under Investigation",
                "keywords": ["ivory", "seizure"],
                "summary": "Tusks seized."
            }))
        }
    }

    fn batch(descriptions: &[&str]) -> Vec<IncidentCandidate> {
        descriptions
            .iter()
            .map(|d| {
                IncidentCandidate::new(
                    "08.01.2013".to_string(),
                    "Mumbai".to_string(),
                    "5".to_string(),
                    d.to_string(),
                    None,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn one_failure_leaves_neighbours_untouched() {
        let agent = EnrichmentAgent::new(
            Arc::new(MockExtraction::new()),
            4,
            Duration::from_secs(5),
        );
        let mut candidates = batch(&["first", "second", "FAIL third", "fourth", "fifth"]);
        agent.enrich_batch(&mut candidates).await;

        for (index, candidate) in candidates.iter().enumerate() {
            if index == 2 {
                assert!(!candidate.ai_enriched);
                assert!(candidate.enrichment.is_none());
                assert!(candidate.has_issue(IssueKind::EnrichmentFailed));
            } else {
                assert!(candidate.ai_enriched, "candidate {} should be enriched", index);
                let enrichment = candidate.enrichment.as_ref().unwrap();
                assert_eq!(
                    enrichment.animals,
                    format!("animals for {}", candidate.description)
                );
                assert!(!candidate.has_issue(IssueKind::EnrichmentFailed));
            }
        }
    }

    #[tokio::test]
    async fn timeout_counts_as_local_failure() {
        let agent = EnrichmentAgent::new(
            Arc::new(MockExtraction::slow(Duration::from_millis(200))),
            2,
            Duration::from_millis(20),
        );
        let mut candidates = batch(&["slow one"]);
        agent.enrich_batch(&mut candidates).await;

        assert!(!candidates[0].ai_enriched);
        assert!(candidates[0].has_issue(IssueKind::EnrichmentFailed));
    }

    #[tokio::test]
    async fn parallelism_never_exceeds_the_bound() {
        let service = Arc::new(MockExtraction::slow(Duration::from_millis(30)));
        let agent = EnrichmentAgent::new(service.clone(), 2, Duration::from_secs(5));
        let mut candidates = batch(&["a", "b", "c", "d", "e", "f"]);
        agent.enrich_batch(&mut candidates).await;

        assert!(*service.peak.lock().unwrap() <= 2);
        assert!(candidates.iter().all(|c| c.ai_enriched));
    }

    #[tokio::test]
    async fn locally_detected_species_survive_the_service() {
        struct NoAnimals;

        #[async_trait]
        impl ExtractionService for NoAnimals {
            async fn extract(&self, request: &ExtractionRequest) -> Result<Value> {
                if request.description.contains("FAIL") {
                    return Err(IngestError::Extraction {
                        message: "synthetic failure".to_string(),
                    });
                }
                Ok(json!({ "summary": "No species named." }))
            }
        }

        let agent = EnrichmentAgent::new(Arc::new(NoAnimals), 2, Duration::from_secs(5));
        let mut candidates = batch(&["Ivory tusks seized", "FAIL pangolin case"]);
        crate::detect::AnimalDetector::annotate_batch(&mut candidates);
        agent.enrich_batch(&mut candidates).await;

        // Success with no animals in the response keeps the local detection
        assert!(candidates[0].ai_enriched);
        assert_eq!(candidates[0].enrichment.as_ref().unwrap().animals, "Ivory");

        // Failure leaves the locally seeded enrichment in place
        assert!(!candidates[1].ai_enriched);
        assert!(candidates[1].has_issue(IssueKind::EnrichmentFailed));
        assert_eq!(
            candidates[1].enrichment.as_ref().unwrap().animals,
            "Pangolin"
        );
    }

    #[test]
    fn decoder_defaults_missing_and_mistyped_fields() {
        let enrichment = Enrichment::decode(&json!({
            "animals": "Elephant tusks",
            "quantity": 42,             // wrong type -> default
            "keywords": "not-a-list",   // wrong type -> default
        }));
        assert_eq!(enrichment.animals, "Elephant tusks");
        assert_eq!(enrichment.quantity, "");
        assert!(enrichment.keywords.is_empty());
        assert_eq!(enrichment.status, DEFAULT_STATUS);
        assert_eq!(enrichment.summary, "");

        let empty = Enrichment::decode(&json!("totally malformed"));
        assert_eq!(empty, Enrichment { status: DEFAULT_STATUS.to_string(), ..Default::default() });
    }
}
