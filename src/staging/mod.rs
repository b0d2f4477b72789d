//! Review staging. Each upload session owns one editable batch of
//! candidates, held in memory until the reviewer commits, cancels, or the
//! session goes idle past its TTL. Sessions never share state; mutations
//! within a session are serialized behind the store lock.

use crate::domain::{CandidateField, DateConfidence, IncidentCandidate};
use crate::error::{IngestError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// One upload session's batch, plus the pristine copies used for diffing.
struct StagedBatch {
    candidates: Vec<IncidentCandidate>,
    originals: HashMap<Uuid, IncidentCandidate>,
    last_activity: DateTime<Utc>,
}

impl StagedBatch {
    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    fn candidate_mut(&mut self, id: Uuid) -> Result<&mut IncidentCandidate> {
        self.candidates
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(IngestError::CandidateNotFound(id))
    }
}

/// Raw-versus-current value for one field of one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDiff {
    pub field: CandidateField,
    pub raw: String,
    pub current: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    pub candidate: IncidentCandidate,
    pub diffs: Vec<FieldDiff>,
}

/// Per-session staging store: a map from session id to its batch. The store
/// itself is shared; batches are not.
pub struct StagingStore {
    sessions: Mutex<HashMap<SessionId, StagedBatch>>,
    ttl: Duration,
}

impl StagingStore {
    pub fn new(session_ttl_minutes: i64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::minutes(session_ttl_minutes),
        }
    }

    /// Opens a session around a freshly parsed batch.
    pub fn create_session(&self, candidates: Vec<IncidentCandidate>) -> SessionId {
        let session_id = Uuid::new_v4();
        let originals = candidates.iter().map(|c| (c.id, c.clone())).collect();

        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(
            session_id,
            StagedBatch {
                candidates,
                originals,
                last_activity: Utc::now(),
            },
        );
        info!(session = %session_id, "staging session created");
        session_id
    }

    /// Full batch with per-field diffs between raw and normalized/enriched
    /// values.
    pub fn snapshot(&self, session: SessionId) -> Result<Vec<CandidateView>> {
        let sessions = self.sessions.lock().unwrap();
        let batch = sessions
            .get(&session)
            .ok_or(IngestError::SessionNotFound(session))?;

        Ok(batch
            .candidates
            .iter()
            .map(|candidate| CandidateView {
                candidate: candidate.clone(),
                diffs: field_diffs(batch.originals.get(&candidate.id), candidate),
            })
            .collect())
    }

    /// Overwrites one field of one candidate and clears any validation issue
    /// tied to that field. Committed candidates are immutable.
    pub fn edit_field(
        &self,
        session: SessionId,
        candidate_id: Uuid,
        field: CandidateField,
        value: &str,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let batch = sessions
            .get_mut(&session)
            .ok_or(IngestError::SessionNotFound(session))?;
        batch.touch();

        let candidate = batch.candidate_mut(candidate_id)?;
        if candidate.committed {
            return Err(IngestError::CandidateImmutable(candidate_id));
        }

        let value = value.trim();
        match field {
            CandidateField::Date => {
                let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                    IngestError::InvalidFieldValue {
                        message: format!("'{}' is not an ISO date (YYYY-MM-DD)", value),
                    }
                })?;
                candidate.normalized_date = Some(date);
                // A reviewer-entered date is trusted
                candidate.date_confidence = DateConfidence::High;
            }
            CandidateField::Division => candidate.division = value.to_string(),
            CandidateField::Description => candidate.description = value.to_string(),
            CandidateField::Quarter | CandidateField::Enrichment => {
                return Err(IngestError::InvalidFieldValue {
                    message: format!("{:?} is not directly editable", field),
                })
            }
            enrichment_field => {
                debug_assert!(enrichment_field.is_enrichment_field());
                let enrichment = candidate.enrichment.get_or_insert_with(Default::default);
                match enrichment_field {
                    CandidateField::Animals => enrichment.animals = value.to_string(),
                    CandidateField::Quantity => enrichment.quantity = value.to_string(),
                    CandidateField::Suspects => enrichment.suspects = value.to_string(),
                    CandidateField::Vehicle => enrichment.vehicle = value.to_string(),
                    CandidateField::Source => enrichment.source = value.to_string(),
                    CandidateField::Status => enrichment.status = value.to_string(),
                    CandidateField::Summary => enrichment.summary = value.to_string(),
                    CandidateField::Keywords => {
                        enrichment.keywords = value
                            .split(',')
                            .map(|k| k.trim().to_string())
                            .filter(|k| !k.is_empty())
                            .collect();
                    }
                    _ => unreachable!("non-enrichment fields handled above"),
                }
                // A manual enrichment edit also settles the enrichment block
                candidate.clear_issues_for(CandidateField::Enrichment);
            }
        }

        candidate.clear_issues_for(field);
        debug!(session = %session, candidate = %candidate_id, ?field, "field edited");
        Ok(())
    }

    /// Marks the given candidates approved for commit.
    pub fn approve(&self, session: SessionId, ids: &[Uuid]) -> Result<()> {
        self.with_batch(session, |batch| {
            for id in ids {
                let candidate = batch.candidate_mut(*id)?;
                if !candidate.committed {
                    candidate.approved = true;
                }
            }
            Ok(())
        })
    }

    /// Removes the given candidates from the batch. Committed candidates are
    /// retained for audit and cannot be rejected.
    pub fn reject(&self, session: SessionId, ids: &[Uuid]) -> Result<()> {
        self.with_batch(session, |batch| {
            for id in ids {
                batch.candidate_mut(*id)?;
            }
            batch.candidates.retain(|c| {
                if !ids.contains(&c.id) {
                    return true;
                }
                if c.committed {
                    warn!(candidate = %c.id, "refusing to reject committed candidate");
                    return true;
                }
                false
            });
            Ok(())
        })
    }

    /// Approved candidates not yet committed, in batch order.
    pub fn approved_uncommitted(&self, session: SessionId) -> Result<Vec<IncidentCandidate>> {
        let sessions = self.sessions.lock().unwrap();
        let batch = sessions
            .get(&session)
            .ok_or(IngestError::SessionNotFound(session))?;
        Ok(batch
            .candidates
            .iter()
            .filter(|c| c.approved && !c.committed)
            .cloned()
            .collect())
    }

    /// Flags successfully persisted candidates; they stay in the batch for
    /// audit but become immutable.
    pub fn mark_committed(&self, session: SessionId, ids: &[Uuid]) -> Result<()> {
        self.with_batch(session, |batch| {
            for id in ids {
                batch.candidate_mut(*id)?.committed = true;
            }
            Ok(())
        })
    }

    /// Abandons the session. Nothing has been persisted from staging by
    /// definition, so there are no storage side effects to undo.
    pub fn cancel(&self, session: SessionId) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .remove(&session)
            .ok_or(IngestError::SessionNotFound(session))?;
        info!(session = %session, "staging session cancelled");
        Ok(())
    }

    /// Drops sessions idle for longer than the TTL. Returns how many were
    /// removed.
    pub fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|id, batch| {
            let keep = batch.last_activity >= cutoff;
            if !keep {
                info!(session = %id, "staging session expired");
            }
            keep
        });
        before - sessions.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn with_batch<T>(
        &self,
        session: SessionId,
        f: impl FnOnce(&mut StagedBatch) -> Result<T>,
    ) -> Result<T> {
        let mut sessions = self.sessions.lock().unwrap();
        let batch = sessions
            .get_mut(&session)
            .ok_or(IngestError::SessionNotFound(session))?;
        batch.touch();
        f(batch)
    }
}

/// Field-level diff between the candidate as parsed and its current state.
fn field_diffs(original: Option<&IncidentCandidate>, current: &IncidentCandidate) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    let normalized = current
        .normalized_date
        .map(|d| d.to_string())
        .unwrap_or_default();
    if current.raw_date != normalized {
        diffs.push(FieldDiff {
            field: CandidateField::Date,
            raw: current.raw_date.clone(),
            current: normalized,
        });
    }

    if let Some(original) = original {
        if original.division != current.division {
            diffs.push(FieldDiff {
                field: CandidateField::Division,
                raw: original.division.clone(),
                current: current.division.clone(),
            });
        }
        if original.description != current.description {
            diffs.push(FieldDiff {
                field: CandidateField::Description,
                raw: original.description.clone(),
                current: current.description.clone(),
            });
        }
    }

    if let Some(enrichment) = &current.enrichment {
        let fields = [
            (CandidateField::Animals, enrichment.animals.clone()),
            (CandidateField::Quantity, enrichment.quantity.clone()),
            (CandidateField::Suspects, enrichment.suspects.clone()),
            (CandidateField::Vehicle, enrichment.vehicle.clone()),
            (CandidateField::Source, enrichment.source.clone()),
            (CandidateField::Status, enrichment.status.clone()),
            (CandidateField::Keywords, enrichment.keywords.join(", ")),
            (CandidateField::Summary, enrichment.summary.clone()),
        ];
        for (field, value) in fields {
            if !value.is_empty() {
                diffs.push(FieldDiff {
                    field,
                    raw: String::new(),
                    current: value,
                });
            }
        }
    }

    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Enrichment, IssueKind};

    fn candidate(description: &str) -> IncidentCandidate {
        let mut c = IncidentCandidate::new(
            "08.01.2013".to_string(),
            "Mumbai".to_string(),
            "5".to_string(),
            description.to_string(),
            None,
        );
        c.normalized_date = NaiveDate::from_ymd_opt(2013, 1, 8);
        c.date_confidence = DateConfidence::High;
        c
    }

    fn store_with_batch(count: usize) -> (StagingStore, SessionId, Vec<Uuid>) {
        let store = StagingStore::new(30);
        let candidates: Vec<_> = (0..count)
            .map(|i| candidate(&format!("incident {}", i)))
            .collect();
        let ids = candidates.iter().map(|c| c.id).collect();
        let session = store.create_session(candidates);
        (store, session, ids)
    }

    #[test]
    fn snapshot_shows_raw_versus_normalized_date() {
        let (store, session, _) = store_with_batch(1);
        let views = store.snapshot(session).unwrap();
        let date_diff = views[0]
            .diffs
            .iter()
            .find(|d| d.field == CandidateField::Date)
            .unwrap();
        assert_eq!(date_diff.raw, "08.01.2013");
        assert_eq!(date_diff.current, "2013-01-08");
    }

    #[test]
    fn edit_clears_issues_tied_to_the_field() {
        let (store, session, ids) = store_with_batch(1);
        // Seed a date issue, then fix the date
        {
            let mut sessions = store.sessions.lock().unwrap();
            sessions
                .get_mut(&session)
                .unwrap()
                .candidates[0]
                .add_issue(IssueKind::AmbiguousDate, CandidateField::Date, "seeded");
        }

        store
            .edit_field(session, ids[0], CandidateField::Date, "2013-05-10")
            .unwrap();

        let views = store.snapshot(session).unwrap();
        assert_eq!(
            views[0].candidate.normalized_date,
            NaiveDate::from_ymd_opt(2013, 5, 10)
        );
        assert_eq!(views[0].candidate.date_confidence, DateConfidence::High);
        assert!(!views[0].candidate.has_issue(IssueKind::AmbiguousDate));
    }

    #[test]
    fn date_edit_requires_iso_input() {
        let (store, session, ids) = store_with_batch(1);
        let err = store
            .edit_field(session, ids[0], CandidateField::Date, "10/05/2013")
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidFieldValue { .. }));
    }

    #[test]
    fn enrichment_edit_settles_enrichment_failure() {
        let (store, session, ids) = store_with_batch(1);
        {
            let mut sessions = store.sessions.lock().unwrap();
            sessions.get_mut(&session).unwrap().candidates[0].add_issue(
                IssueKind::EnrichmentFailed,
                CandidateField::Enrichment,
                "seeded",
            );
        }

        store
            .edit_field(session, ids[0], CandidateField::Animals, "Pangolin")
            .unwrap();

        let views = store.snapshot(session).unwrap();
        let enrichment = views[0].candidate.enrichment.as_ref().unwrap();
        assert_eq!(enrichment.animals, "Pangolin");
        assert!(!views[0].candidate.has_issue(IssueKind::EnrichmentFailed));
    }

    #[test]
    fn committed_candidates_are_immutable() {
        let (store, session, ids) = store_with_batch(1);
        store.mark_committed(session, &ids).unwrap();

        let err = store
            .edit_field(session, ids[0], CandidateField::Division, "Delhi")
            .unwrap_err();
        assert!(matches!(err, IngestError::CandidateImmutable(_)));

        // And rejection keeps them for audit
        store.reject(session, &ids).unwrap();
        assert_eq!(store.snapshot(session).unwrap().len(), 1);
    }

    #[test]
    fn reject_removes_candidates_from_the_batch() {
        let (store, session, ids) = store_with_batch(3);
        store.reject(session, &ids[1..2]).unwrap();

        let views = store.snapshot(session).unwrap();
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.candidate.id != ids[1]));
    }

    #[test]
    fn approve_flags_only_the_given_subset() {
        let (store, session, ids) = store_with_batch(3);
        store.approve(session, &ids[..2]).unwrap();

        let approved = store.approved_uncommitted(session).unwrap();
        assert_eq!(approved.len(), 2);
        assert!(approved.iter().all(|c| c.id != ids[2]));
    }

    #[test]
    fn cancel_destroys_the_session() {
        let (store, session, _) = store_with_batch(1);
        store.cancel(session).unwrap();
        assert!(matches!(
            store.snapshot(session),
            Err(IngestError::SessionNotFound(_))
        ));
    }

    #[test]
    fn idle_sessions_are_swept() {
        let (store, session, _) = store_with_batch(1);
        {
            let mut sessions = store.sessions.lock().unwrap();
            sessions.get_mut(&session).unwrap().last_activity =
                Utc::now() - Duration::minutes(90);
        }
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn sessions_are_independent() {
        let store = StagingStore::new(30);
        let a = store.create_session(vec![candidate("a")]);
        let b = store.create_session(vec![candidate("b")]);

        store.cancel(a).unwrap();
        assert_eq!(store.snapshot(b).unwrap().len(), 1);
    }
}
