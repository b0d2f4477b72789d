//! Maps scanned rows to incident candidates by fixed cell position. The
//! column order `Date, Division, Page No, Description` is a documented
//! contract of the upload format, not something detected per file.

use crate::domain::{CandidateField, IncidentCandidate, IssueKind, RawRow};
use tracing::debug;

pub const COL_DATE: usize = 0;
pub const COL_DIVISION: usize = 1;
pub const COL_PAGE_NO: usize = 2;
pub const COL_DESCRIPTION: usize = 3;

pub struct RowParser;

impl RowParser {
    pub fn parse_batch(rows: &[RawRow]) -> Vec<IncidentCandidate> {
        rows.iter().filter_map(Self::parse_row).collect()
    }

    /// One candidate per retained row. Extra cells are ignored, missing
    /// cells read as empty. A row without a description carries no incident
    /// and is dropped (non-fatal).
    pub fn parse_row(row: &RawRow) -> Option<IncidentCandidate> {
        let cell = |index: usize| {
            row.cells
                .get(index)
                .map(|c| c.trim().to_string())
                .unwrap_or_default()
        };

        let description = cell(COL_DESCRIPTION);
        if description.is_empty() {
            debug!(row = row.source_index, "dropping row without description");
            return None;
        }

        let division = cell(COL_DIVISION);
        let mut candidate = IncidentCandidate::new(
            cell(COL_DATE),
            division.clone(),
            cell(COL_PAGE_NO),
            description,
            row.context.clone(),
        );

        if division.is_empty() {
            candidate.add_issue(
                IssueKind::MissingLocation,
                CandidateField::Division,
                "row has no division/location",
            );
        }

        if candidate.quarter.is_none() {
            candidate.add_issue(
                IssueKind::MissingContext,
                CandidateField::Quarter,
                "row appeared before any quarter header",
            );
        }

        Some(candidate)
    }
}
