//! Date normalization. Tries a fixed, ordered list of date patterns against
//! the raw cell text; when none matches, falls back to the surrounding
//! quarter window. A date is never silently discarded or auto-corrected to
//! fit the window — mismatches are flagged and left to the reviewer.

use crate::domain::{CandidateField, DateConfidence, IncidentCandidate, IssueKind};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// `DD.MM.YYYY`
static DOTTED_DMY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").expect("valid regex"));

/// `Month YYYY` (full or abbreviated month name)
static MONTH_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)\.?,?\s+(\d{4})$").expect("valid regex"));

/// `DD Month YYYY`, ordinal suffixes tolerated
static DAY_MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})\s*(?:st|nd|rd|th)?\s+([A-Za-z]+)\.?,?\s+(\d{4})$")
        .expect("valid regex")
});

/// ISO `YYYY-MM-DD`
static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid regex"));

pub struct DateNormalizer;

impl DateNormalizer {
    pub fn normalize_batch(candidates: &mut [IncidentCandidate]) {
        for candidate in candidates.iter_mut() {
            Self::normalize(candidate);
        }
    }

    /// Resolves a candidate's raw date text, in order: pattern match
    /// (confidence high), quarter-start fallback (low, `ambiguous_date`),
    /// or nothing (`missing_date`). Any produced date outside the quarter
    /// window keeps its value but is capped at medium confidence and
    /// flagged `date_out_of_range`.
    pub fn normalize(candidate: &mut IncidentCandidate) {
        match parse_date(&candidate.raw_date) {
            Some(date) => {
                candidate.normalized_date = Some(date);
                candidate.date_confidence = DateConfidence::High;
            }
            None => match candidate.quarter.clone() {
                Some(quarter) => {
                    debug!(
                        candidate = %candidate.id,
                        raw = %candidate.raw_date,
                        fallback = %quarter.start,
                        "date fell back to quarter start"
                    );
                    candidate.normalized_date = Some(quarter.start);
                    candidate.date_confidence = DateConfidence::Low;
                    candidate.add_issue(
                        IssueKind::AmbiguousDate,
                        CandidateField::Date,
                        format!(
                            "'{}' matched no known date format; assumed quarter start {}",
                            candidate.raw_date, quarter.start
                        ),
                    );
                }
                None => {
                    candidate.normalized_date = None;
                    candidate.add_issue(
                        IssueKind::MissingDate,
                        CandidateField::Date,
                        format!(
                            "'{}' matched no known date format and no quarter context is available",
                            candidate.raw_date
                        ),
                    );
                }
            },
        }

        if let (Some(date), Some(quarter)) = (candidate.normalized_date, candidate.quarter.clone())
        {
            if !quarter.contains(date) {
                candidate.date_confidence = candidate.date_confidence.min(DateConfidence::Medium);
                candidate.add_issue(
                    IssueKind::DateOutOfRange,
                    CandidateField::Date,
                    format!(
                        "{} falls outside quarter window {} – {}",
                        date, quarter.start, quarter.end
                    ),
                );
            }
        }
    }
}

/// Tries the documented patterns in order; the first textual match that is
/// also a valid calendar date wins. A textual match with an impossible
/// date (e.g. `31.02.2013`) falls through to the remaining patterns.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(captures) = DOTTED_DMY_RE.captures(text) {
        let date = ymd(&captures[3], &captures[2], &captures[1]);
        if date.is_some() {
            return date;
        }
    }

    if let Some(captures) = MONTH_YEAR_RE.captures(text) {
        if let Some(month) = month_from_name(&captures[1]) {
            if let Some(date) = NaiveDate::from_ymd_opt(captures[2].parse().ok()?, month, 1) {
                return Some(date);
            }
        }
    }

    if let Some(captures) = DAY_MONTH_YEAR_RE.captures(text) {
        if let Some(month) = month_from_name(&captures[2]) {
            let date = NaiveDate::from_ymd_opt(
                captures[3].parse().ok()?,
                month,
                captures[1].parse().ok()?,
            );
            if date.is_some() {
                return date;
            }
        }
    }

    if let Some(captures) = ISO_RE.captures(text) {
        let date = ymd(&captures[1], &captures[2], &captures[3]);
        if date.is_some() {
            return date;
        }
    }

    None
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Month number from a full or 3-letter English month name.
pub(crate) fn month_from_name(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    if name.len() < 3 {
        return None;
    }
    let month = match &name[..3] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    // Reject things like "janitor 2013": a longer token must be the full name
    let full = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ][month - 1];
    if name.len() > 3 && name != full {
        return None;
    }
    Some(month as u32)
}
