use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::DegreeLevel;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("candidate {candidate_id}: rank table needs a {level} degree record but none exists")]
    MissingDegreeRecord {
        candidate_id: Uuid,
        level: DegreeLevel,
    },
    #[error("candidate {candidate_id}: interval starting {start} has no end date and is not marked current")]
    MalformedInterval { candidate_id: Uuid, start: NaiveDate },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("extraction response malformed: {0}")]
    BadResponse(String),
    #[error("extraction returned {0} fields, not a multiple of 4")]
    UnevenFields(usize),
}
