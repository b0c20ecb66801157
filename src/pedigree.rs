use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::error::ScoringError;
use crate::models::{CategoryScore, DegreeLevel, DegreeRecord};

const PHD_TOP_BASE: f64 = 15.0;
const PHD_OUTSIDE_BASE: f64 = 11.5;
const NO_PHD_BASE: f64 = 5.0;

/// Rank 100 itself counts as Top100; only strictly worse ranks fall outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RankTier {
    Top100,
    Outside,
}

fn tier(rank: i32) -> RankTier {
    if rank <= 100 {
        RankTier::Top100
    } else {
        RankTier::Outside
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DegreeSet {
    pub bsc: Option<i32>,
    pub msc: Option<i32>,
    pub phd: Option<i32>,
}

pub fn degree_lookup(records: &[DegreeRecord]) -> HashMap<Uuid, DegreeSet> {
    let mut lookup: HashMap<Uuid, DegreeSet> = HashMap::new();
    for record in records {
        let entry = lookup.entry(record.candidate_id).or_default();
        match record.level {
            DegreeLevel::Bsc => entry.bsc = Some(record.university_rank),
            DegreeLevel::Msc => entry.msc = Some(record.university_rank),
            DegreeLevel::Phd => entry.phd = Some(record.university_rank),
        }
    }
    lookup
}

/// Rank decision table over (PhD tier, MSc tier, BSc tier). Any level a
/// branch references must have a degree record; the "both outside top 100"
/// deduction is 6 in both PhD branches.
pub fn score(candidate_id: Uuid, degrees: &DegreeSet) -> Result<f64, ScoringError> {
    use RankTier::*;

    let require = |rank: Option<i32>, level: DegreeLevel| {
        rank.ok_or(ScoringError::MissingDegreeRecord {
            candidate_id,
            level,
        })
    };

    let bsc = tier(require(degrees.bsc, DegreeLevel::Bsc)?);
    let score = match degrees.phd.map(tier) {
        Some(phd) => {
            let msc = tier(require(degrees.msc, DegreeLevel::Msc)?);
            let base = match phd {
                Top100 => PHD_TOP_BASE,
                Outside => PHD_OUTSIDE_BASE,
            };
            match (msc, bsc) {
                (Top100, Top100) => base,
                (Outside, Outside) => base - 6.0,
                _ => base - 5.0,
            }
        }
        None => match (degrees.msc.map(tier), bsc) {
            (None, Top100) => NO_PHD_BASE - 2.5,
            (None, Outside) => NO_PHD_BASE / 3.0,
            (Some(Top100), Top100) => NO_PHD_BASE,
            (Some(Outside), Outside) => NO_PHD_BASE - 2.5,
            (Some(_), _) => NO_PHD_BASE - 5.0 / 3.5,
        },
    };

    Ok(score)
}

/// Scores the whole cohort. A candidate whose degree records cannot satisfy
/// the rank table is excluded (never defaulted to zero) and warned.
pub fn score_cohort(
    candidates: &[crate::models::Candidate],
    degrees: &[DegreeRecord],
) -> Vec<CategoryScore> {
    let lookup = degree_lookup(degrees);
    let mut scores = Vec::new();

    for candidate in candidates {
        let set = lookup.get(&candidate.id).copied().unwrap_or_default();
        match score(candidate.id, &set) {
            Ok(value) => scores.push(CategoryScore {
                candidate_id: candidate.id,
                score: value,
            }),
            Err(err) => warn!(candidate = %candidate.id, error = %err, "excluding candidate from pedigree scores"),
        }
    }

    scores
}
