use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{CohortRecords, ExperienceInterval, OthersScore};

const PATENTS_WEIGHT: f64 = 2.0;
const SUPERVISION_WEIGHT: f64 = 2.0;
const COMMITTEE_WEIGHT: f64 = 1.0;
const ACCREDITATION_WEIGHT: f64 = 1.0;
const CERTIFICATES_WEIGHT: f64 = 1.0;
const AWARDS_WEIGHT: f64 = 1.0;
const MANAGEMENT_WEIGHT: f64 = 1.0;
const FUNDED_RESEARCH_WEIGHT: f64 = 2.0;

fn presence(present: bool, weight: f64) -> f64 {
    if present {
        weight
    } else {
        0.0
    }
}

fn has_administrative_role(candidate_id: Uuid, intervals: &[ExperienceInterval]) -> bool {
    intervals
        .iter()
        .any(|interval| interval.candidate_id == candidate_id && interval.administrative_role)
}

/// Funded research is relative to the current run: each candidate's summed
/// amount divided by the cohort maximum, times the weight. A zero cohort
/// maximum zeroes the signal for everyone.
fn funded_research_scores(cohort: &CohortRecords) -> HashMap<Uuid, f64> {
    let mut totals: HashMap<Uuid, f64> = HashMap::new();
    for record in &cohort.funded_research {
        *totals.entry(record.candidate_id).or_insert(0.0) += record.amount_usd;
    }

    let cohort_max = totals.values().copied().fold(0.0_f64, f64::max);

    cohort
        .candidates
        .iter()
        .map(|candidate| {
            let total = totals.get(&candidate.id).copied().unwrap_or(0.0);
            let normalized = if cohort_max > 0.0 {
                (total / cohort_max) * FUNDED_RESEARCH_WEIGHT
            } else {
                0.0
            };
            (candidate.id, normalized)
        })
        .collect()
}

pub fn score_cohort(cohort: &CohortRecords) -> Vec<OthersScore> {
    let funded = funded_research_scores(cohort);

    cohort
        .candidates
        .iter()
        .map(|candidate| {
            let id = candidate.id;
            // Membership tested against each supervision level on its own.
            let supervised = cohort.supervision_bsc.contains(&id)
                || cohort.supervision_msc.contains(&id)
                || cohort.supervision_phd.contains(&id);
            let manages = has_administrative_role(id, &cohort.teaching)
                || has_administrative_role(id, &cohort.industry);

            let score = OthersScore {
                candidate_id: id,
                patents: presence(cohort.patents.contains(&id), PATENTS_WEIGHT),
                supervision: presence(supervised, SUPERVISION_WEIGHT),
                committee_work: presence(cohort.committee_work.contains(&id), COMMITTEE_WEIGHT),
                quality_accreditation: presence(
                    cohort.quality_accreditation.contains(&id),
                    ACCREDITATION_WEIGHT,
                ),
                certificates: presence(cohort.certificates.contains(&id), CERTIFICATES_WEIGHT),
                awards: presence(cohort.awards.contains(&id), AWARDS_WEIGHT),
                management: presence(manages, MANAGEMENT_WEIGHT),
                funded_research: funded.get(&id).copied().unwrap_or(0.0),
                total: 0.0,
            };

            OthersScore {
                total: score.patents
                    + score.supervision
                    + score.committee_work
                    + score.quality_accreditation
                    + score.certificates
                    + score.awards
                    + score.management
                    + score.funded_research,
                ..score
            }
        })
        .collect()
}
