use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::models::{
    Candidate, CategoryScore, OthersScore, PublicationOutcome, PublicationScore, TotalScore,
};

fn category_lookup(scores: &[CategoryScore]) -> HashMap<Uuid, f64> {
    scores
        .iter()
        .map(|score| (score.candidate_id, score.score))
        .collect()
}

/// Inner join of the five category outputs on candidate identity. A gap in
/// any category drops the candidate from the final result with a warning;
/// missing categories are never treated as zero.
pub fn join_scores(
    candidates: &[Candidate],
    pedigree: &[CategoryScore],
    teaching: &[CategoryScore],
    industry: &[CategoryScore],
    others: &[OthersScore],
    publications: &[PublicationScore],
) -> Vec<TotalScore> {
    let pedigree = category_lookup(pedigree);
    let teaching = category_lookup(teaching);
    let industry = category_lookup(industry);
    let others: HashMap<Uuid, f64> = others
        .iter()
        .map(|score| (score.candidate_id, score.total))
        .collect();
    let publications: HashMap<Uuid, &PublicationOutcome> = publications
        .iter()
        .map(|score| (score.candidate_id, &score.outcome))
        .collect();

    let mut totals = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let gap = |category: &str| {
            warn!(
                candidate = %candidate.id,
                category,
                "candidate missing from category output, dropped from totals"
            );
        };

        let Some(pedigree_score) = pedigree.get(&candidate.id).copied() else {
            gap("pedigree");
            continue;
        };
        let Some(teaching_score) = teaching.get(&candidate.id).copied() else {
            gap("teaching");
            continue;
        };
        let Some(industry_score) = industry.get(&candidate.id).copied() else {
            gap("industry");
            continue;
        };
        let Some(others_score) = others.get(&candidate.id).copied() else {
            gap("others");
            continue;
        };
        let publications_score = match publications.get(&candidate.id) {
            Some(PublicationOutcome::Scored(score)) => *score,
            Some(PublicationOutcome::NoData) => 0.0,
            Some(PublicationOutcome::Unavailable) => {
                gap("publications");
                continue;
            }
            None => {
                gap("publications");
                continue;
            }
        };

        totals.push(TotalScore {
            candidate_id: candidate.id,
            pedigree_score,
            teaching_score,
            industry_score,
            others_score,
            publications_score,
            total_score: pedigree_score
                + teaching_score
                + industry_score
                + others_score
                + publications_score,
        });
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: Uuid) -> Candidate {
        Candidate {
            id,
            full_name: "Lina Farouk".to_string(),
            email: format!("{id}@example.com"),
        }
    }

    fn category(id: Uuid, score: f64) -> CategoryScore {
        CategoryScore {
            candidate_id: id,
            score,
        }
    }

    fn others(id: Uuid, total: f64) -> OthersScore {
        OthersScore {
            candidate_id: id,
            patents: 0.0,
            supervision: 0.0,
            committee_work: 0.0,
            quality_accreditation: 0.0,
            certificates: 0.0,
            awards: 0.0,
            management: 0.0,
            funded_research: 0.0,
            total,
        }
    }

    fn publication(id: Uuid, outcome: PublicationOutcome) -> PublicationScore {
        PublicationScore {
            candidate_id: id,
            outcome,
        }
    }

    #[test]
    fn total_is_the_sum_of_all_five_categories() {
        let id = Uuid::new_v4();
        let totals = join_scores(
            &[candidate(id)],
            &[category(id, 15.0)],
            &[category(id, 12.0)],
            &[category(id, 3.5)],
            &[others(id, 6.0)],
            &[publication(id, PublicationOutcome::Scored(9.0))],
        );

        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].total_score, 45.5);
    }

    #[test]
    fn no_publication_data_counts_as_zero() {
        let id = Uuid::new_v4();
        let totals = join_scores(
            &[candidate(id)],
            &[category(id, 10.0)],
            &[category(id, 5.0)],
            &[category(id, 1.0)],
            &[others(id, 2.0)],
            &[publication(id, PublicationOutcome::NoData)],
        );

        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].publications_score, 0.0);
        assert_eq!(totals[0].total_score, 18.0);
    }

    #[test]
    fn unavailable_publications_drop_the_candidate() {
        let id = Uuid::new_v4();
        let totals = join_scores(
            &[candidate(id)],
            &[category(id, 10.0)],
            &[category(id, 5.0)],
            &[category(id, 1.0)],
            &[others(id, 2.0)],
            &[publication(id, PublicationOutcome::Unavailable)],
        );

        assert!(totals.is_empty());
    }

    #[test]
    fn category_gap_drops_only_the_affected_candidate() {
        let kept = Uuid::new_v4();
        let dropped = Uuid::new_v4();
        let totals = join_scores(
            &[candidate(kept), candidate(dropped)],
            &[category(kept, 10.0)],
            &[category(kept, 5.0), category(dropped, 5.0)],
            &[category(kept, 1.0), category(dropped, 1.0)],
            &[others(kept, 2.0), others(dropped, 2.0)],
            &[
                publication(kept, PublicationOutcome::Scored(3.0)),
                publication(dropped, PublicationOutcome::Scored(3.0)),
            ],
        );

        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].candidate_id, kept);
    }
}
