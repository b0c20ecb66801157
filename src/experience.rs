use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;
use uuid::Uuid;

use crate::error::ScoringError;
use crate::models::{Candidate, CategoryScore, ExperienceInterval};

/// One long tenure must not dominate: each interval contributes at most
/// five years.
const MAX_YEARS_PER_INTERVAL: f64 = 5.0;
const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, Copy)]
pub struct RateTable {
    pub per_year: f64,
    /// Lower rate for intervals in an Arabic-speaking country; None means
    /// one flat rate regardless of locale.
    pub reduced_per_year: Option<f64>,
    pub cap: f64,
}

pub const TEACHING_RATES: RateTable = RateTable {
    per_year: 3.0,
    reduced_per_year: Some(2.0),
    cap: 15.0,
};

pub const INDUSTRY_RATES: RateTable = RateTable {
    per_year: 1.0,
    reduced_per_year: None,
    cap: 5.0,
};

const ARABIC_SPEAKING_COUNTRIES: [&str; 22] = [
    "Algeria",
    "Bahrain",
    "Comoros",
    "Djibouti",
    "Egypt",
    "Iraq",
    "Jordan",
    "Kuwait",
    "Lebanon",
    "Libya",
    "Mauritania",
    "Morocco",
    "Oman",
    "Palestine",
    "Qatar",
    "Saudi Arabia",
    "Somalia",
    "Sudan",
    "Syria",
    "Tunisia",
    "United Arab Emirates",
    "Yemen",
];

fn is_arabic_speaking(country: &str) -> bool {
    ARABIC_SPEAKING_COUNTRIES
        .iter()
        .any(|entry| entry.eq_ignore_ascii_case(country.trim()))
}

/// Clamped duration in years, with `as_of` standing in for the end date of
/// ongoing intervals. Reproducibility requires `as_of` to come in as a
/// parameter rather than from the wall clock.
fn interval_years(interval: &ExperienceInterval, as_of: NaiveDate) -> Result<f64, ScoringError> {
    let end = if interval.is_current {
        as_of
    } else {
        interval.end_date.ok_or(ScoringError::MalformedInterval {
            candidate_id: interval.candidate_id,
            start: interval.start_date,
        })?
    };

    let years = (end - interval.start_date).num_days() as f64 / DAYS_PER_YEAR;
    Ok(years.clamp(0.0, MAX_YEARS_PER_INTERVAL))
}

fn rate_for(interval: &ExperienceInterval, rates: &RateTable) -> f64 {
    match (&interval.country, rates.reduced_per_year) {
        (Some(country), Some(reduced)) if is_arabic_speaking(country) => reduced,
        _ => rates.per_year,
    }
}

/// Scores every candidate, including those with no intervals (zero).
/// Malformed intervals are skipped with a warning; the candidate keeps the
/// rest of their intervals.
pub fn score_cohort(
    candidates: &[Candidate],
    intervals: &[ExperienceInterval],
    as_of: NaiveDate,
    rates: &RateTable,
) -> Vec<CategoryScore> {
    let mut totals: HashMap<Uuid, f64> = HashMap::new();

    for interval in intervals {
        let years = match interval_years(interval, as_of) {
            Ok(years) => years,
            Err(err) => {
                warn!(error = %err, "skipping malformed experience interval");
                continue;
            }
        };
        *totals.entry(interval.candidate_id).or_insert(0.0) += years * rate_for(interval, rates);
    }

    candidates
        .iter()
        .map(|candidate| CategoryScore {
            candidate_id: candidate.id,
            score: totals.get(&candidate.id).copied().unwrap_or(0.0).min(rates.cap),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: Uuid) -> Candidate {
        Candidate {
            id,
            full_name: "Avery Lee".to_string(),
            email: "avery@example.com".to_string(),
        }
    }

    fn interval(
        candidate_id: Uuid,
        country: Option<&str>,
        start: (i32, u32, u32),
        end: Option<(i32, u32, u32)>,
        is_current: bool,
    ) -> ExperienceInterval {
        ExperienceInterval {
            candidate_id,
            country: country.map(str::to_string),
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: end.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            is_current,
            administrative_role: false,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    #[test]
    fn overlong_intervals_clamp_at_five_years() {
        let id = Uuid::new_v4();
        let candidates = vec![candidate(id)];

        // The reduced rate keeps both totals below the category cap, so
        // equality here comes from the per-interval clamp alone.
        let ten = vec![interval(id, Some("Jordan"), (2010, 1, 1), Some((2020, 1, 1)), false)];
        let six = vec![interval(id, Some("Jordan"), (2014, 1, 1), Some((2020, 1, 1)), false)];

        let ten_score = score_cohort(&candidates, &ten, as_of(), &TEACHING_RATES);
        let six_score = score_cohort(&candidates, &six, as_of(), &TEACHING_RATES);
        assert_eq!(ten_score[0].score, six_score[0].score);
        assert_eq!(ten_score[0].score, 10.0);
    }

    #[test]
    fn six_years_in_a_non_arabic_country_hits_the_teaching_cap() {
        let id = Uuid::new_v4();
        let candidates = vec![candidate(id)];
        let intervals = vec![interval(id, Some("Germany"), (2014, 1, 1), Some((2020, 1, 1)), false)];

        let scores = score_cohort(&candidates, &intervals, as_of(), &TEACHING_RATES);
        assert_eq!(scores[0].score, 15.0);
    }

    #[test]
    fn arabic_country_uses_reduced_rate_case_insensitively() {
        let id = Uuid::new_v4();
        let candidates = vec![candidate(id)];
        let intervals = vec![interval(id, Some("saudi arabia"), (2018, 1, 1), Some((2020, 1, 1)), false)];

        let scores = score_cohort(&candidates, &intervals, as_of(), &TEACHING_RATES);
        let years = 730.0 / 365.25;
        assert!((scores[0].score - years * 2.0).abs() < 1e-9);
    }

    #[test]
    fn ongoing_interval_ends_at_the_as_of_date() {
        let id = Uuid::new_v4();
        let candidates = vec![candidate(id)];
        let intervals = vec![interval(id, None, (2024, 1, 1), None, true)];

        let scores = score_cohort(&candidates, &intervals, as_of(), &INDUSTRY_RATES);
        let years = 731.0 / 365.25;
        assert!((scores[0].score - years).abs() < 1e-9);
    }

    #[test]
    fn industry_rate_ignores_locale_and_caps_at_five() {
        let id = Uuid::new_v4();
        let candidates = vec![candidate(id)];
        let intervals = vec![
            interval(id, None, (2010, 1, 1), Some((2016, 1, 1)), false),
            interval(id, None, (2016, 1, 1), Some((2022, 1, 1)), false),
        ];

        let scores = score_cohort(&candidates, &intervals, as_of(), &INDUSTRY_RATES);
        assert_eq!(scores[0].score, 5.0);
    }

    #[test]
    fn malformed_interval_is_skipped_but_candidate_survives() {
        let id = Uuid::new_v4();
        let candidates = vec![candidate(id)];
        let intervals = vec![
            interval(id, Some("Germany"), (2020, 1, 1), None, false),
            interval(id, Some("Germany"), (2024, 1, 1), Some((2025, 1, 1)), false),
        ];

        let scores = score_cohort(&candidates, &intervals, as_of(), &TEACHING_RATES);
        assert_eq!(scores.len(), 1);
        let years = 366.0 / 365.25;
        assert!((scores[0].score - years * 3.0).abs() < 1e-9);
    }

    #[test]
    fn candidate_with_no_intervals_scores_zero() {
        let id = Uuid::new_v4();
        let scores = score_cohort(&[candidate(id)], &[], as_of(), &TEACHING_RATES);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 0.0);
    }
}
