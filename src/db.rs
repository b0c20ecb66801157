use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Candidate, CohortRecords, DegreeLevel, DegreeRecord, ExperienceInterval, FundedResearchRecord,
    JournalRank, ParsedPublication, Quartile, TotalScore,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn parse_level(label: &str) -> anyhow::Result<DegreeLevel> {
    match label {
        "bsc" => Ok(DegreeLevel::Bsc),
        "msc" => Ok(DegreeLevel::Msc),
        "phd" => Ok(DegreeLevel::Phd),
        other => anyhow::bail!("unknown degree level '{other}' in degrees table"),
    }
}

async fn fetch_candidates(pool: &PgPool) -> anyhow::Result<Vec<Candidate>> {
    let rows = sqlx::query(
        "SELECT id, full_name, email FROM candidate_scoring.candidates ORDER BY full_name, email",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Candidate {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
        })
        .collect())
}

async fn fetch_degrees(pool: &PgPool) -> anyhow::Result<Vec<DegreeRecord>> {
    let rows = sqlx::query(
        "SELECT candidate_id, level, university_rank FROM candidate_scoring.degrees",
    )
    .fetch_all(pool)
    .await?;

    let mut degrees = Vec::with_capacity(rows.len());
    for row in rows {
        let label: String = row.get("level");
        degrees.push(DegreeRecord {
            candidate_id: row.get("candidate_id"),
            level: parse_level(&label)?,
            university_rank: row.get("university_rank"),
        });
    }
    Ok(degrees)
}

async fn fetch_intervals(pool: &PgPool, teaching: bool) -> anyhow::Result<Vec<ExperienceInterval>> {
    let query = if teaching {
        "SELECT candidate_id, country, start_date, end_date, is_current, administrative_role \
         FROM candidate_scoring.teaching_experience"
    } else {
        "SELECT candidate_id, NULL::text AS country, start_date, end_date, is_current, administrative_role \
         FROM candidate_scoring.industry_experience"
    };

    let rows = sqlx::query(query).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| ExperienceInterval {
            candidate_id: row.get("candidate_id"),
            country: row.get::<Option<String>, _>("country"),
            start_date: row.get("start_date"),
            end_date: row.get::<Option<NaiveDate>, _>("end_date"),
            is_current: row.get("is_current"),
            administrative_role: row.get("administrative_role"),
        })
        .collect())
}

async fn fetch_presence(pool: &PgPool, query: &str) -> anyhow::Result<HashSet<Uuid>> {
    let rows = sqlx::query(query).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|row| row.get("candidate_id")).collect())
}

async fn fetch_funded_research(pool: &PgPool) -> anyhow::Result<Vec<FundedResearchRecord>> {
    let rows = sqlx::query(
        "SELECT candidate_id, amount_usd FROM candidate_scoring.funded_research",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| FundedResearchRecord {
            candidate_id: row.get("candidate_id"),
            amount_usd: row.get("amount_usd"),
        })
        .collect())
}

async fn fetch_citations(pool: &PgPool) -> anyhow::Result<HashMap<Uuid, String>> {
    let rows = sqlx::query(
        "SELECT candidate_id, publications_text FROM candidate_scoring.citations",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("candidate_id"), row.get("publications_text")))
        .collect())
}

/// One up-front read of every per-domain collection the scorers need.
pub async fn fetch_cohort(pool: &PgPool) -> anyhow::Result<CohortRecords> {
    Ok(CohortRecords {
        candidates: fetch_candidates(pool).await?,
        degrees: fetch_degrees(pool).await?,
        teaching: fetch_intervals(pool, true).await?,
        industry: fetch_intervals(pool, false).await?,
        patents: fetch_presence(
            pool,
            "SELECT DISTINCT candidate_id FROM candidate_scoring.patents",
        )
        .await?,
        supervision_bsc: fetch_presence(
            pool,
            "SELECT DISTINCT candidate_id FROM candidate_scoring.supervision_bsc",
        )
        .await?,
        supervision_msc: fetch_presence(
            pool,
            "SELECT DISTINCT candidate_id FROM candidate_scoring.supervision_msc",
        )
        .await?,
        supervision_phd: fetch_presence(
            pool,
            "SELECT DISTINCT candidate_id FROM candidate_scoring.supervision_phd",
        )
        .await?,
        committee_work: fetch_presence(
            pool,
            "SELECT DISTINCT candidate_id FROM candidate_scoring.committee_work",
        )
        .await?,
        quality_accreditation: fetch_presence(
            pool,
            "SELECT DISTINCT candidate_id FROM candidate_scoring.quality_accreditation",
        )
        .await?,
        certificates: fetch_presence(
            pool,
            "SELECT DISTINCT candidate_id FROM candidate_scoring.certificates",
        )
        .await?,
        awards: fetch_presence(
            pool,
            "SELECT DISTINCT candidate_id FROM candidate_scoring.awards",
        )
        .await?,
        funded_research: fetch_funded_research(pool).await?,
        citations: fetch_citations(pool).await?,
    })
}

/// Static quality reference, loaded once per run.
pub async fn fetch_journal_ranks(pool: &PgPool) -> anyhow::Result<Vec<JournalRank>> {
    let rows = sqlx::query("SELECT title, quartile FROM candidate_scoring.journal_ranks")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| JournalRank {
            title: row.get("title"),
            quartile: Quartile::from_label(row.get::<String, _>("quartile").as_str()),
        })
        .collect())
}

/// Imports the bibliometric reference export (`Title`, `SJR Quartile`).
pub async fn import_journal_ranks(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        #[serde(rename = "Title")]
        title: String,
        #[serde(rename = "SJR Quartile")]
        quartile: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let quartile = Quartile::from_label(row.quartile.as_deref().unwrap_or("-"));
        sqlx::query(
            r#"
            INSERT INTO candidate_scoring.journal_ranks (title, quartile)
            VALUES ($1, $2)
            ON CONFLICT (title) DO UPDATE SET quartile = EXCLUDED.quartile
            "#,
        )
        .bind(&row.title)
        .bind(quartile.label())
        .execute(pool)
        .await?;
        imported += 1;
    }

    Ok(imported)
}

/// Keyed by candidate + sequential id, so reprocessing overwrites rather
/// than duplicates.
pub async fn upsert_parsed_publication(
    pool: &PgPool,
    publication: &ParsedPublication,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO candidate_scoring.parsed_publications
        (candidate_id, seq, title, journal, year_volume_issue, doi, source_text)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (candidate_id, seq) DO UPDATE
        SET title = EXCLUDED.title,
            journal = EXCLUDED.journal,
            year_volume_issue = EXCLUDED.year_volume_issue,
            doi = EXCLUDED.doi,
            source_text = EXCLUDED.source_text
        "#,
    )
    .bind(publication.candidate_id)
    .bind(publication.seq)
    .bind(&publication.title)
    .bind(&publication.journal)
    .bind(&publication.year_volume_issue)
    .bind(&publication.doi)
    .bind(&publication.source_text)
    .execute(pool)
    .await?;

    Ok(())
}

/// Rows whose candidate already has a result are dropped; only unseen
/// candidates get written.
fn filter_unseen<'a>(totals: &'a [TotalScore], existing: &HashSet<Uuid>) -> Vec<&'a TotalScore> {
    totals
        .iter()
        .filter(|total| !existing.contains(&total.candidate_id))
        .collect()
}

/// Append-only result rows: candidates already present keep their existing
/// totals, so repeated runs never duplicate or overwrite.
pub async fn insert_new_totals(pool: &PgPool, totals: &[TotalScore]) -> anyhow::Result<usize> {
    let rows = sqlx::query("SELECT candidate_id FROM candidate_scoring.score_results")
        .fetch_all(pool)
        .await?;
    let existing: HashSet<Uuid> = rows.into_iter().map(|row| row.get("candidate_id")).collect();

    let mut inserted = 0usize;
    for total in filter_unseen(totals, &existing) {
        let result = sqlx::query(
            r#"
            INSERT INTO candidate_scoring.score_results
            (candidate_id, pedigree_score, teaching_score, industry_score,
             others_score, publications_score, total_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (candidate_id) DO NOTHING
            "#,
        )
        .bind(total.candidate_id)
        .bind(total.pedigree_score)
        .bind(total.teaching_score)
        .bind(total.industry_score)
        .bind(total.others_score)
        .bind(total.publications_score)
        .bind(total.total_score)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let candidates = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Amal Haddad",
            "amal.haddad@example.edu",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Noor Khalil",
            "noor.khalil@example.edu",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Omar Said",
            "omar.said@example.edu",
        ),
    ];

    for (id, full_name, email) in &candidates {
        sqlx::query(
            r#"
            INSERT INTO candidate_scoring.candidates (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(*id)
        .bind(*full_name)
        .bind(*email)
        .execute(pool)
        .await?;
    }

    let amal = candidates[0].0;
    let noor = candidates[1].0;
    let omar = candidates[2].0;
    let seed_ids: Vec<Uuid> = candidates.iter().map(|(id, _, _)| *id).collect();

    // Reseeding replaces the sample rows instead of piling up duplicates.
    for table in [
        "teaching_experience",
        "industry_experience",
        "patents",
        "supervision_phd",
        "committee_work",
        "certificates",
        "awards",
        "funded_research",
    ] {
        let query =
            format!("DELETE FROM candidate_scoring.{table} WHERE candidate_id = ANY($1)");
        sqlx::query(&query).bind(&seed_ids).execute(pool).await?;
    }

    let degrees: Vec<(Uuid, &str, i32)> = vec![
        (amal, "bsc", 50),
        (amal, "msc", 50),
        (amal, "phd", 50),
        (noor, "bsc", 120),
        (noor, "msc", 80),
        (omar, "bsc", 150),
    ];

    for (candidate_id, level, rank) in degrees {
        sqlx::query(
            r#"
            INSERT INTO candidate_scoring.degrees (id, candidate_id, level, university_rank)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (candidate_id, level) DO UPDATE SET university_rank = EXCLUDED.university_rank
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(candidate_id)
        .bind(level)
        .bind(rank)
        .execute(pool)
        .await?;
    }

    let teaching: Vec<(Uuid, &str, NaiveDate, Option<NaiveDate>, bool, bool)> = vec![
        (
            amal,
            "Jordan",
            NaiveDate::from_ymd_opt(2016, 9, 1).context("invalid date")?,
            Some(NaiveDate::from_ymd_opt(2021, 6, 30).context("invalid date")?),
            false,
            false,
        ),
        (
            omar,
            "Germany",
            NaiveDate::from_ymd_opt(2019, 1, 15).context("invalid date")?,
            None,
            true,
            true,
        ),
    ];

    for (candidate_id, country, start, end, current, admin) in teaching {
        sqlx::query(
            r#"
            INSERT INTO candidate_scoring.teaching_experience
            (id, candidate_id, country, start_date, end_date, is_current, administrative_role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(candidate_id)
        .bind(country)
        .bind(start)
        .bind(end)
        .bind(current)
        .bind(admin)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO candidate_scoring.industry_experience
        (id, candidate_id, start_date, end_date, is_current, administrative_role)
        VALUES ($1, $2, $3, NULL, TRUE, FALSE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(noor)
    .bind(NaiveDate::from_ymd_opt(2022, 3, 1).context("invalid date")?)
    .execute(pool)
    .await?;

    let achievements: Vec<(&str, Uuid, &str)> = vec![
        ("patents", amal, "Adaptive assessment engine, US patent"),
        ("supervision_phd", amal, "Two doctoral candidates"),
        ("committee_work", omar, "Curriculum committee chair"),
        ("certificates", noor, "PMP certification"),
        ("awards", noor, "Dean's teaching award"),
    ];

    for (table, candidate_id, detail) in achievements {
        let query = format!(
            "INSERT INTO candidate_scoring.{table} (id, candidate_id, detail) VALUES ($1, $2, $3)"
        );
        sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(candidate_id)
            .bind(detail)
            .execute(pool)
            .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO candidate_scoring.funded_research (id, candidate_id, amount_usd)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(amal)
    .bind(85_000.0_f64)
    .execute(pool)
    .await?;

    let citations = vec![
        (
            amal,
            "Haddad A. et al., \"Curriculum-aware grading at scale\", \
             Journal of Machine Learning Research, vol. 24, 2023, doi:10.5555/jmlr.2023.112. \
             Haddad A., \"Rubric drift in peer assessment\", Computers & Education, 187, 2022, \
             doi:10.1016/j.compedu.2022.104.",
        ),
        (
            omar,
            "Said O., \"Lab automation for intro courses\", \
             Regional Engineering Education Bulletin, issue 9, 2021, no doi.",
        ),
    ];

    for (candidate_id, text) in citations {
        sqlx::query(
            r#"
            INSERT INTO candidate_scoring.citations (candidate_id, publications_text)
            VALUES ($1, $2)
            ON CONFLICT (candidate_id) DO UPDATE SET publications_text = EXCLUDED.publications_text
            "#,
        )
        .bind(candidate_id)
        .bind(text)
        .execute(pool)
        .await?;
    }

    let journals = vec![
        ("Journal of Machine Learning Research", "Q1"),
        ("Computers & Education", "Q1"),
        ("IEEE Transactions on Education", "Q2"),
        ("International Journal of Engineering Pedagogy", "Q3"),
        ("Regional Engineering Education Bulletin", "-"),
    ];

    for (title, quartile) in journals {
        sqlx::query(
            r#"
            INSERT INTO candidate_scoring.journal_ranks (title, quartile)
            VALUES ($1, $2)
            ON CONFLICT (title) DO UPDATE SET quartile = EXCLUDED.quartile
            "#,
        )
        .bind(title)
        .bind(quartile)
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(candidate_id: Uuid) -> TotalScore {
        TotalScore {
            candidate_id,
            pedigree_score: 15.0,
            teaching_score: 12.0,
            industry_score: 3.0,
            others_score: 5.0,
            publications_score: 9.0,
            total_score: 44.0,
        }
    }

    #[test]
    fn resubmitting_present_candidates_writes_nothing() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let totals = vec![total(first), total(second)];

        let fresh = filter_unseen(&totals, &HashSet::new());
        assert_eq!(fresh.len(), 2);

        let all_seen: HashSet<Uuid> = [first, second].into_iter().collect();
        assert!(filter_unseen(&totals, &all_seen).is_empty());
    }

    #[test]
    fn only_unseen_candidates_survive_the_filter() {
        let seen = Uuid::new_v4();
        let unseen = Uuid::new_v4();
        let totals = vec![total(seen), total(unseen)];

        let existing: HashSet<Uuid> = [seen].into_iter().collect();
        let remaining = filter_unseen(&totals, &existing);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].candidate_id, unseen);
    }
}
