use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod db;
mod error;
mod experience;
mod models;
mod others;
mod pedigree;
mod publications;
mod report;

const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "candidate-scorecard")]
#[command(about = "Composite evaluation scoring for academic hiring candidates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import the journal quality reference from a bibliometric CSV export
    ImportJournals {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score the whole cohort and persist the results
    Score {
        /// Evaluation date for ongoing intervals; defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long, default_value = "scores.csv")]
        out: PathBuf,
        /// Extraction calls in flight at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportJournals { csv } => {
            let imported = db::import_journal_ranks(&pool, &csv).await?;
            println!("Imported {imported} journal entries from {}.", csv.display());
        }
        Commands::Score {
            as_of,
            out,
            concurrency,
            limit,
        } => {
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let endpoint = std::env::var("EXTRACTOR_URL")
                .context("EXTRACTOR_URL must point at the citation extraction service")?;
            let token = std::env::var("EXTRACTOR_TOKEN")
                .context("EXTRACTOR_TOKEN must hold the extraction service credential")?;
            let extractor = Arc::new(publications::HttpExtractor::new(
                endpoint,
                token,
                EXTRACTION_TIMEOUT,
            )?);

            let cohort = db::fetch_cohort(&pool).await?;
            if cohort.candidates.is_empty() {
                println!("No candidates to score.");
                return Ok(());
            }

            let journals = Arc::new(db::fetch_journal_ranks(&pool).await?);
            if journals.is_empty() {
                warn!("journal quality reference is empty, publication matches will all miss");
            }

            let pedigree = pedigree::score_cohort(&cohort.candidates, &cohort.degrees);
            let teaching = experience::score_cohort(
                &cohort.candidates,
                &cohort.teaching,
                as_of,
                &experience::TEACHING_RATES,
            );
            let industry = experience::score_cohort(
                &cohort.candidates,
                &cohort.industry,
                as_of,
                &experience::INDUSTRY_RATES,
            );
            let others = others::score_cohort(&cohort);
            let publications = publications::score_cohort(
                &pool,
                extractor,
                &cohort,
                Arc::clone(&journals),
                concurrency,
            )
            .await?;

            let totals = aggregate::join_scores(
                &cohort.candidates,
                &pedigree,
                &teaching,
                &industry,
                &others,
                &publications,
            );

            let inserted = db::insert_new_totals(&pool, &totals).await?;
            report::write_csv(&out, &totals)?;

            println!(
                "Scored {} of {} candidates ({inserted} new result rows). Report written to {}.",
                totals.len(),
                cohort.candidates.len(),
                out.display()
            );
            let mut ranked = totals.clone();
            ranked.sort_by(|a, b| {
                b.total_score
                    .partial_cmp(&a.total_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let names: std::collections::HashMap<_, _> = cohort
                .candidates
                .iter()
                .map(|candidate| {
                    (
                        candidate.id,
                        format!("{} ({})", candidate.full_name, candidate.email),
                    )
                })
                .collect();
            for total in ranked.iter().take(limit) {
                println!(
                    "- {} total {:.2} (pedigree {:.2}, teaching {:.2}, industry {:.2}, others {:.2}, publications {:.2})",
                    names
                        .get(&total.candidate_id)
                        .map(String::as_str)
                        .unwrap_or("unknown candidate"),
                    total.total_score,
                    total.pedigree_score,
                    total.teaching_score,
                    total.industry_score,
                    total.others_score,
                    total.publications_score
                );
            }
        }
    }

    Ok(())
}
