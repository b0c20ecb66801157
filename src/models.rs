use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DegreeLevel {
    Bsc,
    Msc,
    Phd,
}

impl DegreeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegreeLevel::Bsc => "bsc",
            DegreeLevel::Msc => "msc",
            DegreeLevel::Phd => "phd",
        }
    }
}

impl fmt::Display for DegreeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DegreeRecord {
    pub candidate_id: Uuid,
    pub level: DegreeLevel,
    pub university_rank: i32,
}

#[derive(Debug, Clone)]
pub struct ExperienceInterval {
    pub candidate_id: Uuid,
    pub country: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub administrative_role: bool,
}

#[derive(Debug, Clone)]
pub struct FundedResearchRecord {
    pub candidate_id: Uuid,
    pub amount_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quartile {
    Q1,
    Q2,
    Q3,
    Q4,
    Unranked,
}

impl Quartile {
    pub fn from_label(label: &str) -> Quartile {
        match label.trim() {
            "Q1" => Quartile::Q1,
            "Q2" => Quartile::Q2,
            "Q3" => Quartile::Q3,
            "Q4" => Quartile::Q4,
            _ => Quartile::Unranked,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quartile::Q1 => "Q1",
            Quartile::Q2 => "Q2",
            Quartile::Q3 => "Q3",
            Quartile::Q4 => "Q4",
            Quartile::Unranked => "-",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JournalRank {
    pub title: String,
    pub quartile: Quartile,
}

#[derive(Debug, Clone)]
pub struct ParsedPublication {
    pub candidate_id: Uuid,
    pub seq: i32,
    pub title: String,
    pub journal: String,
    pub year_volume_issue: String,
    pub doi: String,
    pub source_text: String,
}

/// Everything the scorers need for one run, fetched up front so the
/// category scorers stay pure functions over in-memory records.
#[derive(Debug, Clone, Default)]
pub struct CohortRecords {
    pub candidates: Vec<Candidate>,
    pub degrees: Vec<DegreeRecord>,
    pub teaching: Vec<ExperienceInterval>,
    pub industry: Vec<ExperienceInterval>,
    pub patents: HashSet<Uuid>,
    pub supervision_bsc: HashSet<Uuid>,
    pub supervision_msc: HashSet<Uuid>,
    pub supervision_phd: HashSet<Uuid>,
    pub committee_work: HashSet<Uuid>,
    pub quality_accreditation: HashSet<Uuid>,
    pub certificates: HashSet<Uuid>,
    pub awards: HashSet<Uuid>,
    pub funded_research: Vec<FundedResearchRecord>,
    pub citations: HashMap<Uuid, String>,
}

#[derive(Debug, Clone)]
pub struct CategoryScore {
    pub candidate_id: Uuid,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct OthersScore {
    pub candidate_id: Uuid,
    pub patents: f64,
    pub supervision: f64,
    pub committee_work: f64,
    pub quality_accreditation: f64,
    pub certificates: f64,
    pub awards: f64,
    pub management: f64,
    pub funded_research: f64,
    pub total: f64,
}

/// A candidate whose extraction failed is `Unavailable`, which is not the
/// same thing as a legitimate zero (`NoData`, or a blob that parses to
/// zero publications).
#[derive(Debug, Clone, PartialEq)]
pub enum PublicationOutcome {
    Scored(f64),
    NoData,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct PublicationScore {
    pub candidate_id: Uuid,
    pub outcome: PublicationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalScore {
    pub candidate_id: Uuid,
    pub pedigree_score: f64,
    pub teaching_score: f64,
    pub industry_score: f64,
    pub others_score: f64,
    pub publications_score: f64,
    pub total_score: f64,
}
