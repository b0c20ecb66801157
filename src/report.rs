use std::io::Write;
use std::path::Path;

use crate::models::TotalScore;

/// Stable column order: candidate identity, pedigree, teaching, industry,
/// others total, publications, total.
pub fn write_rows<W: Write>(writer: W, rows: &[TotalScore]) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, rows: &[TotalScore]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    write_rows(file, rows)
}
