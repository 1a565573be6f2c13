use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::record::GenerationRecord;

/// Aggregate for one (model, question type) pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryRow {
    pub id_model: String,
    pub question_type: String,
    pub n: usize,
    pub exact_match: f64,
    pub mean_ce: f64,
}

#[derive(Default)]
struct Agg {
    n: usize,
    exact: usize,
    ce_sum: f64,
}

/// Per model and question type: sample count, exact-match rate of the
/// generated answer, mean cross-entropy. Sorted by model, then type.
pub fn summarise(records: &[GenerationRecord]) -> Vec<SummaryRow> {
    let mut by_key: BTreeMap<(&str, &str), Agg> = BTreeMap::new();
    for rec in records {
        let agg = by_key
            .entry((rec.id_model.as_str(), rec.question_type.as_str()))
            .or_default();
        agg.n += 1;
        agg.exact += usize::from(rec.is_exact_match());
        agg.ce_sum += rec.ce;
    }

    by_key
        .into_iter()
        .map(|((model, q_type), agg)| SummaryRow {
            id_model: model.to_string(),
            question_type: q_type.to_string(),
            n: agg.n,
            exact_match: agg.exact as f64 / agg.n as f64,
            mean_ce: agg.ce_sum / agg.n as f64,
        })
        .collect()
}

pub fn write_csv(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
