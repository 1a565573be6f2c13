use anyhow::{anyhow, bail, ensure, Result};
use log::{debug, info};

use crate::categories::CategorySet;
use crate::dataset::RawQuestion;

/// One accepted sample: its question type and dataset index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub question_type: String,
    pub sample_idx: usize,
}

/// Pick up to `quota` sample indices per question type from `samples`, in
/// the order they are yielded.
///
/// The question type of a sample is the outermost function of its program.
/// Samples whose type is not in `categories` are skipped. The whole
/// iterator is consumed even once every bucket is full, so callers observe
/// the same iteration regardless of the quota.
///
/// Output is grouped by question type in `categories` order. It is an error
/// if any type ends up with fewer than `quota` samples.
pub fn sample_by_question_type<'a, I>(
    samples: I,
    categories: &CategorySet,
    quota: usize,
) -> Result<Vec<Selection>>
where
    I: IntoIterator<Item = (usize, &'a RawQuestion)>,
{
    ensure!(quota > 0, "samples per question type must be positive");

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); categories.len()];
    let mut seen = 0usize;
    let mut skipped = 0usize;

    for (sample_idx, raw) in samples {
        seen += 1;
        let q_type = raw
            .question_type()
            .ok_or_else(|| anyhow!("sample {sample_idx} has an empty program"))?;
        let Some(slot) = categories.position(q_type) else {
            skipped += 1;
            continue;
        };
        let bucket = &mut buckets[slot];
        if bucket.len() < quota {
            bucket.push(sample_idx);
        }
    }
    debug!("walked {seen} samples");
    if skipped > 0 {
        info!("skipped {skipped} of {seen} samples outside the selected question types");
    }

    let short: Vec<String> = categories
        .iter()
        .zip(&buckets)
        .filter(|(_, b)| b.len() != quota)
        .map(|(q, b)| format!("{q}={}", b.len()))
        .collect();
    if !short.is_empty() {
        bail!(
            "expected {quota} samples for each of {} question types, short: {}",
            categories.len(),
            short.join(", ")
        );
    }

    let selections: Vec<Selection> = categories
        .iter()
        .zip(buckets)
        .flat_map(|(q, idxs)| {
            idxs.into_iter().map(move |sample_idx| Selection {
                question_type: q.to_string(),
                sample_idx,
            })
        })
        .collect();
    info!(
        "selected {} samples ({quota} x {} question types)",
        selections.len(),
        categories.len()
    );
    Ok(selections)
}
