use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::path::Path;

use crate::dataset::QaDataset;
use crate::model::LanguageModel;
use crate::prompt::{build_qiq_prompt, strip_prompt};
use crate::record::{append_jsonl, timestamp_now, GenerationRecord};
use crate::sampler::Selection;

/// Generate an answer for one sample, score it with the model's own loss and
/// append the record to `output_file`.
pub async fn sample_generation<M, D>(
    model: &M,
    model_id: &str,
    dataset: &D,
    selection: &Selection,
    temperature: f32,
    output_file: &Path,
) -> Result<GenerationRecord>
where
    M: LanguageModel,
    D: QaDataset,
{
    let sample_idx = selection.sample_idx;
    let parts = dataset.sample_with_parts(sample_idx)?;

    let prompt = build_qiq_prompt(&parts.question, &parts.image);
    let max_tokens_to_generate = parts.answer.len();

    let generated = model
        .generate(&prompt, temperature, max_tokens_to_generate)
        .await
        .with_context(|| format!("generation failed for sample {sample_idx}"))?;

    // loss of the model on its own continuation, batch of one
    let batch = [generated];
    let ce = model
        .loss(&batch)
        .await
        .with_context(|| format!("loss failed for sample {sample_idx}"))?;
    let [generated] = batch;

    let answer_gen = strip_prompt(&generated, prompt.len(), max_tokens_to_generate)
        .with_context(|| format!("sample {sample_idx}"))?;
    let raw = dataset.sample_raw(sample_idx)?;

    let record = GenerationRecord {
        id_model: model_id.to_string(),
        sample_idx,
        question: raw.question.clone(),
        question_type: selection.question_type.clone(),
        answer_gen: answer_gen.to_vec(),
        answer_truth: parts.answer,
        ce,
        timestamp: timestamp_now(),
    };
    debug!(
        "sample {sample_idx} ({}): prompt {} tokens, generated {}, ce {:.4}",
        record.question_type,
        prompt.len(),
        record.answer_gen.len(),
        ce
    );

    append_jsonl(output_file, &record)?;
    Ok(record)
}

/// Run every selection through `sample_generation`, in order. Returns the
/// number of records written.
pub async fn run_model<M, D>(
    model: &M,
    model_id: &str,
    dataset: &D,
    selections: &[Selection],
    temperature: f32,
    output_file: &Path,
) -> Result<usize>
where
    M: LanguageModel,
    D: QaDataset,
{
    let bar = ProgressBar::new(selections.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )?);

    let mut written = 0usize;
    for selection in selections {
        bar.set_message(format!("Sample {}", selection.sample_idx));
        sample_generation(model, model_id, dataset, selection, temperature, output_file).await?;
        written += 1;
        bar.inc(1);
    }
    bar.finish_with_message(format!("{model_id} done"));
    info!("{model_id}: wrote {written} records to {}", output_file.display());
    Ok(written)
}
