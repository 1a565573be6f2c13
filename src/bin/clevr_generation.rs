/*
generation shortcut in .cargo/config.toml !

cargo generate-clevr \
    --clevr-dir  data/CLEVR_v1.0 \
    --out-file   output/clevr_generations.jsonl \
    --model-dir  checkpoints \
    -m mblm-clevr-1d -m mblm-clevr-2d \
    -n 20
*/

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use std::path::PathBuf;

use clevr_generation::categories::{family, CategorySet};
use clevr_generation::dataset::ClevrDataset;
use clevr_generation::generation::run_model;
use clevr_generation::logging;
use clevr_generation::model::RemoteModel;
use clevr_generation::sampler::sample_by_question_type;

// CLI
#[derive(Parser, Debug)]
#[command(version, about = "Sample CLEVR questions per question type, let each model answer and log the generations as JSONL.")]
struct Cli {
    // CLEVR root (questions/ and images/)
    #[arg(long)]
    clevr_dir: PathBuf,

    // JSONL output, appended to
    #[arg(long = "out-file")]
    output_file: PathBuf,

    // Checkpoint directory the inference server loads models from
    #[arg(long)]
    model_dir: PathBuf,

    // Model ids, evaluated one after another
    #[arg(short = 'm', required = true)]
    model_id: Vec<String>,

    // Samples per question type
    #[arg(short = 'n', value_parser = clap::value_parser!(u32).range(1..))]
    num_samples_per_question: u32,

    // CLEVR has no labelled test set
    #[arg(long, default_value = "val")]
    split: String,

    #[arg(long, default_value_t = 1.0)]
    temperature: f32,

    // Shuffle seed of the sampler
    #[arg(long, default_value_t = 8)]
    seed: u64,

    // Override the question types to stratify over (comma separated)
    #[arg(long, value_delimiter = ',')]
    question_types: Option<Vec<String>>,

    #[arg(long, default_value = "cuda")]
    device: String,

    // Inference server base URL
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    endpoint: String,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    // Level of the log file (error, warn, info, debug, trace); debug adds one line per sample
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = logging::init(&cli.log_dir, "clevr_generation", cli.log_level)?;
    info!("run started -> {cli:?}");

    let categories = match &cli.question_types {
        Some(labels) => CategorySet::new(labels.iter().cloned())?,
        None => CategorySet::clevr(),
    };
    info!(
        "{} question types: {}",
        categories.len(),
        categories
            .iter()
            .map(|q| format!("{q} ({})", family(q)))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let quota = cli.num_samples_per_question as usize;

    for model_id in &cli.model_id {
        println!("Model {model_id}");
        let (model, config) = RemoteModel::load(&cli.endpoint, model_id, &cli.model_dir, &cli.device).await?;

        let clevr = ClevrDataset::open(&cli.clevr_dir, &cli.split, config.input_seq_len)
            .with_context(|| format!("opening CLEVR {} split", cli.split))?;
        info!("{}: {} questions in split {}", model.model_id(), clevr.len(), cli.split);

        let sample_idxs = sample_by_question_type(clevr.iter(Some(cli.seed)), &categories, quota)?;

        run_model(
            &model,
            model_id,
            &clevr,
            &sample_idxs,
            cli.temperature,
            &cli.output_file,
        )
        .await?;
    }

    println!("done - log {}", log_path.display());
    Ok(())
}
