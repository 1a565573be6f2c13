/*
cargo summarise-clevr \
  output/clevr_generations.jsonl \
  --csv output/clevr_summary.csv
*/

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use clevr_generation::categories::family;
use clevr_generation::record::read_jsonl;
use clevr_generation::summary::{summarise, write_csv};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Exact-match rate and mean cross-entropy per model and question type")]
struct Cli {
    /// JSONL file written by clevr_generation
    input: PathBuf,

    /// Also write the table as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let records = read_jsonl(&cli.input)?;
    if records.is_empty() {
        bail!("{} holds no records", cli.input.display());
    }
    let rows = summarise(&records);

    println!(
        "{:<24} {:<16} {:<18} {:>5} {:>8} {:>8}",
        "model", "question_type", "family", "n", "exact", "mean_ce"
    );
    for r in &rows {
        println!(
            "{:<24} {:<16} {:<18} {:>5} {:>8.3} {:>8.4}",
            r.id_model,
            r.question_type,
            family(&r.question_type),
            r.n,
            r.exact_match,
            r.mean_ce
        );
    }

    if let Some(path) = &cli.csv {
        write_csv(path, &rows)?;
        println!("CSV -> {}", path.display());
    }
    Ok(())
}
