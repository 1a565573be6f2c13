use anyhow::{anyhow, bail, ensure, Context, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::Token;

/// One step of a CLEVR functional program.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProgramStep {
    pub function: String,
    #[serde(default)]
    pub inputs: Vec<usize>,
    #[serde(default)]
    pub value_inputs: Vec<String>,
}

/// A question as stored in `CLEVR_<split>_questions.json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawQuestion {
    pub question: String,
    // the test split ships without answers
    #[serde(default)]
    pub answer: Option<String>,
    pub image_filename: String,
    #[serde(default)]
    pub image_index: Option<u64>,
    #[serde(default)]
    pub question_index: Option<u64>,
    #[serde(default)]
    pub split: Option<String>,
    #[serde(default)]
    pub program: Vec<ProgramStep>,
}

impl RawQuestion {
    /// Outermost function of the program, i.e. the last step applied.
    pub fn question_type(&self) -> Option<&str> {
        self.program.last().map(|s| s.function.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct QuestionFile {
    questions: Vec<RawQuestion>,
}

/// Byte-level token sequences of a single sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleParts {
    pub question: Vec<Token>,
    pub image: Vec<Token>,
    pub answer: Vec<Token>,
}

/// Random access to samples, as needed by the generation loop.
pub trait QaDataset {
    fn sample_with_parts(&self, index: usize) -> Result<SampleParts>;
    fn sample_raw(&self, index: usize) -> Result<&RawQuestion>;
}

pub const SPLITS: [&str; 3] = ["train", "val", "test"];

#[derive(Debug)]
pub struct ClevrDataset {
    questions: Vec<RawQuestion>,
    image_dir: PathBuf,
    seq_len: usize,
}

impl ClevrDataset {
    /// Load the question file of `split` below `clevr_dir`. `seq_len` is the
    /// model context: prompt plus answer must fit into it.
    pub fn open(clevr_dir: &Path, split: &str, seq_len: usize) -> Result<Self> {
        ensure!(
            SPLITS.contains(&split),
            "unknown split {split}, expected one of {SPLITS:?}"
        );
        let q_path = clevr_dir
            .join("questions")
            .join(format!("CLEVR_{split}_questions.json"));
        let file = File::open(&q_path)
            .with_context(|| format!("cannot open {}", q_path.display()))?;
        let parsed: QuestionFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed question file {}", q_path.display()))?;

        Ok(Self {
            questions: parsed.questions,
            image_dir: clevr_dir.join("images").join(split),
            seq_len,
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Walk all questions, optionally shuffled. The permutation depends on
    /// `seed` only, never on global state.
    pub fn iter(&self, shuffle: Option<u64>) -> impl Iterator<Item = (usize, &RawQuestion)> + '_ {
        let mut order: Vec<usize> = (0..self.questions.len()).collect();
        if let Some(seed) = shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            order.shuffle(&mut rng);
        }
        order.into_iter().map(move |i| (i, &self.questions[i]))
    }

    fn image_tokens(&self, raw: &RawQuestion) -> Result<Vec<Token>> {
        let path = self.image_dir.join(&raw.image_filename);
        let bytes = fs::read(&path)
            .with_context(|| format!("cannot read image {}", path.display()))?;
        Ok(bytes.into_iter().map(Token::from).collect())
    }
}

fn text_tokens(text: &str) -> Vec<Token> {
    text.bytes().map(Token::from).collect()
}

impl QaDataset for ClevrDataset {
    fn sample_with_parts(&self, index: usize) -> Result<SampleParts> {
        let raw = self.sample_raw(index)?;
        let answer = raw
            .answer
            .as_deref()
            .ok_or_else(|| anyhow!("sample {index} has no answer (unlabelled split?)"))?;

        let parts = SampleParts {
            question: text_tokens(&raw.question),
            image: self.image_tokens(raw)?,
            answer: text_tokens(answer),
        };

        let total = 2 * parts.question.len() + parts.image.len() + parts.answer.len();
        if total > self.seq_len {
            bail!(
                "sample {index} needs {total} tokens (question {}, image {}, answer {}), model context is {}",
                parts.question.len(),
                parts.image.len(),
                parts.answer.len(),
                self.seq_len
            );
        }
        Ok(parts)
    }

    fn sample_raw(&self, index: usize) -> Result<&RawQuestion> {
        self.questions
            .get(index)
            .ok_or_else(|| anyhow!("sample index {index} out of range ({} questions)", self.questions.len()))
    }
}
