use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::Token;

/// One line of the generation log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRecord {
    pub id_model: String,
    pub sample_idx: usize,
    pub question: String,
    pub question_type: String,
    pub answer_gen: Vec<Token>,
    pub answer_truth: Vec<Token>,
    pub ce: f64,
    pub timestamp: String,
}

impl GenerationRecord {
    pub fn is_exact_match(&self) -> bool {
        self.answer_gen == self.answer_truth
    }
}

/// Local wall-clock time, e.g. `2024-05-01 13:37:00.123456`.
pub fn timestamp_now() -> String {
    render_timestamp(&Local::now().naive_local())
}

/// `YYYY-mm-dd HH:MM:SS[.ffffff]`; the fraction is left out when the
/// microseconds are zero.
pub fn render_timestamp(dt: &NaiveDateTime) -> String {
    let secs = dt.format("%Y-%m-%d %H:%M:%S");
    match dt.nanosecond() / 1_000 {
        0 => secs.to_string(),
        micros => format!("{secs}.{micros:06}"),
    }
}

/// Append `record` as a single JSON line. The file is opened and closed
/// per call and the line goes out in one write.
pub fn append_jsonl(path: &Path, record: &GenerationRecord) -> Result<()> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open {} for append", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("cannot write to {}", path.display()))?;
    Ok(())
}

/// Read every record of a JSONL log; blank lines are skipped.
pub fn read_jsonl(path: &Path) -> Result<Vec<GenerationRecord>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut records = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: GenerationRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed record", path.display(), n + 1))?;
        records.push(rec);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(idx: usize, ce: f64) -> GenerationRecord {
        GenerationRecord {
            id_model: "mblm-clevr".into(),
            sample_idx: idx,
            question: "Are there more cubes than spheres?".into(),
            question_type: "greater_than".into(),
            answer_gen: vec![110, 111],
            answer_truth: vec![121, 101, 115],
            ce,
            timestamp: timestamp_now(),
        }
    }

    #[test]
    fn field_names_and_types() {
        let v = serde_json::to_value(record(7, 0.5)).unwrap();
        let obj = v.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["answer_gen", "answer_truth", "ce", "id_model", "question", "question_type", "sample_idx", "timestamp"]
        );
        assert!(obj["sample_idx"].is_u64());
        assert!(obj["answer_gen"][0].is_u64());
        assert!(obj["ce"].is_f64());
    }

    #[test]
    fn appended_lines_read_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.jsonl");
        let first = record(1, 2.718281828459045);
        let second = record(2, 1e-12);

        append_jsonl(&path, &first).unwrap();
        append_jsonl(&path, &second).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with('\n'));

        let back = read_jsonl(&path).unwrap();
        assert_eq!(back, vec![first, second]);
    }

    #[test]
    fn append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.jsonl");
        std::fs::write(&path, "\n").unwrap();
        append_jsonl(&path, &record(3, 1.0)).unwrap();
        let back = read_jsonl(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].sample_idx, 3);
    }

    #[test]
    fn malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.jsonl");
        append_jsonl(&path, &record(1, 1.0)).unwrap();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"id_model\": \n").unwrap();
        let err = read_jsonl(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"), "{err}");
    }

    #[test]
    fn timestamp_shape() {
        let ts = timestamp_now();
        assert!(ts.len() == 19 || ts.len() == 26, "{ts}");
        assert_eq!(&ts[10..11], " ");
    }

    #[test]
    fn timestamp_fraction_only_when_nonzero() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let with = day.and_hms_micro_opt(13, 37, 0, 42).unwrap();
        assert_eq!(render_timestamp(&with), "2024-05-01 13:37:00.000042");
        let without = day.and_hms_micro_opt(13, 37, 0, 0).unwrap();
        assert_eq!(render_timestamp(&without), "2024-05-01 13:37:00");
        let sub_micro = day.and_hms_nano_opt(9, 5, 7, 999).unwrap();
        assert_eq!(render_timestamp(&sub_micro), "2024-05-01 09:05:07");
    }
}
