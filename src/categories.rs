use anyhow::{bail, Result};

/// CLEVR question types, keyed by the outermost program function, in the
/// order they are reported. Values are the question families from the paper.
pub static CLEVR_QUESTION_TYPES: phf::OrderedMap<&'static str, &'static str> = phf::phf_ordered_map! {
    "exist"          => "exist",
    "count"          => "count",
    "equal_integer"  => "compare_integer",
    "less_than"      => "compare_integer",
    "greater_than"   => "compare_integer",
    "query_size"     => "query_attribute",
    "query_color"    => "query_attribute",
    "query_material" => "query_attribute",
    "query_shape"    => "query_attribute",
    "equal_size"     => "compare_attribute",
    "equal_color"    => "compare_attribute",
    "equal_material" => "compare_attribute",
    "equal_shape"    => "compare_attribute",
};

/// Ordered, duplicate-free set of category labels a sampler stratifies over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    labels: Vec<String>,
}

impl CategorySet {
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if label.is_empty() {
                bail!("empty question type label");
            }
            if out.contains(&label) {
                bail!("duplicate question type {label}");
            }
            out.push(label);
        }
        if out.is_empty() {
            bail!("at least one question type is required");
        }
        Ok(Self { labels: out })
    }

    pub fn clevr() -> Self {
        Self {
            labels: CLEVR_QUESTION_TYPES.keys().map(|k| k.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Declaration position of `label`, if it belongs to the set.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Question family for display; falls back to the label itself.
pub fn family(label: &str) -> &str {
    CLEVR_QUESTION_TYPES.get(label).copied().unwrap_or(label)
}
