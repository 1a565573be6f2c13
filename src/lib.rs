//! Stratified generation probe for multimodal byte-level models on CLEVR.
//!
//! Samples questions per question type with a fixed seed, lets a model answer
//! a question-image-question prompt, scores the answer with the model's own
//! loss and logs one JSON line per sample.

pub mod categories;
pub mod dataset;
pub mod generation;
pub mod logging;
pub mod model;
pub mod prompt;
pub mod record;
pub mod sampler;
pub mod summary;

/// Model vocabulary id. Bytes map to 0..=255.
pub type Token = u32;
