use anyhow::{ensure, Result};

use crate::Token;

/// Question, image, question. The models were trained on this framing.
pub fn build_qiq_prompt(question: &[Token], image: &[Token]) -> Vec<Token> {
    let mut prompt = Vec::with_capacity(2 * question.len() + image.len());
    prompt.extend_from_slice(question);
    prompt.extend_from_slice(image);
    prompt.extend_from_slice(question);
    prompt
}

/// The generated sequence echoes the prompt; keep only the continuation.
pub fn strip_prompt(generated: &[Token], prompt_len: usize, num_generated: usize) -> Result<&[Token]> {
    ensure!(
        generated.len() == prompt_len + num_generated,
        "model returned {} tokens, expected prompt {} + generated {}",
        generated.len(),
        prompt_len,
        num_generated
    );
    Ok(&generated[prompt_len..])
}
