use anyhow::{anyhow, Context, Result};
use log::info;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Token;

/// What the evaluation needs from a model: sampling and self-scoring.
#[allow(async_fn_in_trait)]
pub trait LanguageModel {
    /// Generate `num_tokens_to_generate` tokens after `prompt`. The returned
    /// sequence starts with the prompt.
    async fn generate(
        &self,
        prompt: &[Token],
        temperature: f32,
        num_tokens_to_generate: usize,
    ) -> Result<Vec<Token>>;

    /// Mean cross-entropy of the model over `batch`.
    async fn loss(&self, batch: &[Vec<Token>]) -> Result<f64>;
}

/// Settings reported by the inference server for a loaded model.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ModelConfig {
    pub model_id: String,
    pub input_seq_len: usize,
    #[serde(default)]
    pub pad_token_id: Option<Token>,
    // dataset encoding options the model was trained with, passed through as is
    #[serde(default)]
    pub dataset_args: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct LoadRequest<'a> {
    model_id: &'a str,
    model_dir: &'a Path,
    device: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model_id: &'a str,
    prompt: &'a [Token],
    temperature: f32,
    num_tokens_to_generate: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    tokens: Vec<Token>,
}

#[derive(Debug, Serialize)]
struct LossRequest<'a> {
    model_id: &'a str,
    batch: &'a [Vec<Token>],
}

#[derive(Debug, Deserialize)]
struct LossResponse {
    loss: f64,
}

/// A model hosted by an inference server, addressed by id.
pub struct RemoteModel {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
}

impl RemoteModel {
    /// Ask the server to load `model_id` from `model_dir` onto `device` in
    /// eval mode.
    pub async fn load(
        endpoint: &str,
        model_id: &str,
        model_dir: &Path,
        device: &str,
    ) -> Result<(Self, ModelConfig)> {
        let model = Self {
            client: build_client()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model_id: model_id.to_string(),
        };
        let config: ModelConfig = model
            .post("load", &LoadRequest { model_id, model_dir, device })
            .await
            .with_context(|| format!("loading model {model_id} from {}", model_dir.display()))?;
        info!(
            "loaded {} on {device} (input_seq_len={}, pad_token_id={:?}, dataset_args={})",
            config.model_id, config.input_seq_len, config.pad_token_id, config.dataset_args
        );
        Ok((model, config))
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, route: &str, body: &B) -> Result<R> {
        let url = format!("{}/{route}", self.endpoint);
        let resp = self.client.post(&url).json(body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let msg = resp.text().await?;
            return Err(anyhow!("{url}: {status} - {msg}"));
        }
        Ok(resp.json().await?)
    }
}

impl LanguageModel for RemoteModel {
    async fn generate(
        &self,
        prompt: &[Token],
        temperature: f32,
        num_tokens_to_generate: usize,
    ) -> Result<Vec<Token>> {
        let body = GenerateRequest {
            model_id: &self.model_id,
            prompt,
            temperature,
            num_tokens_to_generate,
        };
        let resp: GenerateResponse = self.post("generate", &body).await?;
        Ok(resp.tokens)
    }

    async fn loss(&self, batch: &[Vec<Token>]) -> Result<f64> {
        let body = LossRequest {
            model_id: &self.model_id,
            batch,
        };
        let resp: LossResponse = self.post("loss", &body).await?;
        Ok(resp.loss)
    }
}

fn build_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_bodies() {
        let prompt: [Token; 2] = [104, 105];
        let body = GenerateRequest {
            model_id: "mblm-clevr",
            prompt: &prompt,
            temperature: 1.0,
            num_tokens_to_generate: 3,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"model_id": "mblm-clevr", "prompt": [104, 105], "temperature": 1.0, "num_tokens_to_generate": 3})
        );

        let batch: Vec<Vec<Token>> = vec![vec![1, 2, 3]];
        let body = LossRequest { model_id: "m", batch: &batch };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"model_id": "m", "batch": [[1, 2, 3]]})
        );

        let body = LoadRequest { model_id: "m", model_dir: Path::new("/ckpt"), device: "cuda" };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"model_id": "m", "model_dir": "/ckpt", "device": "cuda"})
        );
    }

    #[test]
    fn response_bodies() {
        let r: GenerateResponse = serde_json::from_str(r#"{"tokens": [1, 2, 300]}"#).unwrap();
        assert_eq!(r.tokens, vec![1, 2, 300]);
        let r: LossResponse = serde_json::from_str(r#"{"loss": 1.25}"#).unwrap();
        assert_eq!(r.loss, 1.25);
        let c: ModelConfig =
            serde_json::from_str(r#"{"model_id": "m", "input_seq_len": 8192, "extra": true}"#).unwrap();
        assert_eq!(c.input_seq_len, 8192);
        assert_eq!(c.pad_token_id, None);
        assert!(c.dataset_args.is_null());
    }

    #[test]
    fn config_keeps_pad_token_and_dataset_args() {
        let c: ModelConfig = serde_json::from_str(
            r#"{"model_id": "m", "input_seq_len": 8192, "pad_token_id": 256,
                "dataset_args": {"qiqa_loss_mask": [0.0, 0.0, 0.0, 1.0], "enable_images": true}}"#,
        )
        .unwrap();
        assert_eq!(c.pad_token_id, Some(256));
        assert_eq!(c.dataset_args["enable_images"], json!(true));
        assert_eq!(c.dataset_args["qiqa_loss_mask"][3], json!(1.0));
    }
}
