pub mod client;

pub use client::*;

use thiserror::Error;

/// Sampling options forwarded to the generation backend.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Nucleus sampling cutoff
    pub top_p: f64,
    /// Top-k sampling cutoff
    pub top_k: u32,
    /// Maximum tokens in the reply
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

/// Failure from the generation backend. Kept distinct from normalization
/// failures so callers can tell an upstream error from a bad reply.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("request to generation API failed")]
    Http(#[from] reqwest::Error),
    #[error("generation API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("generation API reply contained no text")]
    Empty,
}

/// The external generation capability. Extractors only depend on this
/// trait; tests substitute canned replies for the live client.
pub trait Generate {
    fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<String, GenerateError>>;
}

impl<G: Generate> Generate for &G {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerateError> {
        (**self).generate(prompt, options).await
    }
}
