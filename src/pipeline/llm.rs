//! LLM interaction: send a rendered QA prompt to the provider.
//!
//! Prompt wording lives in [`crate::prompts`] and retrieval in
//! [`crate::pipeline::retrieve`]; this module builds the request, applies the
//! timeout and normalises the response.
//!
//! [`generate_streaming`] forwards text to a callback as the provider
//! produces it. The timeout covers the whole stream, not each piece.
//!
//! There is no retry loop. A failed question becomes an Error turn and the
//! user decides whether to ask again.

use crate::config::AssistantConfig;
use crate::error::QueryError;
use crate::pipeline::postprocess::clean_answer;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Raw generation result before sources are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Ask the provider to answer `prompt`.
///
/// The prompt already contains the retrieved context and the question, so it
/// is sent as a single user message.
pub async fn generate(
    provider: &Arc<dyn LLMProvider>,
    prompt: &str,
    options: &CompletionOptions,
    timeout_secs: u64,
) -> Result<Generation, QueryError> {
    let messages = vec![ChatMessage::user(prompt)];

    let response = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        provider.chat(&messages, Some(options)),
    )
    .await
    .map_err(|_| QueryError::Timeout { secs: timeout_secs })?
    .map_err(|e| QueryError::Provider(e.to_string()))?;

    debug!(
        "Answer: {} input tokens, {} output tokens",
        response.prompt_tokens, response.completion_tokens
    );

    let text = clean_answer(&response.content);
    if text.is_empty() {
        return Err(QueryError::EmptyAnswer);
    }

    Ok(Generation {
        text,
        input_tokens: response.prompt_tokens,
        output_tokens: response.completion_tokens,
    })
}

/// Stream an answer to `prompt`, handing each piece to `on_chunk`.
///
/// Providers report no token usage for streams, so both counts are 0.
pub async fn generate_streaming(
    provider: &Arc<dyn LLMProvider>,
    prompt: &str,
    timeout_secs: u64,
    on_chunk: &(dyn Fn(&str) + Send + Sync),
) -> Result<Generation, QueryError> {
    let collect = async {
        let mut stream = provider
            .stream(prompt)
            .await
            .map_err(|e| QueryError::Provider(e.to_string()))?;
        let mut raw = String::new();
        while let Some(piece) = stream.next().await {
            let piece = piece.map_err(|e| QueryError::Provider(e.to_string()))?;
            if !piece.is_empty() {
                on_chunk(&piece);
                raw.push_str(&piece);
            }
        }
        Ok::<String, QueryError>(raw)
    };

    let raw = tokio::time::timeout(Duration::from_secs(timeout_secs), collect)
        .await
        .map_err(|_| QueryError::Timeout { secs: timeout_secs })??;

    let text = clean_answer(&raw);
    if text.is_empty() {
        return Err(QueryError::EmptyAnswer);
    }
    debug!("Streamed answer: {} chars", text.chars().count());

    Ok(Generation {
        text,
        input_tokens: 0,
        output_tokens: 0,
    })
}

/// Build `CompletionOptions` from the assistant config.
pub fn build_options(config: &AssistantConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CannedLlm;
    use std::sync::Mutex;

    fn opts() -> CompletionOptions {
        build_options(&AssistantConfig::default())
    }

    #[tokio::test]
    async fn answer_is_cleaned_and_counted() {
        let provider: Arc<dyn LLMProvider> = CannedLlm::answering("```\n保証期間は1年です。\n```");
        let g = generate(&provider, "prompt", &opts(), 5).await.unwrap();
        assert_eq!(g.text, "保証期間は1年です。");
        assert_eq!((g.input_tokens, g.output_tokens), (120, 30));
    }

    #[tokio::test]
    async fn blank_answer_is_an_error() {
        let provider: Arc<dyn LLMProvider> = CannedLlm::answering(" \n\u{200B}\n ");
        let err = generate(&provider, "prompt", &opts(), 5).await.unwrap_err();
        assert_eq!(err, QueryError::EmptyAnswer);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider: Arc<dyn LLMProvider> =
            CannedLlm::slow("too late", Duration::from_millis(2500));
        let err = generate(&provider, "prompt", &opts(), 1).await.unwrap_err();
        assert_eq!(err, QueryError::Timeout { secs: 1 });
    }

    #[tokio::test]
    async fn streamed_pieces_reach_the_callback() {
        let provider: Arc<dyn LLMProvider> = CannedLlm::streaming(&["保証", "期間は", "1年です。"]);
        let seen = Mutex::new(Vec::new());
        let sink = |piece: &str| seen.lock().unwrap().push(piece.to_string());

        let g = generate_streaming(&provider, "prompt", 5, &sink).await.unwrap();

        assert_eq!(g.text, "保証期間は1年です。");
        assert_eq!(*seen.lock().unwrap(), vec!["保証", "期間は", "1年です。"]);
    }

    #[test]
    fn build_options_defaults() {
        let config = AssistantConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(1024));
    }
}
