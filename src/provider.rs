//! LLM and embedding provider resolution.

use crate::config::AssistantConfig;
use crate::error::PdfQaError;
use edgequake_llm::{EmbeddingProvider, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Resolve the chat provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key (`OPENAI_API_KEY`, …) from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, so users holding several keys
///    get OpenAI unless they ask otherwise.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &AssistantConfig) -> Result<Arc<dyn LLMProvider>, PdfQaError> {
    match explicit_provider(config)? {
        Some(provider) => Ok(provider),
        None => Ok(providers_from_env()?.0),
    }
}

/// Resolve the chat provider and the embedding provider used for retrieval.
///
/// The embedding provider is `config.embedding_provider` when set, otherwise
/// the one [`ProviderFactory::from_env`] pairs with the detected chat
/// provider.
pub fn resolve_providers(
    config: &AssistantConfig,
) -> Result<(Arc<dyn LLMProvider>, Arc<dyn EmbeddingProvider>), PdfQaError> {
    let (llm, env_embedder) = match explicit_provider(config)? {
        Some(provider) => (provider, None),
        None => {
            let (llm, embedder) = providers_from_env()?;
            (llm, Some(embedder))
        }
    };

    let embedder = match (config.embedding_provider.clone(), env_embedder) {
        (Some(embedder), _) => embedder,
        (None, Some(embedder)) => embedder,
        (None, None) => providers_from_env()?.1,
    };
    debug!(
        "Using chat model '{}' and embedding model '{}'",
        llm.model(),
        embedder.model()
    );
    Ok((llm, embedder))
}

/// Steps 1–4 of [`resolve_provider`]; `None` means fall back to auto-detection.
fn explicit_provider(config: &AssistantConfig) -> Result<Option<Arc<dyn LLMProvider>>, PdfQaError> {
    if let Some(ref provider) = config.provider {
        return Ok(Some(Arc::clone(provider)));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default()).map(Some);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model).map(Some);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_or_default()).map(Some);
        }
    }

    Ok(None)
}

fn providers_from_env(
) -> Result<(Arc<dyn LLMProvider>, Arc<dyn EmbeddingProvider>), PdfQaError> {
    ProviderFactory::from_env().map_err(|e| PdfQaError::ProviderNotConfigured {
        provider: "auto".to_string(),
        hint: format!(
            "No LLM provider could be auto-detected from environment.\n\
            Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
            Error: {}",
            e
        ),
    })
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PdfQaError> {
    debug!("Creating provider '{}' with model '{}'", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PdfQaError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CannedLlm, KeywordEmbedder};

    #[test]
    fn prebuilt_providers_are_used_as_is() {
        let config = AssistantConfig::builder()
            .provider(CannedLlm::answering("ok"))
            .embedding_provider(KeywordEmbedder::new(&["a"]))
            .build()
            .unwrap();

        let (llm, embedder) = resolve_providers(&config).unwrap();
        assert_eq!(llm.name(), "canned");
        assert_eq!(embedder.name(), "keywords");
    }
}
