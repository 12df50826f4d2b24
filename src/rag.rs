//! The external RAG services: a similarity index over mutation documents and
//! a context-conditioned generator, plus their OpenAI-compatible
//! implementations (a local Ollama endpoint works via `base_url`).

use crate::corpus::MutationDoc;
use crate::RagFoldResult;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateEmbeddingRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

/// How many similar documents a retrieval returns by default.
pub const DEFAULT_TOP_K: usize = 4;

/// A similarity index over mutation documents.
///
/// One index lives exactly as long as one fold: created empty, populated once
/// with that fold's training documents, queried during that fold, dropped.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn add_documents(&mut self, docs: Vec<MutationDoc>) -> RagFoldResult<()>;

    /// Top-`k` most similar documents to `query`, most similar first.
    async fn retrieve(&self, query: &str, k: usize) -> RagFoldResult<Vec<MutationDoc>>;
}

/// Produces a brand-new, empty [`DocumentIndex`] for each fold.
pub trait IndexFactory: Send + Sync {
    fn create(&self) -> Box<dyn DocumentIndex>;
}

/// Answers a query conditioned on retrieved context.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> RagFoldResult<String>;
}

/// Chat-completions generator with a fixed system prompt.
pub struct ChatGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
}

impl ChatGenerator {
    pub fn new(api_key: String, model: String, system_prompt: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model,
            system_prompt,
        }
    }

    /// Points the generator at a custom OpenAI-compatible endpoint
    /// (e.g. `http://localhost:11434/v1` for Ollama, or a mock in tests).
    pub fn new_with_base_url(
        api_key: String,
        model: String,
        system_prompt: String,
        base_url: String,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Client::with_config(config),
            model,
            system_prompt,
        }
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, question: &str, context: &str) -> RagFoldResult<String> {
        let user_content = format!("RETRIEVED CONTEXT: {context}\nUSER QUERY: {question}");

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(self.system_prompt.as_str())
                        .build()?,
                ),
                ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(user_content)
                        .build()?,
                ),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;
        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// In-memory cosine-similarity index over embedding vectors fetched from an
/// OpenAI-compatible embeddings endpoint.
pub struct EmbeddingIndex {
    client: Client<OpenAIConfig>,
    model: String,
    entries: Vec<(MutationDoc, Vec<f32>)>,
}

impl EmbeddingIndex {
    fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            entries: Vec::new(),
        }
    }

    async fn embed(&self, texts: Vec<String>) -> RagFoldResult<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts)
            .build()?;
        let response = self.client.embeddings().create(request).await?;
        Ok(response.data.into_iter().map(|e| e.embedding).collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl DocumentIndex for EmbeddingIndex {
    async fn add_documents(&mut self, docs: Vec<MutationDoc>) -> RagFoldResult<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = docs.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embed(texts).await?;
        anyhow::ensure!(
            vectors.len() == docs.len(),
            "embeddings endpoint returned {} vectors for {} documents",
            vectors.len(),
            docs.len()
        );
        self.entries.extend(docs.into_iter().zip(vectors));
        Ok(())
    }

    async fn retrieve(&self, query: &str, k: usize) -> RagFoldResult<Vec<MutationDoc>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embeddings endpoint returned no query vector"))?;

        let mut scored: Vec<(f32, &MutationDoc)> = self
            .entries
            .iter()
            .map(|(doc, vector)| (cosine_similarity(&query_vector, vector), doc))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored.into_iter().take(k).map(|(_, doc)| doc.clone()).collect())
    }
}

/// Builds a fresh [`EmbeddingIndex`] per fold against a shared endpoint config.
pub struct EmbeddingIndexFactory {
    config: OpenAIConfig,
    model: String,
}

impl EmbeddingIndexFactory {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            config: OpenAIConfig::new().with_api_key(api_key),
            model,
        }
    }

    pub fn new_with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            config: OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(base_url),
            model,
        }
    }
}

impl IndexFactory for EmbeddingIndexFactory {
    fn create(&self) -> Box<dyn DocumentIndex> {
        Box::new(EmbeddingIndex::new(self.config.clone(), self.model.clone()))
    }
}
