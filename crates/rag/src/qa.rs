//! Retrieval QA over an embedded task index.

use std::sync::Arc;

use connectors::TaskDocument;
use llm::{
    AiProvider, ChatMessage, EmbeddingProvider, GenerateOptions, LlmError, PromptManager,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::chunks;
use crate::index::VectorIndex;

/// Errors from the retrieval QA pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Model or embedding call failed
    #[error("Model error: {0}")]
    Llm(#[from] LlmError),

    /// No documents have been indexed for this session
    #[error("No task data indexed; connect a platform and pull data first")]
    EmptyIndex,
}

/// Result alias for RAG operations.
pub type RagResult<T> = Result<T, RagError>;

/// A question answered with its supporting context.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Model-generated answer text
    pub answer: String,
    /// Retrieved chunks the answer was grounded on, best match first
    pub context: Vec<String>,
    /// Model that produced the answer
    pub model: String,
}

/// Embeds task documents and answers questions against them.
pub struct RetrievalQa {
    chat: Arc<dyn AiProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    prompts: PromptManager,
    chat_model: String,
    embed_model: String,
    top_k: usize,
}

impl RetrievalQa {
    /// Create a pipeline over the given providers.
    pub fn new(
        chat: Arc<dyn AiProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        prompts: PromptManager,
        chat_model: impl Into<String>,
        embed_model: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            chat,
            embedder,
            prompts,
            chat_model: chat_model.into(),
            embed_model: embed_model.into(),
            top_k,
        }
    }

    /// Chunk and embed `documents` into a fresh index.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn build_index(&self, documents: &[TaskDocument]) -> RagResult<VectorIndex> {
        let chunk_texts = chunks::from_documents(documents);
        if chunk_texts.is_empty() {
            return Ok(VectorIndex::new());
        }

        let embeddings = self.embedder.embed(&self.embed_model, &chunk_texts).await?;
        info!(chunks = chunk_texts.len(), "Built vector index");
        Ok(VectorIndex::from_pairs(chunk_texts, embeddings))
    }

    /// Answer `question` using the `top_k` most similar chunks in `index`.
    #[instrument(skip(self, index))]
    pub async fn ask(&self, index: &VectorIndex, question: &str) -> RagResult<Answer> {
        if index.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        let query = self
            .embedder
            .embed(&self.embed_model, &[question.to_string()])
            .await?;
        let query = query.first().ok_or(RagError::EmptyIndex)?;

        let context: Vec<String> = index
            .search(query, self.top_k)
            .into_iter()
            .map(|(text, _score)| text)
            .collect();
        debug!(retrieved = context.len(), "Retrieved context chunks");

        let prompt = self.prompts.render(
            "answer",
            &json!({ "context": context, "question": question }),
        )?;

        let response = self
            .chat
            .generate_text(
                &self.chat_model,
                &[ChatMessage::user(prompt)],
                &GenerateOptions::default(),
            )
            .await?;

        Ok(Answer {
            answer: response.text,
            context,
            model: response.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::Platform;
    use llm::{ChatResponse, LlmResult, TokenUsage};

    /// Chat stub that echoes a canned answer.
    struct FakeChat;

    #[async_trait]
    impl AiProvider for FakeChat {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            model: &str,
            messages: &[ChatMessage],
            _options: &GenerateOptions,
        ) -> LlmResult<ChatResponse> {
            assert!(messages[0].content.contains("## Question"));
            Ok(ChatResponse {
                text: "Two tasks are open.".into(),
                usage: TokenUsage::default(),
                model: model.to_string(),
                provider: "fake".into(),
            })
        }
    }

    /// Embedder stub: vector depends on whether the text mentions "login".
    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, _model: &str, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.to_lowercase().contains("login") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    fn pipeline() -> RetrievalQa {
        RetrievalQa::new(
            Arc::new(FakeChat),
            Arc::new(FakeEmbedder),
            PromptManager::new().unwrap(),
            "fake-chat",
            "fake-embed",
            2,
        )
    }

    fn doc(title: &str) -> TaskDocument {
        TaskDocument {
            platform: Platform::Linear,
            project: Some("Website".into()),
            section: None,
            title: title.into(),
            body: None,
            status: None,
            assignee: None,
            url: None,
        }
    }

    #[tokio::test]
    async fn test_build_and_ask() {
        let qa = pipeline();
        let index = qa
            .build_index(&[doc("Fix login"), doc("Update footer")])
            .await
            .unwrap();
        assert_eq!(index.len(), 3);

        let answer = qa.ask(&index, "what about the login page?").await.unwrap();
        assert_eq!(answer.answer, "Two tasks are open.");
        assert_eq!(answer.context.len(), 2);
        assert!(answer.context[0].contains("Fix login"));
    }

    #[tokio::test]
    async fn test_ask_empty_index() {
        let qa = pipeline();
        let err = qa.ask(&VectorIndex::new(), "anything?").await.unwrap_err();
        assert!(matches!(err, RagError::EmptyIndex));
    }

    #[tokio::test]
    async fn test_build_index_no_documents() {
        let qa = pipeline();
        let index = qa.build_index(&[]).await.unwrap();
        assert!(index.is_empty());
    }
}
