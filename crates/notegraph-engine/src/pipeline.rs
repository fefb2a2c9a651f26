//! Retrieval-augmented pipeline: ingestion, question answering, tag and
//! summary generation.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use notegraph_core::vector::{centroid, cosine_similarity};
use notegraph_core::{EngineConfig, Error, Result};
use notegraph_ingest::chunk_text;
use notegraph_provider::{CompletionProvider, EmbeddingProvider, PageContent, PageProvider};
use notegraph_store::{ChunkStore, NewChunk, ScoredChunk};

const TAG_PROMPT: &str = "Based on the following content, generate 3 to 5 relevant and concise tags that best describe the main topics or themes. Avoid long phrases. Only return the tags as a comma-separated list.";

const SUMMARY_PROMPT: &str = "Based on the following content, write a concise summary capturing the main ideas or themes. Keep it short and informative (2-4 sentences)";

/// Outcome of a bulk ingestion run. Best-effort: failed pages are counted,
/// not fatal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub pages_ingested: usize,
    pub pages_failed: usize,
    pub chunks_stored: usize,
}

/// Orchestrates chunking, embedding, storage, and retrieval for one
/// deployment's chunk store and providers.
pub struct RagPipeline {
    store: Arc<ChunkStore>,
    pages: Arc<dyn PageProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
    config: EngineConfig,
    /// Per-(owner, page) locks serializing delete+insert on re-ingestion.
    scope_locks: DashMap<(i64, i64), Arc<Mutex<()>>>,
}

impl RagPipeline {
    pub fn new(
        store: Arc<ChunkStore>,
        pages: Arc<dyn PageProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            pages,
            embedder,
            completion,
            config,
            scope_locks: DashMap::new(),
        }
    }

    // ---------------------------------------------------------------
    // Bulk ingestion
    // ---------------------------------------------------------------

    /// Re-ingest every page belonging to an owner.
    ///
    /// All prior chunks for the owner are removed, then pages are chunked,
    /// embedded, and stored by a bounded worker pool. A failing page is
    /// logged and skipped; it never aborts its siblings. The call returns
    /// once every worker has finished.
    pub async fn ingest_all_pages(&self, owner_id: i64) -> Result<IngestReport> {
        let pages = self.pages.pages_by_owner(owner_id).await?;

        // The owner-wide delete must finish before the first worker
        // inserts, or it could wipe a fast worker's fresh chunks.
        self.store.delete_by_owner(owner_id)?;

        let semaphore = Arc::new(Semaphore::new(self.config.ingest_concurrency.max(1)));
        let mut handles = Vec::with_capacity(pages.len());

        for page in pages {
            let store = self.store.clone();
            let embedder = self.embedder.clone();
            let semaphore = semaphore.clone();
            let chunk_size = self.config.chunk_size;

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let page_id = page.page_id;
                let result =
                    embed_and_store_page(&store, embedder.as_ref(), owner_id, &page, chunk_size)
                        .await;
                (page_id, result)
            }));
        }

        let mut report = IngestReport::default();
        for joined in join_all(handles).await {
            match joined {
                Ok((page_id, Ok(stored))) => {
                    report.pages_ingested += 1;
                    report.chunks_stored += stored;
                    debug!("Ingested page {} ({} chunks)", page_id, stored);
                }
                Ok((page_id, Err(e))) => {
                    report.pages_failed += 1;
                    warn!("Failed to ingest page {}: {}", page_id, e);
                }
                Err(e) => {
                    report.pages_failed += 1;
                    warn!("Ingest worker panicked: {}", e);
                }
            }
        }

        info!(
            "Bulk ingest for owner {}: {} pages, {} chunks, {} failed",
            owner_id, report.pages_ingested, report.chunks_stored, report.pages_failed
        );
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Single-page ingestion + generation
    // ---------------------------------------------------------------

    /// Re-ingest one page, then generate tags or a summary for it.
    ///
    /// With `want_tags` the completion's comma-separated tags are scored
    /// against the page centroid and returned as a relevance report;
    /// otherwise the completion text is returned as the summary.
    pub async fn ingest_page_and_answer(
        &self,
        owner_id: i64,
        page_id: i64,
        want_tags: bool,
    ) -> Result<String> {
        let page = self.pages.page_by_id(page_id).await?;

        // Serialize delete+insert per (owner, page); concurrent
        // re-ingestion of the same scope would interleave in undefined
        // order otherwise.
        let lock = self.scope_lock(owner_id, page_id);
        let page_vectors = {
            let _guard = lock.lock().await;
            self.store.delete_by_owner_and_page(owner_id, page_id)?;

            let segments = chunk_text(&page.text_content, self.config.chunk_size)?;
            let mut batch = Vec::with_capacity(segments.len());
            let mut vectors = Vec::with_capacity(segments.len());
            for segment in segments {
                let vector = self.embedder.embed(&segment).await?;
                vectors.push(vector.clone());
                batch.push(NewChunk {
                    text: segment,
                    owner_id,
                    workspace_id: page.workspace_id,
                    page_id,
                    vector,
                });
            }
            self.store.insert_batch(&batch)?;
            vectors
        };

        let prompt = if want_tags { TAG_PROMPT } else { SUMMARY_PROMPT };
        let query = self.embedder.embed(prompt).await?;
        let top = self
            .store
            .find_nearest_in_page(&query, page_id, self.config.retrieval_top_k)?;

        let mut request = assemble_context(&top);
        request.push_str(prompt);
        let answer = self.completion.complete(&request).await?;

        if want_tags {
            self.score_tags(&answer, &page_vectors).await
        } else {
            Ok(answer)
        }
    }

    /// Score each generated tag against the page centroid and format the
    /// relevance report.
    async fn score_tags(&self, answer: &str, page_vectors: &[Vec<f64>]) -> Result<String> {
        let page_vector = centroid(page_vectors)?;

        let mut lines = Vec::new();
        for raw_tag in answer.split(',') {
            let tag = raw_tag.trim();
            if tag.is_empty() {
                continue;
            }
            let tag_vector = self.embedder.embed(tag).await?;
            if tag_vector.len() != page_vector.len() {
                return Err(Error::DimensionMismatch {
                    expected: page_vector.len(),
                    actual: tag_vector.len(),
                });
            }
            let similarity = cosine_similarity(&tag_vector, &page_vector);
            lines.push(format!(
                "Tag: {} | Relevance: {:.2}%",
                tag,
                similarity * 100.0
            ));
        }
        Ok(lines.join("\n"))
    }

    // ---------------------------------------------------------------
    // Question answering
    // ---------------------------------------------------------------

    /// Answer a free-text question from the owner's stored chunks.
    pub async fn answer_question(&self, owner_id: i64, question: &str) -> Result<String> {
        let query = self.embedder.embed(question).await?;
        let top = self
            .store
            .find_nearest(&query, Some(owner_id), self.config.retrieval_top_k)?;

        let mut request = assemble_context(&top);
        request.push_str(&format!("User Question: {}\n", question));
        request.push_str("Instructions:\n");
        request.push_str("- Base your answer only on the context provided.\n");

        self.completion.complete(&request).await
    }

    /// Summarize raw editor content (JSON or plain structured text)
    /// without touching the chunk store.
    pub async fn summarize_editor_content(&self, content: &str) -> Result<String> {
        let prompt = format!(
            "You are a summarization assistant.\n\n\
             Below is the content of a rich text editor in JSON or plain structured format. \
             Summarize the key idea, extract the title if available, and present a concise \
             and meaningful summary in plain English.\n\n\
             Content:\n===\n{}\n===\n\n\
             Instructions:\n\
             - If there are tasks or bullet points, briefly summarize their intent or list them clearly.\n\
             - Maintain important names, tools, or technical concepts mentioned.\n\
             - Make the summary 1-3 sentences long.\n\
             - Avoid extra explanation or metadata, just return the clean summary.\n",
            content
        );
        self.completion.complete(&prompt).await
    }

    fn scope_lock(&self, owner_id: i64, page_id: i64) -> Arc<Mutex<()>> {
        self.scope_locks
            .entry((owner_id, page_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

/// Chunk a page, embed every segment, and store the batch under the
/// page's scope. Returns the number of chunks stored.
async fn embed_and_store_page(
    store: &ChunkStore,
    embedder: &dyn EmbeddingProvider,
    owner_id: i64,
    page: &PageContent,
    chunk_size: usize,
) -> Result<usize> {
    let segments = chunk_text(&page.text_content, chunk_size)?;
    let mut batch = Vec::with_capacity(segments.len());
    for segment in segments {
        let vector = embedder.embed(&segment).await?;
        batch.push(NewChunk {
            text: segment,
            owner_id,
            workspace_id: page.workspace_id,
            page_id: page.page_id,
            vector,
        });
    }
    store.insert_batch(&batch)
}

/// Numbered context block handed to the completion provider.
fn assemble_context(chunks: &[ScoredChunk]) -> String {
    let mut context = String::from("Context:\n");
    for (i, hit) in chunks.iter().enumerate() {
        context.push_str(&format!("{}. {}\n\n", i + 1, hit.chunk.text));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct StaticPages {
        pages: Vec<PageContent>,
    }

    #[async_trait]
    impl PageProvider for StaticPages {
        async fn pages_by_owner(&self, _owner_id: i64) -> Result<Vec<PageContent>> {
            Ok(self.pages.clone())
        }

        async fn page_by_id(&self, page_id: i64) -> Result<PageContent> {
            self.pages
                .iter()
                .find(|p| p.page_id == page_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("page {}", page_id)))
        }
    }

    /// Embedder returning canned vectors by exact text, with a fallback.
    struct StubEmbedder {
        map: HashMap<String, Vec<f64>>,
        fallback: Vec<f64>,
        fail_on: Option<String>,
    }

    impl StubEmbedder {
        fn with_fallback(fallback: Vec<f64>) -> Self {
            Self {
                map: HashMap::new(),
                fallback,
                fail_on: None,
            }
        }

        fn insert(mut self, text: &str, vector: Vec<f64>) -> Self {
            self.map.insert(text.to_string(), vector);
            self
        }

        fn failing_on(mut self, text: &str) -> Self {
            self.fail_on = Some(text.to_string());
            self
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f64>> {
            if self.fail_on.as_deref() == Some(text) {
                return Err(Error::Upstream("stub failure".to_string()));
            }
            Ok(self.map.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
        }
    }

    /// Completion stub that records every prompt it receives.
    struct StubCompletion {
        answer: String,
        prompts: parking_lot::Mutex<Vec<String>>,
    }

    impl StubCompletion {
        fn answering(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for StubCompletion {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            Ok(self.answer.clone())
        }
    }

    fn page(page_id: i64, workspace_id: i64, title: &str, text: &str) -> PageContent {
        PageContent {
            page_id,
            workspace_id,
            title: title.to_string(),
            tags: Vec::new(),
            text_content: text.to_string(),
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            embedding_dim: 3,
            ..EngineConfig::default()
        }
    }

    fn pipeline_with(
        dir: &TempDir,
        pages: Vec<PageContent>,
        embedder: StubEmbedder,
        completion: StubCompletion,
    ) -> (RagPipeline, Arc<ChunkStore>, Arc<StubCompletion>) {
        let store = Arc::new(ChunkStore::open(dir.path(), 3).unwrap());
        let completion = Arc::new(completion);
        let pipeline = RagPipeline::new(
            store.clone(),
            Arc::new(StaticPages { pages }),
            Arc::new(embedder),
            completion.clone(),
            test_config(),
        );
        (pipeline, store, completion)
    }

    #[tokio::test]
    async fn test_ingest_all_pages() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store, _) = pipeline_with(
            &dir,
            vec![
                page(100, 10, "First", "alpha beta"),
                page(101, 10, "Second", "gamma delta"),
            ],
            StubEmbedder::with_fallback(vec![1.0, 0.0, 0.0]),
            StubCompletion::answering(""),
        );

        let report = pipeline.ingest_all_pages(1).await.unwrap();
        assert_eq!(report.pages_ingested, 2);
        assert_eq!(report.pages_failed, 0);
        assert_eq!(report.chunks_stored, 2);
        assert_eq!(store.count_chunks().unwrap(), 2);

        // Re-ingesting replaces rather than accumulates.
        pipeline.ingest_all_pages(1).await.unwrap();
        assert_eq!(store.count_chunks().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ingest_all_continues_past_page_failures() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store, _) = pipeline_with(
            &dir,
            vec![
                page(100, 10, "Good", "healthy content"),
                page(101, 10, "Bad", "poison"),
            ],
            StubEmbedder::with_fallback(vec![1.0, 0.0, 0.0]).failing_on("poison"),
            StubCompletion::answering(""),
        );

        let report = pipeline.ingest_all_pages(1).await.unwrap();
        assert_eq!(report.pages_ingested, 1);
        assert_eq!(report.pages_failed, 1);
        assert_eq!(store.count_chunks().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_page_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store, _) = pipeline_with(
            &dir,
            vec![page(100, 10, "Note", "some page content")],
            StubEmbedder::with_fallback(vec![1.0, 0.0, 0.0]),
            StubCompletion::answering("a short summary"),
        );

        let first = pipeline.ingest_page_and_answer(1, 100, false).await.unwrap();
        assert_eq!(first, "a short summary");
        let after_one = store.find_by_owner_and_page(1, 100).unwrap().len();

        pipeline.ingest_page_and_answer(1, 100, false).await.unwrap();
        let after_two = store.find_by_owner_and_page(1, 100).unwrap().len();
        assert_eq!(after_one, after_two);
    }

    #[tokio::test]
    async fn test_answer_question_prompt_format() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store, completion) = pipeline_with(
            &dir,
            Vec::new(),
            StubEmbedder::with_fallback(vec![0.0, 0.0, 1.0])
                .insert("What is the plan?", vec![1.0, 0.0, 0.0]),
            StubCompletion::answering("the answer"),
        );

        store
            .insert_batch(&[
                NewChunk {
                    text: "closest".to_string(),
                    owner_id: 1,
                    workspace_id: 10,
                    page_id: 100,
                    vector: vec![1.0, 0.0, 0.0],
                },
                NewChunk {
                    text: "second".to_string(),
                    owner_id: 1,
                    workspace_id: 10,
                    page_id: 100,
                    vector: vec![1.0, 1.0, 0.0],
                },
            ])
            .unwrap();

        let answer = pipeline.answer_question(1, "What is the plan?").await.unwrap();
        assert_eq!(answer, "the answer");

        let prompts = completion.prompts.lock();
        assert_eq!(
            prompts[0],
            "Context:\n\
             1. closest\n\n\
             2. second\n\n\
             User Question: What is the plan?\n\
             Instructions:\n\
             - Base your answer only on the context provided.\n"
        );
    }

    #[tokio::test]
    async fn test_answer_question_scoped_to_owner() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store, completion) = pipeline_with(
            &dir,
            Vec::new(),
            StubEmbedder::with_fallback(vec![1.0, 0.0, 0.0]),
            StubCompletion::answering("ok"),
        );

        store
            .insert_batch(&[NewChunk {
                text: "someone else's note".to_string(),
                owner_id: 2,
                workspace_id: 10,
                page_id: 200,
                vector: vec![1.0, 0.0, 0.0],
            }])
            .unwrap();

        pipeline.answer_question(1, "anything").await.unwrap();

        // No chunks for owner 1: the context block is empty.
        let prompts = completion.prompts.lock();
        assert!(prompts[0].starts_with("Context:\nUser Question:"));
    }

    #[tokio::test]
    async fn test_tag_report_format() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _store, _) = pipeline_with(
            &dir,
            vec![page(100, 10, "Note", "all about rust")],
            StubEmbedder::with_fallback(vec![1.0, 0.0, 0.0])
                .insert("rust", vec![1.0, 0.0, 0.0])
                .insert("graphs", vec![0.0, 1.0, 0.0]),
            StubCompletion::answering("rust, graphs"),
        );

        let report = pipeline.ingest_page_and_answer(1, 100, true).await.unwrap();
        assert_eq!(
            report,
            "Tag: rust | Relevance: 100.00%\nTag: graphs | Relevance: 0.00%"
        );
    }

    #[tokio::test]
    async fn test_tags_for_empty_page_fail_with_empty_input() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _store, _) = pipeline_with(
            &dir,
            vec![page(100, 10, "Blank", "")],
            StubEmbedder::with_fallback(vec![1.0, 0.0, 0.0]),
            StubCompletion::answering("tag-a, tag-b"),
        );

        let result = pipeline.ingest_page_and_answer(1, 100, true).await;
        assert!(matches!(result, Err(Error::EmptyInput(_))));
    }

    #[tokio::test]
    async fn test_summarize_editor_content_wraps_prompt() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _store, completion) = pipeline_with(
            &dir,
            Vec::new(),
            StubEmbedder::with_fallback(vec![1.0, 0.0, 0.0]),
            StubCompletion::answering("summary text"),
        );

        let answer = pipeline
            .summarize_editor_content("{\"blocks\": []}")
            .await
            .unwrap();
        assert_eq!(answer, "summary text");

        let prompts = completion.prompts.lock();
        assert!(prompts[0].contains("Content:\n===\n{\"blocks\": []}\n===\n"));
        assert!(prompts[0].starts_with("You are a summarization assistant."));
    }

    #[tokio::test]
    async fn test_missing_page_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _store, _) = pipeline_with(
            &dir,
            Vec::new(),
            StubEmbedder::with_fallback(vec![1.0, 0.0, 0.0]),
            StubCompletion::answering(""),
        );

        let result = pipeline.ingest_page_and_answer(1, 404, false).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
