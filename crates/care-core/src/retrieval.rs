use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{info, warn};

use crate::citations::{assemble, render_sources};
use crate::knowledge::{IndexError, SimilarityIndex};
use crate::lexicon::{KeywordLexicon, STANDARD_LEXICON};
use crate::llm::{GenerationError, GenerationRequest, TextGenerator};
use crate::models::{AnswerBundle, AnswerMethod, Citation, RetrievedPassage};
use crate::prompts;
use crate::web_search::{SearchError, WebSearch, WebSearchResponse};

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub web_max_results: usize,
    pub web_citation_limit: usize,
    pub web_query_prefix: Option<String>,
    pub collaborator_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            web_max_results: 3,
            web_citation_limit: 3,
            web_query_prefix: Some("nephrology".to_string()),
            collaborator_timeout: Duration::from_secs(20),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

/// Knowledge base first, web search when the query asks for recent material or the
/// knowledge base has nothing, templated degradation otherwise. Never returns an error;
/// collaborator faults become `no_context`, `no_web_results` or `error` bundles.
pub struct RetrievalCoordinator {
    lexicon: KeywordLexicon,
    index: Arc<dyn SimilarityIndex>,
    web_search: Option<Arc<dyn WebSearch>>,
    generator: Arc<dyn TextGenerator>,
    settings: RetrievalSettings,
}

impl RetrievalCoordinator {
    pub fn new(
        index: Arc<dyn SimilarityIndex>,
        web_search: Option<Arc<dyn WebSearch>>,
        generator: Arc<dyn TextGenerator>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            lexicon: STANDARD_LEXICON,
            index,
            web_search,
            generator,
            settings,
        }
    }

    pub fn has_web_search(&self) -> bool {
        self.web_search.is_some()
    }

    pub async fn answer(&self, query: &str, supplementary: Option<&str>) -> AnswerBundle {
        let started = Instant::now();
        let passages = self.retrieve(query).await;
        let recency = self.lexicon.has_recency_signal(query);
        let needs_web = recency || passages.is_empty();

        let bundle = match (&self.web_search, needs_web) {
            (Some(web_search), true) => {
                self.answer_from_web(web_search.as_ref(), query, supplementary)
                    .await
            }
            _ if passages.is_empty() => {
                AnswerBundle::new(AnswerMethod::NoContext, prompts::no_context_text())
            }
            _ => {
                self.answer_from_passages(query, &passages, supplementary)
                    .await
            }
        };

        info!(
            method = bundle.method.as_str(),
            passages = passages.len(),
            recency,
            citations = bundle.citations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "retrieval answer produced"
        );
        bundle
    }

    async fn retrieve(&self, query: &str) -> Vec<RetrievedPassage> {
        let top_k = self.settings.top_k;
        let result = self
            .bounded(self.index.search(query, top_k))
            .await
            .unwrap_or_else(|| Err(IndexError::Unavailable("timed out".to_string())));

        match result {
            Ok(hits) => RetrievedPassage::rank_hits(hits, top_k),
            Err(err) => {
                warn!("similarity search failed, continuing without passages: {err}");
                Vec::new()
            }
        }
    }

    async fn answer_from_passages(
        &self,
        query: &str,
        passages: &[RetrievedPassage],
        supplementary: Option<&str>,
    ) -> AnswerBundle {
        let assembled = assemble(passages);
        let request = GenerationRequest::new(
            prompts::CLINICAL_SYSTEM_PROMPT,
            prompts::rag_user_prompt(query, &assembled.context, supplementary),
        )
        .with_sampling(self.settings.temperature, self.settings.max_tokens);

        match self.generate(request).await {
            Ok(text) => {
                let sources = prompts::sources_section(&render_sources(&assembled.citations), false);
                AnswerBundle::new(
                    AnswerMethod::Rag,
                    format!("{text}\n\n{sources}\n\n{}", prompts::MEDICAL_DISCLAIMER),
                )
                .with_citations(assembled.citations)
            }
            Err(err) => {
                warn!(
                    citations = assembled.citations.len(),
                    "answer generation failed: {err}"
                );
                AnswerBundle::new(AnswerMethod::Error, prompts::error_text())
                    .with_citations(assembled.citations)
            }
        }
    }

    async fn answer_from_web(
        &self,
        web_search: &dyn WebSearch,
        query: &str,
        supplementary: Option<&str>,
    ) -> AnswerBundle {
        let web_query = match self.settings.web_query_prefix.as_deref() {
            Some(prefix) if !prefix.trim().is_empty() => format!("{} {query}", prefix.trim()),
            _ => query.to_string(),
        };

        let result = self
            .bounded(web_search.search(&web_query, self.settings.web_max_results))
            .await
            .unwrap_or(Err(SearchError::Timeout));

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!("web search failed: {err}");
                return AnswerBundle::new(AnswerMethod::Error, prompts::error_text());
            }
        };

        if !response.is_useful() {
            return AnswerBundle::new(AnswerMethod::NoWebResults, prompts::no_web_results_text());
        }

        let cited = self.settings.web_citation_limit.min(response.results.len());
        let citations = web_citations(&response, cited);
        let request = GenerationRequest::new(
            prompts::WEB_SYSTEM_PROMPT,
            prompts::web_user_prompt(query, &response, cited, supplementary),
        )
        .with_sampling(self.settings.temperature, self.settings.max_tokens);

        let body = match self.generate(request).await {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    web_results = response.results.len(),
                    "web answer generation failed, using search summary: {err}"
                );
                prompts::web_fallback_text(&response, cited)
            }
        };

        let mut text = body;
        if !citations.is_empty() {
            text.push_str("\n\n");
            text.push_str(&prompts::sources_section(&render_sources(&citations), true));
        }
        text.push_str("\n\n");
        text.push_str(prompts::WEB_DISCLAIMER);

        AnswerBundle::new(AnswerMethod::WebSearch, text).with_citations(citations)
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.bounded(self.generator.complete(request))
            .await
            .unwrap_or(Err(GenerationError::Timeout))
    }

    /// `None` when the collaborator did not finish within the configured timeout.
    async fn bounded<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        timeout(self.settings.collaborator_timeout, future).await.ok()
    }
}

fn web_citations(response: &WebSearchResponse, cited: usize) -> Vec<Citation> {
    response
        .results
        .iter()
        .take(cited)
        .enumerate()
        .map(|(index, result)| Citation {
            rank: index + 1,
            locator: result.title.clone(),
            url: Some(result.url.clone()),
        })
        .collect()
}
