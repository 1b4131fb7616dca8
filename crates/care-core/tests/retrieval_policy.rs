mod support;

use care_core::llm::GenerationError;
use care_core::models::AnswerMethod;
use care_core::prompts::{MEDICAL_DISCLAIMER, WEB_DISCLAIMER};
use care_core::web_search::{SearchError, WebSearchResponse};
use support::{
    IndexBehavior, StubGenerator, StubIndex, StubWebSearch, coordinator, passage, passages,
    web_response,
};

#[tokio::test]
async fn answers_from_passages_with_ranked_citations() {
    let generator = StubGenerator::with_responses(vec![Ok(
        "Leg swelling is common in CKD [Source 1].".to_string()
    )]);
    let web_search = StubWebSearch::default();
    let retrieval = coordinator(
        StubIndex::with_hits(passages(3)),
        Some(web_search.clone()),
        generator.clone(),
    );

    let bundle = retrieval
        .answer("I have swelling in my legs, is this normal?", Some("Patient Context:\n- Name: Adam King"))
        .await;

    assert_eq!(bundle.method, AnswerMethod::Rag);
    let ranks = bundle.citations.iter().map(|citation| citation.rank).collect::<Vec<_>>();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(bundle.citations[0].locator, "Page 100");
    assert!(bundle.text.starts_with("Leg swelling is common in CKD"));
    assert!(bundle.text.contains("Source 3: Page 102"));
    assert!(bundle.text.ends_with(MEDICAL_DISCLAIMER));
    assert!(web_search.queries().await.is_empty());

    let seen = generator.seen().await;
    assert_eq!(seen.len(), 1);
    assert!(seen[0].user_prompt.contains("[Source 1: Page 100]"));
    assert!(seen[0].user_prompt.contains("PATIENT INFORMATION:"));
    assert!(seen[0].system_prompt.contains("[Source N]"));
    assert!((seen[0].temperature - 0.3).abs() < f32::EPSILON);
}

#[tokio::test]
async fn recency_keyword_forces_web_search_even_with_strong_passages() {
    let web_search = StubWebSearch::with_responses(vec![Ok(web_response(5))]);
    let generator = StubGenerator::with_responses(vec![Ok(
        "Recent trials show benefit [Source 1].".to_string()
    )]);
    let retrieval = coordinator(
        StubIndex::with_hits(vec![passage(7, 0.99), passage(8, 0.98)]),
        Some(web_search.clone()),
        generator,
    );

    let bundle = retrieval
        .answer("What's the latest research on SGLT2 inhibitors?", None)
        .await;

    assert_eq!(bundle.method, AnswerMethod::WebSearch);
    assert_eq!(bundle.citations.len(), 3);
    assert_eq!(
        bundle.citations[0].url.as_deref(),
        Some("https://example.org/trial-1")
    );
    assert!(bundle.text.contains("Sources (recent literature)"));
    assert!(bundle.text.ends_with(WEB_DISCLAIMER));

    let queries = web_search.queries().await;
    assert_eq!(
        queries,
        vec![(
            "nephrology What's the latest research on SGLT2 inhibitors?".to_string(),
            3
        )]
    );
}

#[tokio::test]
async fn empty_index_without_web_search_is_no_context() {
    let generator = StubGenerator::default();
    let retrieval = coordinator(StubIndex::empty(), None, generator.clone());

    let bundle = retrieval.answer("Why do my ankles hurt?", None).await;

    assert_eq!(bundle.method, AnswerMethod::NoContext);
    assert!(bundle.citations.is_empty());
    assert!(bundle.text.contains(MEDICAL_DISCLAIMER));
    assert_eq!(generator.calls().await, 0);
}

#[tokio::test]
async fn empty_index_with_web_search_falls_back_to_web() {
    let web_search = StubWebSearch::with_responses(vec![Ok(web_response(1))]);
    let generator = StubGenerator::with_responses(vec![Ok("Summary [Source 1].".to_string())]);
    let retrieval = coordinator(StubIndex::empty(), Some(web_search.clone()), generator);

    let bundle = retrieval.answer("Why do my ankles hurt?", None).await;

    assert_eq!(bundle.method, AnswerMethod::WebSearch);
    assert_eq!(bundle.citations.len(), 1);
    assert_eq!(web_search.queries().await.len(), 1);
}

#[tokio::test]
async fn web_search_with_nothing_useful_is_no_web_results() {
    let web_search = StubWebSearch::with_responses(vec![Ok(WebSearchResponse {
        direct_answer: Some("  ".to_string()),
        results: Vec::new(),
    })]);
    let generator = StubGenerator::default();
    let retrieval = coordinator(StubIndex::empty(), Some(web_search), generator.clone());

    let bundle = retrieval.answer("any new dialysis guidelines?", None).await;

    assert_eq!(bundle.method, AnswerMethod::NoWebResults);
    assert!(bundle.citations.is_empty());
    assert_eq!(generator.calls().await, 0);
}

#[tokio::test]
async fn web_search_failure_is_an_error_bundle_without_retry() {
    let web_search = StubWebSearch::with_responses(vec![
        Err(SearchError::ProviderFailure("status=503".to_string())),
        Ok(web_response(2)),
    ]);
    let retrieval = coordinator(
        StubIndex::with_hits(passages(2)),
        Some(web_search.clone()),
        StubGenerator::default(),
    );

    let bundle = retrieval.answer("latest potassium guidance", None).await;

    assert_eq!(bundle.method, AnswerMethod::Error);
    assert!(bundle.text.contains(MEDICAL_DISCLAIMER));
    assert_eq!(web_search.queries().await.len(), 1);
}

#[tokio::test]
async fn recency_without_web_search_uses_passages() {
    let generator = StubGenerator::with_responses(vec![Ok("From the book [Source 1].".to_string())]);
    let retrieval = coordinator(StubIndex::with_hits(passages(2)), None, generator);

    let bundle = retrieval.answer("current dialysis guidelines", None).await;

    assert_eq!(bundle.method, AnswerMethod::Rag);
    assert_eq!(bundle.citations.len(), 2);
}

#[tokio::test]
async fn generation_failure_keeps_gathered_citations() {
    let generator = StubGenerator::with_responses(vec![Err(GenerationError::Rejected(
        "status=400 code=bad_request".to_string(),
    ))]);
    let retrieval = coordinator(
        StubIndex::with_hits(passages(3)),
        None,
        generator.clone(),
    );

    let bundle = retrieval.answer("what does my creatinine mean?", None).await;

    assert_eq!(bundle.method, AnswerMethod::Error);
    assert_eq!(bundle.citations.len(), 3);
    assert!(bundle.text.contains(MEDICAL_DISCLAIMER));
    assert_eq!(generator.calls().await, 1);
}

#[tokio::test]
async fn index_failure_degrades_to_no_context() {
    let retrieval = coordinator(
        StubIndex::behaving(IndexBehavior::Fail),
        None,
        StubGenerator::default(),
    );

    let bundle = retrieval.answer("what does my creatinine mean?", None).await;

    assert_eq!(bundle.method, AnswerMethod::NoContext);
}

#[tokio::test]
async fn web_generation_failure_falls_back_to_search_summary() {
    let web_search = StubWebSearch::with_responses(vec![Ok(web_response(2))]);
    let generator = StubGenerator::with_responses(vec![Err(GenerationError::Timeout)]);
    let retrieval = coordinator(StubIndex::empty(), Some(web_search), generator);

    let bundle = retrieval.answer("recent SGLT2 trials", None).await;

    assert_eq!(bundle.method, AnswerMethod::WebSearch);
    assert!(bundle.text.contains("SGLT2 inhibitors slow CKD progression."));
    assert!(bundle.text.contains("Trial report 2"));
    assert_eq!(bundle.citations.len(), 2);
}

#[tokio::test]
async fn respects_top_k_and_score_order() {
    let index = StubIndex::with_hits(vec![
        passage(1, 0.2),
        passage(2, 0.9),
        passage(3, 0.5),
        passage(4, 0.4),
        passage(5, 0.3),
        passage(6, 0.1),
    ]);
    let generator = StubGenerator::with_responses(vec![Ok("answer".to_string())]);
    let retrieval = coordinator(index.clone(), None, generator);

    let bundle = retrieval.answer("is my swelling normal", None).await;

    assert_eq!(index.queries().await, vec![("is my swelling normal".to_string(), 5)]);
    let locators = bundle
        .citations
        .iter()
        .map(|citation| citation.locator.as_str())
        .collect::<Vec<_>>();
    assert_eq!(locators, vec!["Page 2", "Page 3", "Page 4", "Page 5", "Page 1"]);
}
