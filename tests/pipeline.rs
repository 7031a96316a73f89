//! End-to-end tests over a real SQLite database with deterministic
//! embedder and LLM doubles.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use helpdesk_core::models::{AnswerSource, Intent, NewFaqEntry, QuestionLogEntry, Route};
use helpdesk_core::sentinel;
use helpdesk_core::store::{FaqStore, QuestionLog, VectorStore};
use uni_helpdesk::{feedback, stats};

use common::{
    indexer, orchestrator, test_db, BrokenEmbedder, KeywordEmbedder, PromptLlm, SlowEmbedder,
};

const DORM_ROUTE: &str = r#"{"intent": "dorm", "confidence": 0.91}"#;
const DORM_ANSWER: &str = "Dormitory fees are 4,500 baht per semester.";
const DORM_DOC: &str = "Dormitory fees are 4,500 baht per semester.\n\n\
                        Fees are paid at the finance office before move-in.";
const LIBRARY_DOC: &str = "The central library opens at 8am on weekdays.";
const CAPABILITIES_ROUTE: &str = r#"{"intent": "capabilities", "confidence": 0.9}"#;

fn log_entry(question: &str) -> QuestionLogEntry {
    QuestionLogEntry {
        question: question.to_string(),
        intent: Intent::Dorm,
        route: Route::Rag,
        confidence: 0.9,
        request_id: "req".to_string(),
    }
}

#[tokio::test]
async fn test_add_document_indexes_chunks() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));

    let id = indexer
        .add_document("Dormitory guide", DORM_DOC, Some("admin"))
        .await
        .unwrap();
    assert_eq!(db.store.count().await.unwrap(), 1);

    let docs = indexer.list_documents().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, id);
    assert_eq!(docs[0].chunks, 1);
    assert_eq!(docs[0].revisions, 1);

    let hits = db
        .store
        .query(&KeywordEmbedder::vector("dormitory fee"), 5)
        .await
        .unwrap();
    assert_eq!(hits[0].document_id, id.to_string());
    assert!(hits[0].text.contains("4,500"));
}

#[tokio::test]
async fn test_update_replaces_vectors_and_keeps_revisions() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    let id = indexer.add_document("Guide", DORM_DOC, None).await.unwrap();

    let long_body = format!("{}\n\n{}", "a ".repeat(200), "b ".repeat(200));
    indexer
        .update_document(id, Some("Renamed guide"), &long_body, Some("editor"))
        .await
        .unwrap();

    let doc = indexer.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.title, "Renamed guide");
    assert_eq!(doc.content, long_body);

    let summary = &indexer.list_documents().await.unwrap()[0];
    assert_eq!(summary.revisions, 2);
    assert_eq!(summary.chunks, 2);
    assert_eq!(db.store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_update_missing_document_fails() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    assert!(indexer.update_document(42, None, "text", None).await.is_err());
}

#[tokio::test]
async fn test_delete_removes_vectors() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    let dorm = indexer.add_document("Dorm", DORM_DOC, None).await.unwrap();
    indexer
        .add_document("Library", LIBRARY_DOC, None)
        .await
        .unwrap();

    assert!(indexer.delete_document(dorm).await.unwrap());
    assert!(!indexer.delete_document(dorm).await.unwrap());
    assert_eq!(db.store.count().await.unwrap(), 1);
    assert_eq!(indexer.list_documents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_embedding_writes_nothing() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(BrokenEmbedder));

    assert!(indexer.add_document("Dorm", DORM_DOC, None).await.is_err());
    assert!(indexer.list_documents().await.unwrap().is_empty());
    assert_eq!(db.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_question_log_writable_while_document_embeds() {
    let db = test_db().await;
    let embedder = Arc::new(SlowEmbedder::new(Duration::from_millis(400)));
    let indexer = indexer(&db, embedder.clone());

    let log_while_embedding = async {
        embedder.started.notified().await;
        db.store.append(&log_entry("dorm fee?")).await.unwrap();
        embedder.finished.load(Ordering::SeqCst)
    };
    let (added, embedding_done) = tokio::join!(
        indexer.add_document("Dorm", DORM_DOC, None),
        log_while_embedding
    );
    let id = added.unwrap();
    assert!(!embedding_done, "question log write waited for the embedder");
    assert_eq!(db.store.count_exact("dorm fee?").await.unwrap(), 1);
    assert_eq!(db.store.count().await.unwrap(), 1);

    embedder.finished.store(false, Ordering::SeqCst);
    let log_while_embedding = async {
        embedder.started.notified().await;
        db.store.append(&log_entry("dorm fee?")).await.unwrap();
        embedder.finished.load(Ordering::SeqCst)
    };
    let (updated, embedding_done) = tokio::join!(
        indexer.update_document(id, None, LIBRARY_DOC, None),
        log_while_embedding
    );
    updated.unwrap();
    assert!(!embedding_done, "question log write waited for the embedder");
    assert_eq!(db.store.count_exact("dorm fee?").await.unwrap(), 2);

    let hits = db.store.query(&KeywordEmbedder::vector("library"), 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].text.contains("library"));
}

#[tokio::test]
async fn test_empty_content_rejected() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    assert!(indexer.add_document("Empty", "  \n\n ", None).await.is_err());
    assert!(indexer.add_document("  ", DORM_DOC, None).await.is_err());
}

#[tokio::test]
async fn test_reindex_all_rebuilds_vectors() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    let id = indexer.add_document("Dorm", DORM_DOC, None).await.unwrap();
    indexer
        .add_document("Library", LIBRARY_DOC, None)
        .await
        .unwrap();
    db.store.delete_document(&id.to_string()).await.unwrap();
    assert_eq!(db.store.count().await.unwrap(), 1);

    let report = indexer.reindex_all().await.unwrap();
    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 2);
    assert!(report.failed.is_empty());
    assert_eq!(db.store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_store_answers_not_found() {
    let db = test_db().await;
    let llm = Arc::new(PromptLlm::new(DORM_ROUTE, DORM_ANSWER));
    let orchestrator = orchestrator(&db, llm.clone());

    let result = orchestrator
        .route_and_answer("What are dormitory fees?")
        .await;
    assert_eq!(result.answer, sentinel::NOT_FOUND);
    assert!(result.meta.next_topics.is_empty());
    assert_eq!(result.meta.intent, Intent::Dorm);
    // Router only; no generation without context.
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_answer_grounded_in_documents() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    indexer.add_document("Dorm", DORM_DOC, None).await.unwrap();
    indexer
        .add_document("Library", LIBRARY_DOC, None)
        .await
        .unwrap();

    let llm = Arc::new(PromptLlm::new(DORM_ROUTE, DORM_ANSWER));
    let orchestrator = orchestrator(&db, llm);
    let result = orchestrator
        .route_and_answer("What are dormitory fees?")
        .await;

    assert_eq!(result.answer, DORM_ANSWER);
    assert_eq!(result.meta.route, Route::Rag);
    assert_eq!(result.meta.source, Some(AnswerSource::Rag));
    assert!(result.meta.debug.contains_key("rewritten"));
    assert!(result.meta.rag_next_topics.is_empty());
    assert!(!result.meta.faq_auto_created);

    let logged = db.store.count_exact("What are dormitory fees?").await.unwrap();
    assert_eq!(logged, 1);
}

#[tokio::test]
async fn test_generic_route_adds_followups() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    indexer.add_document("Dorm", DORM_DOC, None).await.unwrap();

    let llm = Arc::new(PromptLlm::new("not json at all", DORM_ANSWER));
    let orchestrator = orchestrator(&db, llm.clone());
    let result = orchestrator
        .route_and_answer("What are dormitory fees?")
        .await;

    assert_eq!(result.meta.intent, Intent::Unknown);
    assert_eq!(result.meta.confidence, 0.0);
    assert_eq!(result.answer, DORM_ANSWER);
    assert_eq!(
        result.meta.rag_next_topics,
        vec![
            "How do I pay dormitory fees?".to_string(),
            "When is the payment deadline?".to_string()
        ]
    );
    // router, answer, follow-ups
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn test_frequent_question_promoted_then_served_from_faq() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    indexer.add_document("Dorm", DORM_DOC, None).await.unwrap();

    let llm = Arc::new(PromptLlm::new(DORM_ROUTE, DORM_ANSWER));
    let orchestrator = orchestrator(&db, llm);
    let question = "What are dormitory fees?";

    for _ in 0..4 {
        let result = orchestrator.route_and_answer(question).await;
        assert!(!result.meta.faq_auto_created);
    }
    assert!(db.store.all().await.unwrap().is_empty());

    let fifth = orchestrator.route_and_answer(question).await;
    assert!(fifth.meta.faq_auto_created);
    assert_eq!(db.store.all().await.unwrap().len(), 1);

    let sixth = orchestrator.route_and_answer(question).await;
    assert_eq!(sixth.meta.source, Some(AnswerSource::Faq));
    assert_eq!(sixth.answer, DORM_ANSWER);

    let entry = db.store.find_by_question(question).await.unwrap().unwrap();
    assert_eq!(entry.hits, 2);
}

#[tokio::test]
async fn test_capabilities_answer_stays_live() {
    let db = test_db().await;
    let llm = Arc::new(PromptLlm::new(CAPABILITIES_ROUTE, DORM_ANSWER));
    let orchestrator = orchestrator(&db, llm);
    let question = "What can you help me with?";

    for _ in 0..5 {
        let result = orchestrator.route_and_answer(question).await;
        assert_eq!(result.answer, sentinel::NO_DOCUMENTS);
        assert_eq!(result.meta.source, Some(AnswerSource::Local));
        assert!(!result.meta.faq_auto_created);
    }
    assert!(db.store.all().await.unwrap().is_empty());

    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    indexer
        .add_document("Dormitory guide", DORM_DOC, None)
        .await
        .unwrap();

    let sixth = orchestrator.route_and_answer(question).await;
    assert_eq!(sixth.meta.source, Some(AnswerSource::Local));
    assert!(sixth.answer.contains("- Dormitory guide"), "got: {}", sixth.answer);
    assert!(!sixth.meta.faq_auto_created);
    assert!(db.store.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_suggestions_come_from_question_log() {
    let db = test_db().await;
    let llm = Arc::new(PromptLlm::new(DORM_ROUTE, DORM_ANSWER));
    let orchestrator = orchestrator(&db, llm);

    orchestrator.route_and_answer("How much is the dorm fee?").await;
    orchestrator.route_and_answer("When does the library open?").await;
    let result = orchestrator
        .route_and_answer("What are dormitory fees?")
        .await;

    assert_eq!(
        result.meta.next_topics.first().map(String::as_str),
        Some("How much is the dorm fee?")
    );
    assert!(!result
        .meta
        .next_topics
        .contains(&"What are dormitory fees?".to_string()));
}

#[tokio::test]
async fn test_faq_insert_ignores_duplicate_question() {
    let db = test_db().await;
    let entry = NewFaqEntry {
        question: "What are dormitory fees?".into(),
        answer: DORM_ANSWER.into(),
        embedding: KeywordEmbedder::vector("What are dormitory fees?"),
    };
    assert!(db.store.insert(&entry).await.unwrap());
    assert!(!db.store.insert(&entry).await.unwrap());

    let stored = db.store.all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].embedding, entry.embedding);
    assert!(db.store.record_hit(stored[0].id + 100).await.is_err());
}

#[tokio::test]
async fn test_stats_and_feedback() {
    let db = test_db().await;
    let indexer = indexer(&db, Arc::new(KeywordEmbedder));
    indexer.add_document("Dorm", DORM_DOC, None).await.unwrap();

    let llm = Arc::new(PromptLlm::new(DORM_ROUTE, DORM_ANSWER));
    let orchestrator = orchestrator(&db, llm);
    orchestrator.route_and_answer("What are dormitory fees?").await;
    orchestrator.route_and_answer("What are dormitory fees?").await;

    feedback::record(&db.pool, "What are dormitory fees?", DORM_ANSWER, true, None)
        .await
        .unwrap();
    feedback::record(&db.pool, "What are dormitory fees?", DORM_ANSWER, false, Some("too short"))
        .await
        .unwrap();
    assert!(feedback::record(&db.pool, " ", "", true, None).await.is_err());

    let summary = stats::summary(&db.pool).await.unwrap();
    assert_eq!(summary.questions, 2);
    assert_eq!(summary.documents, 1);
    assert_eq!(summary.chunks, 1);
    assert_eq!(summary.faq_entries, 0);
    assert_eq!(summary.feedback, 2);
    assert_eq!(summary.helpful_rate(), Some(50));

    let intents = stats::intent_counts(&db.pool).await.unwrap();
    assert_eq!(intents, vec![("dorm".to_string(), 2)]);

    let popular = db.store.popular(10).await.unwrap();
    assert_eq!(popular.len(), 1);
    assert_eq!(popular[0].count, 2);
}

#[tokio::test]
async fn test_feedback_list_newest_first() {
    let db = test_db().await;
    assert!(feedback::list(&db.pool, 10).await.unwrap().is_empty());

    feedback::record(&db.pool, "What are dormitory fees?", DORM_ANSWER, true, None)
        .await
        .unwrap();
    let second = feedback::record(
        &db.pool,
        "When does the library open?",
        "8am.",
        false,
        Some("  weekends?  "),
    )
    .await
    .unwrap();

    let rows = feedback::list(&db.pool, 10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, second);
    assert_eq!(rows[0].answer, "8am.");
    assert!(!rows[0].is_helpful);
    assert_eq!(rows[0].comment.as_deref(), Some("weekends?"));
    assert_eq!(rows[1].answer, DORM_ANSWER);
    assert!(rows[1].is_helpful);
    assert_eq!(rows[1].comment, None);

    assert_eq!(feedback::list(&db.pool, 1).await.unwrap().len(), 1);
}
