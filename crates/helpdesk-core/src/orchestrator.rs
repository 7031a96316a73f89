//! Per-question pipeline.
//!
//! [`Orchestrator::route_and_answer`] runs one linear pass:
//!
//! 1. reject empty questions
//! 2. route by intent
//! 3. append to the question log
//! 4. try the FAQ cache
//! 5. on a miss, dispatch to the intent's agent
//! 6. promote frequently asked questions into the FAQ cache
//! 7. suggest next topics
//! 8. style the answer
//!
//! Steps 3, 4, 6 and 7 are best-effort: their failures are recorded in
//! [`AnswerMeta::errors`] and the answer is still returned.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agents::{AgentSet, RagAnswerer};
use crate::embedding::Embedder;
use crate::faq::FaqCache;
use crate::llm::LlmCaller;
use crate::models::{
    AgentState, AnswerMeta, AnswerSource, Intent, PipelineAnswer, QuestionLogEntry, RouteDecision,
};
use crate::retrieve::Retriever;
use crate::router::Router;
use crate::sentinel;
use crate::settings::PipelineSettings;
use crate::store::{DocumentCatalog, FaqStore, QuestionLog, VectorStore};
use crate::style::style_answer;
use crate::suggest::TopicSuggester;

/// External collaborators the pipeline talks to.
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LlmCaller>,
    pub vectors: Arc<dyn VectorStore>,
    pub faqs: Arc<dyn FaqStore>,
    pub log: Arc<dyn QuestionLog>,
    pub catalog: Arc<dyn DocumentCatalog>,
}

pub struct Orchestrator {
    router: Router,
    faq: FaqCache,
    suggester: TopicSuggester,
    agents: AgentSet,
    log: Arc<dyn QuestionLog>,
    promote_after: usize,
}

impl Orchestrator {
    pub fn new(services: Services, settings: PipelineSettings) -> Self {
        let router = Router::new(services.llm.clone(), settings.router.clone());
        Self::with_router(services, settings, router)
    }

    /// Build around an already constructed router.
    pub fn with_router(services: Services, settings: PipelineSettings, router: Router) -> Self {
        let retriever = Retriever::new(
            services.embedder.clone(),
            services.vectors.clone(),
            settings.retrieval.clone(),
        );
        let rag = Arc::new(RagAnswerer::new(
            retriever,
            services.llm.clone(),
            settings.generation.clone(),
        ));
        Self {
            router,
            faq: FaqCache::new(
                services.embedder.clone(),
                services.faqs.clone(),
                settings.faq.clone(),
            ),
            suggester: TopicSuggester::new(
                services.embedder.clone(),
                services.log.clone(),
                settings.suggestions.clone(),
            ),
            agents: AgentSet::new(rag, services.catalog.clone()),
            log: services.log,
            promote_after: settings.faq.promote_after,
        }
    }

    /// Answer one question. Never fails; degraded stages show up in the
    /// returned metadata instead.
    pub async fn route_and_answer(&self, question: &str) -> PipelineAnswer {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("ask", request_id = %request_id);
        self.run(question.trim(), request_id).instrument(span).await
    }

    async fn run(&self, question: &str, request_id: String) -> PipelineAnswer {
        if question.is_empty() {
            return PipelineAnswer {
                answer: sentinel::EMPTY_QUESTION.to_string(),
                meta: AnswerMeta::new(request_id, RouteDecision::unknown()),
            };
        }

        let decision = self.router.route(question).await;
        info!(intent = %decision.intent, route = %decision.route, confidence = decision.confidence, "routed");
        let mut meta = AnswerMeta::new(request_id.clone(), decision);

        let entry = QuestionLogEntry {
            question: question.to_string(),
            intent: decision.intent,
            route: decision.route,
            confidence: decision.confidence,
            request_id,
        };
        if let Err(e) = self.log.append(&entry).await {
            warn!(error = %e, "question log append failed");
            meta.record_error("question_log", format!("{e:#}"));
        }

        let cached = match self.faq.find_best(question).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "FAQ lookup failed");
                meta.record_error("faq_lookup", format!("{e:#}"));
                None
            }
        };

        let answer = match cached {
            Some(hit) => {
                info!(faq_id = hit.entry.id, score = hit.score, "answered from FAQ cache");
                if let Err(e) = self.faq.update_hit(&hit.entry).await {
                    meta.record_error("faq_hit", format!("{e:#}"));
                }
                meta.source = Some(AnswerSource::Faq);
                hit.entry.answer
            }
            None => {
                let answer = self.dispatch(question, decision.intent, &mut meta).await;
                self.promote(question, &answer, &mut meta).await;
                answer
            }
        };

        match self.suggester.suggest(question).await {
            Ok(topics) => meta.next_topics = topics,
            Err(e) => {
                warn!(error = %e, "topic suggestion failed");
                meta.record_error("suggestions", format!("{e:#}"));
            }
        }

        PipelineAnswer {
            answer: style_answer(&answer),
            meta,
        }
    }

    async fn dispatch(&self, question: &str, intent: Intent, meta: &mut AnswerMeta) -> String {
        let agent = self.agents.select(intent);
        let mut state = AgentState::new(question);
        state.intent = Some(intent);
        state.intent_keywords = intent.keywords().iter().map(|k| k.to_string()).collect();

        meta.source = Some(if intent == Intent::Capabilities {
            AnswerSource::Local
        } else {
            AnswerSource::Rag
        });
        meta.debug.insert("agent".into(), agent.name().to_string());

        if let Err(e) = agent.answer(&mut state).await {
            warn!(agent = agent.name(), error = %e, "agent failed");
            meta.record_error(agent.name(), format!("{e:#}"));
            state.answer = sentinel::GENERATION_FAILED.to_string();
        }

        if !state.rewritten.is_empty() {
            meta.debug.insert("rewritten".into(), state.rewritten.clone());
        }
        meta.debug.append(&mut state.debug);
        meta.rag_next_topics = state.followups;
        state.answer
    }

    /// Cache frequent retrieval answers. Local answers are built from
    /// live data and are never cached.
    async fn promote(&self, question: &str, answer: &str, meta: &mut AnswerMeta) {
        if meta.source != Some(AnswerSource::Rag) || sentinel::is_sentinel(answer) {
            return;
        }
        match self.register_if_frequent(question, answer).await {
            Ok(created) => meta.faq_auto_created = created,
            Err(e) => {
                warn!(error = %e, "FAQ promotion failed");
                meta.record_error("faq_promotion", format!("{e:#}"));
            }
        }
    }

    async fn register_if_frequent(&self, question: &str, answer: &str) -> Result<bool> {
        let count = self.log.count_exact(question).await?;
        if count < self.promote_after {
            return Ok(false);
        }
        self.faq.register(question, answer).await
    }
}
