//! Core data models that flow through indexing and answering.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An admin-managed source document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A bounded slice of a document's text, the unit of vector indexing.
///
/// Identity is `{document_id}::{chunk_index}`; the chunks of a document
/// are always replaced as a set.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Build the vector-store id for a chunk.
pub fn chunk_id(document_id: &str, chunk_index: i64) -> String {
    format!("{}::{}", document_id, chunk_index)
}

/// A cached question/answer pair with its question embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub hits: i64,
    pub created_at: i64,
    pub last_used_at: i64,
}

/// Input for inserting a new FAQ row.
#[derive(Debug, Clone)]
pub struct NewFaqEntry {
    pub question: String,
    pub answer: String,
    pub embedding: Vec<f32>,
}

/// One row of the append-only question log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionLogEntry {
    pub question: String,
    pub intent: Intent,
    pub route: Route,
    pub confidence: f64,
    pub request_id: String,
}

/// A question text with how often it was asked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionCount {
    pub question: String,
    pub count: i64,
}

/// Fixed set of question topics the router can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Academic,
    Regulation,
    Scholarship,
    Dorm,
    Contact,
    GeneralRag,
    Capabilities,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::Academic,
        Intent::Regulation,
        Intent::Scholarship,
        Intent::Dorm,
        Intent::Contact,
        Intent::GeneralRag,
        Intent::Capabilities,
        Intent::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Academic => "academic",
            Intent::Regulation => "regulation",
            Intent::Scholarship => "scholarship",
            Intent::Dorm => "dorm",
            Intent::Contact => "contact",
            Intent::GeneralRag => "general_rag",
            Intent::Capabilities => "capabilities",
            Intent::Unknown => "unknown",
        }
    }

    /// Parse a raw label; anything outside the enum becomes [`Intent::Unknown`].
    pub fn parse(raw: &str) -> Intent {
        let label = raw.trim().to_lowercase();
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str() == label)
            .unwrap_or(Intent::Unknown)
    }

    /// Static intent → route table.
    pub fn route(&self) -> Route {
        match self {
            Intent::Academic
            | Intent::Regulation
            | Intent::Scholarship
            | Intent::Dorm
            | Intent::Contact
            | Intent::GeneralRag => Route::Rag,
            Intent::Capabilities => Route::Local,
            Intent::Unknown => Route::Unknown,
        }
    }

    /// Search keywords associated with an intent, used for optional
    /// retrieval boosting and recorded in the debug trace.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Intent::Academic => &["ลงทะเบียน", "ปฏิทินการศึกษา", "รายวิชา"],
            Intent::Regulation => &["ระเบียบ", "แต่งกาย", "เครื่องแบบ"],
            Intent::Scholarship => &["ทุน", "scholarship", "กยศ"],
            Intent::Dorm => &["หอพัก", "หอใน", "หอนอก"],
            Intent::Contact => &["สำนัก", "งานทะเบียน", "กองกิจการ"],
            Intent::GeneralRag | Intent::Capabilities | Intent::Unknown => &[],
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a routed question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Rag,
    Local,
    Unknown,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Rag => "rag",
            Route::Local => "local",
            Route::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the router.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteDecision {
    pub intent: Intent,
    pub route: Route,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
}

impl RouteDecision {
    pub fn new(intent: Intent, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            intent,
            route: intent.route(),
            confidence,
        }
    }

    /// The fail-open value used whenever classification fails.
    pub fn unknown() -> Self {
        Self::new(Intent::Unknown, 0.0)
    }
}

/// Which path produced the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Faq,
    Rag,
    Local,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Faq => "faq",
            AnswerSource::Rag => "rag",
            AnswerSource::Local => "local",
        }
    }
}

/// Per-request working state. Created when a question arrives and
/// dropped once the answer is returned; never shared across requests.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub question: String,
    /// Query actually sent to retrieval (agent prefix, optional keywords).
    pub rewritten: String,
    pub intent: Option<Intent>,
    pub intent_keywords: Vec<String>,
    pub contexts: Vec<String>,
    pub answer: String,
    pub followups: Vec<String>,
    pub debug: BTreeMap<String, String>,
}

impl AgentState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// The query retrieval should use.
    pub fn query(&self) -> &str {
        if self.rewritten.is_empty() {
            &self.question
        } else {
            &self.rewritten
        }
    }
}

/// Metadata returned next to every answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerMeta {
    pub request_id: String,
    pub intent: Intent,
    pub route: Route,
    pub confidence: f64,
    pub source: Option<AnswerSource>,
    pub next_topics: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rag_next_topics: Vec<String>,
    pub faq_auto_created: bool,
    /// Failures of best-effort stages, keyed by stage name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub debug: BTreeMap<String, String>,
}

impl AnswerMeta {
    pub fn new(request_id: impl Into<String>, decision: RouteDecision) -> Self {
        Self {
            request_id: request_id.into(),
            intent: decision.intent,
            route: decision.route,
            confidence: decision.confidence,
            source: None,
            next_topics: Vec::new(),
            rag_next_topics: Vec::new(),
            faq_auto_created: false,
            errors: BTreeMap::new(),
            debug: BTreeMap::new(),
        }
    }

    pub fn record_error(&mut self, stage: &str, err: impl fmt::Display) {
        self.errors.insert(stage.to_string(), err.to_string());
    }
}

/// Final result of [`Orchestrator::route_and_answer`](crate::Orchestrator::route_and_answer).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineAnswer {
    pub answer: String,
    pub meta: AnswerMeta,
}
