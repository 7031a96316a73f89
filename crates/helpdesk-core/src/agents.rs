//! Answering agents.
//!
//! Every question that misses the FAQ cache is handed to exactly one
//! [`Agent`], picked by intent through [`AgentSet::select`]:
//!
//! | Intent | Agent |
//! |--------|-------|
//! | `academic` | [`DomainAgent::academic`] |
//! | `regulation` | [`DomainAgent::regulation`] |
//! | `scholarship`, `dorm`, `contact`, `general_rag` | [`DomainAgent::student_life`] |
//! | `capabilities` | [`CapabilitiesAgent`] |
//! | anything else | [`RagAgent`] |
//!
//! Domain agents prefix the query with a topic hint and reuse the
//! generic RAG path without follow-ups.

use std::sync::{Arc, LazyLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::llm::{GenerationOptions, LlmCaller};
use crate::models::{AgentState, Intent};
use crate::retrieve::Retriever;
use crate::sentinel;
use crate::settings::GenerationParams;
use crate::store::DocumentCatalog;

/// Separator placed between retrieved contexts in prompts.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const MAX_FOLLOWUPS: usize = 3;

static FOLLOWUP_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-•\d\.\)\s]+").expect("follow-up bullet regex is valid"));

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Fill `state.answer` (and optionally `state.followups`).
    ///
    /// Retrieval and generation failures are turned into sentinel answers
    /// inside the agent; an `Err` means the agent could not run at all.
    async fn answer(&self, state: &mut AgentState) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════
// Generic RAG path
// ═══════════════════════════════════════════════════════════════════════

/// Retrieve, prompt with context only, optionally ask for follow-ups.
pub struct RagAnswerer {
    retriever: Retriever,
    llm: Arc<dyn LlmCaller>,
    params: GenerationParams,
}

impl RagAnswerer {
    pub fn new(retriever: Retriever, llm: Arc<dyn LlmCaller>, params: GenerationParams) -> Self {
        Self {
            retriever,
            llm,
            params,
        }
    }

    pub async fn run(&self, state: &mut AgentState, with_followups: bool) {
        let mut query = state.query().to_string();
        if self.retriever.params().keyword_boost && !state.intent_keywords.is_empty() {
            query = format!("{} {}", query, state.intent_keywords.join(" "));
        }

        let hits = match self.retriever.retrieve(&query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "retrieval failed");
                state.debug.insert("retrieval_error".into(), format!("{e:#}"));
                state.answer = sentinel::GENERATION_FAILED.to_string();
                return;
            }
        };
        state.contexts = hits.into_iter().map(|h| h.text).collect();
        state
            .debug
            .insert("contexts_count".into(), state.contexts.len().to_string());

        if state.contexts.is_empty() {
            state.answer = sentinel::NOT_FOUND.to_string();
            return;
        }

        let context_text = state.contexts.join(CONTEXT_SEPARATOR);
        let opts = GenerationOptions {
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
        };
        let reply = match self
            .llm
            .generate(&answer_prompt(&context_text, state.query()), &opts)
            .await
        {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "answer generation failed");
                state.debug.insert("generation_error".into(), format!("{e:#}"));
                state.answer = sentinel::GENERATION_FAILED.to_string();
                return;
            }
        };

        if reply.is_empty() {
            state.answer = sentinel::GENERATION_FAILED.to_string();
            return;
        }
        if sentinel::is_not_found(&reply) {
            state.answer = sentinel::NOT_FOUND.to_string();
            return;
        }
        state.answer = reply;

        if with_followups && self.params.followups {
            let followups = self.followups(&context_text, state).await;
            state.followups = followups;
        }
    }

    async fn followups(&self, context_text: &str, state: &mut AgentState) -> Vec<String> {
        let opts = GenerationOptions {
            max_tokens: self.params.followup_max_tokens,
            temperature: self.params.temperature,
        };
        let prompt = followups_prompt(context_text, state.query(), &state.answer);
        match self.llm.generate(&prompt, &opts).await {
            Ok(text) => parse_followups(&text),
            Err(e) => {
                debug!(error = %e, "follow-up generation failed");
                state.debug.insert("followups_error".into(), format!("{e:#}"));
                Vec::new()
            }
        }
    }
}

/// Answer prompt restricted to the supplied context.
pub fn answer_prompt(context_text: &str, question: &str) -> String {
    format!(
        r#"คุณเป็นผู้ช่วยตอบคำถามนักศึกษามหาวิทยาลัย
ตอบให้ตรงประเด็นที่สุด โดยใช้เฉพาะข้อมูลใน CONTEXT เท่านั้น

กฎสำคัญ:
1. ห้ามเดาหรือเติมข้อมูลนอก CONTEXT
2. ถ้ามีหลายหัวข้อ ให้จัดเป็นข้อ ๆ แต่ละข้อขึ้นบรรทัดใหม่ (ใช้ - หรือ 1. 2. 3.)
3. สรุปแต่ละหัวข้อสั้น ๆ ไม่ซ้ำซ้อน
4. ถ้า CONTEXT ไม่ได้ตอบคำถาม ให้ตอบว่า: "{not_found}"

[CONTEXT]
{context_text}

[คำถาม]
{question}

[คำตอบ]"#,
        not_found = sentinel::NOT_FOUND,
    )
}

/// Prompt asking for two or three short follow-up questions.
pub fn followups_prompt(context_text: &str, question: &str, answer: &str) -> String {
    format!(
        r#"คุณเป็นผู้ช่วยแนะนำคำถามต่อเนื่องสำหรับนักศึกษา
จากคำถามและคำตอบด้านล่าง ให้เสนอคำถามถัดไปที่เกี่ยวข้อง 2-3 ข้อ
เป็นภาษาไทย สั้น ๆ เกี่ยวกับ CONTEXT เท่านั้น
ตอบเป็นรายการ บรรทัดละ 1 ข้อ ขึ้นต้นด้วย "- "

[CONTEXT]
{context_text}

[คำถามเดิม]
{question}

[คำตอบเดิม]
{answer}

[คำถามถัดไป]"#
    )
}

/// Strip list markers from each non-empty line; keep at most three.
pub fn parse_followups(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| FOLLOWUP_BULLET.replace(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(MAX_FOLLOWUPS)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Agents
// ═══════════════════════════════════════════════════════════════════════

/// Plain RAG with follow-ups, used for unrouted questions.
pub struct RagAgent {
    rag: Arc<RagAnswerer>,
}

impl RagAgent {
    pub fn new(rag: Arc<RagAnswerer>) -> Self {
        Self { rag }
    }
}

#[async_trait]
impl Agent for RagAgent {
    fn name(&self) -> &str {
        "rag"
    }

    async fn answer(&self, state: &mut AgentState) -> Result<()> {
        self.rag.run(state, true).await;
        Ok(())
    }
}

/// RAG with a topic hint prepended to the query.
pub struct DomainAgent {
    name: &'static str,
    prefix: &'static str,
    rag: Arc<RagAnswerer>,
}

impl DomainAgent {
    pub fn academic(rag: Arc<RagAnswerer>) -> Self {
        Self {
            name: "academic",
            prefix: "คำถามด้านการเรียน/ลงทะเบียน/ปฏิทินการศึกษา: ",
            rag,
        }
    }

    pub fn regulation(rag: Arc<RagAnswerer>) -> Self {
        Self {
            name: "regulation",
            prefix: "คำถามด้านระเบียบ/กฎ/แต่งกาย/วินัยนักศึกษา: ",
            rag,
        }
    }

    pub fn student_life(rag: Arc<RagAnswerer>) -> Self {
        Self {
            name: "student_life",
            prefix: "คำถามด้านทุนการศึกษา/หอพัก/บริการนักศึกษา: ",
            rag,
        }
    }
}

#[async_trait]
impl Agent for DomainAgent {
    fn name(&self) -> &str {
        self.name
    }

    async fn answer(&self, state: &mut AgentState) -> Result<()> {
        state.rewritten = format!("{}{}", self.prefix, state.question.trim());
        self.rag.run(state, false).await;
        Ok(())
    }
}

/// Lists the documents the helpdesk can answer from.
pub struct CapabilitiesAgent {
    catalog: Arc<dyn DocumentCatalog>,
}

impl CapabilitiesAgent {
    pub fn new(catalog: Arc<dyn DocumentCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Agent for CapabilitiesAgent {
    fn name(&self) -> &str {
        "capabilities"
    }

    async fn answer(&self, state: &mut AgentState) -> Result<()> {
        let titles = self.catalog.list_titles().await?;
        state.answer = describe_titles(&titles);
        Ok(())
    }
}

/// Capabilities answer for a list of document titles.
pub fn describe_titles(titles: &[String]) -> String {
    let lines: Vec<String> = titles
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| format!("- {t}"))
        .collect();
    if lines.is_empty() {
        return sentinel::NO_DOCUMENTS.to_string();
    }
    format!(
        "ตอนนี้ผมสามารถตอบคำถามจากเอกสารเหล่านี้ได้ครับ:\n\n{}\n\nคุณสามารถถามรายละเอียดเกี่ยวกับหัวข้อเหล่านี้ได้เลยครับ",
        lines.join("\n")
    )
}

/// One agent per dispatch target.
pub struct AgentSet {
    academic: DomainAgent,
    regulation: DomainAgent,
    student_life: DomainAgent,
    capabilities: CapabilitiesAgent,
    generic: RagAgent,
}

impl AgentSet {
    pub fn new(rag: Arc<RagAnswerer>, catalog: Arc<dyn DocumentCatalog>) -> Self {
        Self {
            academic: DomainAgent::academic(rag.clone()),
            regulation: DomainAgent::regulation(rag.clone()),
            student_life: DomainAgent::student_life(rag.clone()),
            capabilities: CapabilitiesAgent::new(catalog),
            generic: RagAgent::new(rag),
        }
    }

    pub fn select(&self, intent: Intent) -> &dyn Agent {
        match intent {
            Intent::Academic => &self.academic,
            Intent::Regulation => &self.regulation,
            Intent::Capabilities => &self.capabilities,
            Intent::Scholarship | Intent::Dorm | Intent::Contact | Intent::GeneralRag => {
                &self.student_life
            }
            Intent::Unknown => &self.generic,
        }
    }
}
