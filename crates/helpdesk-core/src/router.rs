//! LLM-backed intent router.
//!
//! One generation call per question at temperature 0. The reply is
//! expected to be a small JSON object; fences and chatter around it are
//! tolerated. Any failure degrades to [`RouteDecision::unknown`].

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ClassificationError, ClassificationResult};
use crate::llm::{GenerationOptions, LlmCaller};
use crate::models::{Intent, RouteDecision};
use crate::settings::RouterParams;

pub struct Router {
    llm: Arc<dyn LlmCaller>,
    params: RouterParams,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmCaller>, params: RouterParams) -> Self {
        Self { llm, params }
    }

    /// Classify a question, falling back to `unknown` on any failure.
    pub async fn route(&self, question: &str) -> RouteDecision {
        match self.classify(question).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "router failed, treating question as unknown");
                RouteDecision::unknown()
            }
        }
    }

    /// Classify a question, surfacing why classification failed.
    ///
    /// Empty questions short-circuit to `unknown` without an LLM call.
    pub async fn classify(&self, question: &str) -> ClassificationResult<RouteDecision> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(RouteDecision::unknown());
        }

        let opts = GenerationOptions {
            max_tokens: self.params.max_tokens,
            temperature: 0.0,
        };
        let reply = self
            .llm
            .generate(&build_prompt(question), &opts)
            .await
            .map_err(ClassificationError::Llm)?;

        let decision = parse_decision(&reply)?;
        debug!(intent = %decision.intent, confidence = decision.confidence, "question routed");
        Ok(decision)
    }
}

/// Router prompt listing every allowed intent.
pub fn build_prompt(question: &str) -> String {
    format!(
        r#"คุณคือตัวช่วยแยกประเภทคำถามของนักศึกษามหาวิทยาลัย ให้ตอบเป็น JSON เท่านั้น

คำถาม: "{question}"

ให้เลือก intent ที่ใกล้เคียงที่สุดจากรายการนี้:
- academic: การเรียน รายวิชา ลงทะเบียน เกรด ปฏิทินการศึกษา
- regulation: ระเบียบมหาวิทยาลัย การแต่งกาย วินัยนักศึกษา กฎข้อบังคับ
- scholarship: ทุนการศึกษา ทุนช่วยเหลือ ค่าธรรมเนียม การผ่อนผัน
- dorm: หอพัก การเข้าพัก ระเบียบหอพัก ค่าหอ
- contact: ช่องทางติดต่อหน่วยงาน เบอร์โทร อีเมล สำนักงาน
- general_rag: คำถามทั่วไปเกี่ยวกับมหาวิทยาลัยหรือชีวิตนักศึกษาที่ต้องค้นจากเอกสาร
- capabilities: ถามว่าระบบทำอะไรได้บ้าง มีข้อมูลเรื่องอะไรบ้าง
- unknown: ไม่เข้าใจคำถามหรือไม่อยู่ในรายการ

ตอบกลับเป็น JSON รูปแบบ:
{{"intent": "academic", "confidence": 0.92}}

ห้ามใส่คำอธิบายอื่นเพิ่มเติม"#
    )
}

#[derive(Deserialize)]
struct RawDecision {
    #[serde(default)]
    intent: Option<Value>,
    #[serde(default)]
    confidence: Option<Value>,
}

/// Parse a router reply into a decision.
///
/// Unknown intent labels normalize to `unknown`; a missing or unparseable
/// confidence becomes `0.0`; out-of-range confidences are clamped.
pub fn parse_decision(reply: &str) -> ClassificationResult<RouteDecision> {
    let json = extract_json_object(reply).ok_or(ClassificationError::NoJson)?;
    let raw: RawDecision = serde_json::from_str(json)?;

    let intent = match raw.intent {
        Some(Value::String(s)) => Intent::parse(&s),
        _ => Intent::Unknown,
    };
    let confidence = match raw.confidence {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(RouteDecision::new(intent, confidence))
}

/// Strip Markdown fences and return the outermost `{...}` span.
fn extract_json_object(reply: &str) -> Option<&str> {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        text = text.trim_end().trim_end_matches("```");
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
