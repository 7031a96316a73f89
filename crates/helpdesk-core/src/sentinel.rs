//! Reserved answer strings.
//!
//! These are control values as much as user-facing text: the orchestrator
//! checks for them to suppress FAQ promotion and follow-up generation.
//! Compare with [`is_not_found`] / [`is_sentinel`] rather than by hand.

/// Returned when retrieval yields no usable context.
pub const NOT_FOUND: &str = "ไม่พบข้อมูลในระบบ กรุณาติดต่อเจ้าหน้าที่มหาวิทยาลัย";

/// Substring that marks an answer as "not found", including LLM replies
/// that paraphrase the canonical sentinel.
pub const NOT_FOUND_MARKER: &str = "ไม่พบข้อมูล";

/// Returned when the LLM (or retrieval feeding it) fails.
pub const GENERATION_FAILED: &str = "ระบบไม่สามารถสร้างคำตอบได้ในขณะนี้ครับ";

/// Returned for empty or whitespace-only questions.
pub const EMPTY_QUESTION: &str = "กรุณาพิมพ์คำถามก่อนนะครับ";

/// Capabilities answer when no documents are indexed.
pub const NO_DOCUMENTS: &str = "ขณะนี้ระบบยังไม่มีข้อมูลเอกสารใดๆ ครับ";

/// True when `answer` is (or contains) the not-found sentinel.
pub fn is_not_found(answer: &str) -> bool {
    answer.contains(NOT_FOUND_MARKER)
}

/// True for any reserved answer that must never be cached as an FAQ.
pub fn is_sentinel(answer: &str) -> bool {
    let trimmed = answer.trim();
    trimmed.is_empty()
        || is_not_found(trimmed)
        || trimmed == GENERATION_FAILED
        || trimmed == EMPTY_QUESTION
        || trimmed == NO_DOCUMENTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detects_paraphrase() {
        assert!(is_not_found(NOT_FOUND));
        assert!(is_not_found("ขออภัย ไม่พบข้อมูลเกี่ยวกับเรื่องนี้"));
        assert!(!is_not_found("ค่าหอพัก 5,000 บาทต่อภาคเรียน"));
    }

    #[test]
    fn test_sentinels() {
        assert!(is_sentinel(GENERATION_FAILED));
        assert!(is_sentinel(EMPTY_QUESTION));
        assert!(is_sentinel(NO_DOCUMENTS));
        assert!(is_sentinel("   "));
        assert!(!is_sentinel("Dormitory fees are 5,000 THB per term."));
    }
}
