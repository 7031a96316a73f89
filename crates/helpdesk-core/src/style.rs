//! Final cosmetic pass over answers before they are returned.

use crate::sentinel;

/// Tidy an answer for chat display.
///
/// Normalizes line endings, strips trailing whitespace, turns `•` and `*`
/// bullets into `- ` and allows at most one blank line in a row.
/// Sentinel answers are returned untouched.
pub fn style_answer(answer: &str) -> String {
    if sentinel::is_sentinel(answer) {
        return answer.to_string();
    }

    let normalized = answer.replace("\r\n", "\n").replace('\r', "\n");
    let mut out: Vec<String> = Vec::new();
    let mut blank_run = 0;
    for line in normalized.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push(String::new());
            continue;
        }
        blank_run = 0;
        out.push(restyle_bullet(line));
    }
    out.join("\n").trim().to_string()
}

fn restyle_bullet(line: &str) -> String {
    let indent_len = line.len() - line.trim_start().len();
    let (indent, body) = line.split_at(indent_len);
    for marker in ['•', '*'] {
        if let Some(rest) = body.strip_prefix(marker) {
            if rest.starts_with(' ') || rest.is_empty() {
                return format!("{indent}- {}", rest.trim_start());
            }
        }
    }
    line.to_string()
}
