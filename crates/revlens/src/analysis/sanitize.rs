//! Neutralize untrusted text before it is embedded in a prompt.
//!
//! This is a heuristic filter over a fixed pattern set. It raises the bar
//! for casual prompt injection in descriptions, comments and diffs; it is
//! not a guarantee that a determined author cannot steer the model.

use std::sync::LazyLock;

use regex::Regex;

/// Opening line of the block that carries untrusted content.
pub const USER_CONTENT_OPEN: &str = "```user-content";

/// Closing line of that block.
pub const USER_CONTENT_CLOSE: &str = "```";

/// Lines matching any of these are dropped.
static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // ignore / forget / disregard prior instructions
        r"(?i)\b(ignore|forget|disregard|override|bypass)\b.{0,40}\b(instructions?|prompts?|rules|directions|guidelines)\b",
        // role impersonation
        r"(?i)\byou\s+are\s+now\b",
        r"(?i)\bpretend\s+(to\s+be|you\s+are)\b",
        r"(?i)\bact\s+as\s+(if\s+you|an?\s+(ai|assistant|language\s+model)|the\s+(assistant|system))\b",
        r"(?i)\bfrom\s+now\s+on,?\s+you\b",
        // system prompt override or reveal
        r"(?i)\b(system|developer)\s+(prompt|message|instructions?)\b",
        // output coercion
        r"(?i)\b(respond|reply|answer|output)\s+only\s+with\b",
        r"(?i)\bonly\s+(respond|reply|answer|output)\s+with\b",
        r"(?i)\bnew\s+instructions?\s*:",
        // fake role headers
        r"(?i)^\s*#*\s*(system|assistant|user|human|ai)\s*:",
        // chat template control tokens
        r"(?i)<\|\s*(im_start|im_end|system|user|assistant|endoftext|eot_id|start_header_id|end_header_id)\s*\|>",
        r"(?i)\[/?INST\]",
        r"(?i)<</?SYS>>",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

/// Escape template and markup syntax with a `\` marker.
///
/// Braces are escaped individually; code fences and `---` separators are
/// escaped character by character so they can no longer close or split
/// the user-content block.
#[must_use]
pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '{' | '}') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
        .replace("```", r"\`\`\`")
        .replace("---", r"\-\-\-")
}

/// Whether `line` looks like an attempt to instruct the model.
#[must_use]
pub fn is_injection_line(line: &str) -> bool {
    INJECTION_PATTERNS.iter().any(|pattern| pattern.is_match(line))
}

/// Escape, drop instruction-like lines, and wrap in a user-content block.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let escaped = escape_markup(raw);
    let mut dropped = 0usize;
    let kept: Vec<&str> = escaped
        .lines()
        .filter(|line| {
            let injected = is_injection_line(line);
            dropped += usize::from(injected);
            !injected
        })
        .collect();

    if dropped > 0 {
        tracing::debug!(dropped, "Dropped instruction-like lines from untrusted text");
    }

    format!(
        "{USER_CONTENT_OPEN}\n{}\n{USER_CONTENT_CLOSE}",
        kept.join("\n")
    )
}
