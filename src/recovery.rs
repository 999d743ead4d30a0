//! Tolerant JSON recovery for model-generated text.
//!
//! Model output is the only input source here, so the fallback chain is
//! ordered from "assume good faith" to "assume adversarial formatting":
//! a well-formed response parses on the first attempt and is never touched
//! by the repair heuristics, while a response drowned in prose, fences,
//! smart quotes or stray control characters still has a chance before we
//! give up. Every attempt is all-or-nothing; there is no partial parse and
//! no silently-defaulted value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Characters of candidate text kept in the failure diagnostic.
const PREVIEW_CHARS: usize = 500;
/// Characters kept either side of the parser-reported offset.
const CONTEXT_CHARS: usize = 80;
/// Shorter preview used when the input contains no JSON at all.
const NO_JSON_PREVIEW_CHARS: usize = 120;

/// The recovery engine exhausted every strategy for this input.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The text contains no `{...}` span to even attempt repair on.
    #[error("no JSON object found in model output: {preview:?}")]
    NoJsonFound { preview: String },

    /// A candidate was found but could not be parsed, even after repair.
    /// Carries enough context to diagnose the input without re-running
    /// the pipeline.
    #[error("JSON recovery failed: {message}")]
    Unparseable {
        /// The underlying parser's message.
        message: String,
        /// Byte offset of the failure in the final candidate, when the
        /// parser reported a position.
        offset: Option<usize>,
        /// Candidate text surrounding the failure offset.
        context: String,
        /// Head of the candidate text.
        preview: String,
    },
}

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[a-zA-Z]*[ \t]*\r?\n?(.*?)```").expect("fence regex"));

/// Normalize typographic punctuation to ASCII and drop control characters
/// (tab, CR and LF survive: they may be legitimate formatting outside
/// strings, or content the aggressive pass will escape later).
///
/// Idempotent: a second pass over its own output changes nothing.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\t' | '\r' | '\n' => out.push(ch),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

/// Recover a structured value from possibly-malformed model output.
///
/// Strategies, in order, stopping at the first successful parse:
/// direct parse, markdown-fence interior, first-`{`-to-last-`}` slice,
/// common-issue repair (trailing commas, invisible characters,
/// single-quoted values), and a last-resort character-level rebuild that
/// escapes unescaped quotes and raw control characters inside strings.
pub fn recover(text: &str) -> Result<Value, RecoveryError> {
    let clean = sanitize(text);

    if let Ok(value) = serde_json::from_str::<Value>(clean.trim()) {
        return Ok(value);
    }

    if let Some(caps) = FENCE_RE.captures(&clean)
        && let Some(inner) = caps.get(1)
        && let Ok(value) = serde_json::from_str::<Value>(inner.as_str().trim())
    {
        tracing::debug!("recovered JSON from fenced block");
        return Ok(value);
    }

    let candidate = match (clean.find('{'), clean.rfind('}')) {
        (Some(start), Some(end)) if end > start => &clean[start..=end],
        _ => {
            return Err(RecoveryError::NoJsonFound {
                preview: truncate_chars(clean.trim(), NO_JSON_PREVIEW_CHARS),
            });
        }
    };
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        tracing::debug!("recovered JSON from brace-bounded slice");
        return Ok(value);
    }

    let repaired = repair_common(candidate);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        tracing::debug!("recovered JSON after common-issue repair");
        return Ok(value);
    }

    let rebuilt = repair_aggressive(&repaired);
    match serde_json::from_str::<Value>(&rebuilt) {
        Ok(value) => {
            tracing::debug!("recovered JSON after character-level repair");
            Ok(value)
        }
        Err(err) => Err(unparseable(&rebuilt, &err)),
    }
}

/// Cheap fixes for the failure modes models actually produce: trailing
/// commas, invisible Unicode, and single-quoted values.
fn repair_common(candidate: &str) -> String {
    let stripped = strip_trailing_commas(candidate);
    let stripped: String = stripped
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2028}' | '\u{2029}'
            )
        })
        .collect();
    requote_single_quoted(&stripped)
}

/// Remove commas that sit immediately before a closing `}` or `]`,
/// ignoring commas inside string literals.
fn strip_trailing_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut in_string = false;
    let mut escape = false;
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if ch == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if ch == b'"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }
        if ch == b',' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j < bytes.len() && (bytes[j] == b'}' || bytes[j] == b']') {
                i += 1;
                continue;
            }
        }
        out.push(ch);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

/// Convert single-quoted values in value position (`: 'x'`, `['x'`,
/// `, 'x'`) to double-quoted equivalents. Tracks double-quoted strings so
/// apostrophes inside them are never touched; a `'` that is not in value
/// position passes through unchanged.
fn requote_single_quoted(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut in_double = false;
    let mut escape = false;
    // Last structural byte seen outside of strings.
    let mut prev_sig: u8 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if in_double {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if ch == b'"' {
                in_double = false;
            }
            i += 1;
            continue;
        }
        match ch {
            b'"' => {
                in_double = true;
                prev_sig = b'"';
                out.push(ch);
                i += 1;
            }
            b'\'' if matches!(prev_sig, b':' | b'[' | b',') => {
                if let Some(end) = find_single_close(bytes, i + 1) {
                    out.push(b'"');
                    let mut k = i + 1;
                    while k < end {
                        let c = bytes[k];
                        if c == b'\\' && k + 1 < end {
                            out.push(c);
                            out.push(bytes[k + 1]);
                            k += 2;
                            continue;
                        }
                        if c == b'"' {
                            out.push(b'\\');
                        }
                        out.push(c);
                        k += 1;
                    }
                    out.push(b'"');
                    prev_sig = b'"';
                    i = end + 1;
                } else {
                    out.push(ch);
                    i += 1;
                }
            }
            c => {
                if !c.is_ascii_whitespace() {
                    prev_sig = c;
                }
                out.push(c);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

/// Find the closing `'` of a single-quoted token: the first unescaped `'`
/// whose next significant byte is `,`, `}`, `]`, `:` or end of input.
fn find_single_close(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == b'\'' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j >= bytes.len() || matches!(bytes[j], b',' | b'}' | b']' | b':') {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Last resort: rebuild the candidate character by character, tracking
/// whether the scan is inside a quoted string. Inside a string, escape
/// pairs pass through unexamined, raw newline/CR/tab become their escaped
/// forms, and a `"` only closes the string when the trimmed remainder
/// starts with `,`, `}`, `]`, `:` or is empty; otherwise it is content and
/// gets escaped.
fn repair_aggressive(candidate: &str) -> String {
    let chars: Vec<char> = candidate.chars().collect();
    let mut out = String::with_capacity(candidate.len() + 16);
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            i += 1;
            continue;
        }
        match ch {
            '\\' => {
                out.push('\\');
                if i + 1 < chars.len() {
                    out.push(chars[i + 1]);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            '\n' => {
                out.push_str("\\n");
                i += 1;
            }
            '\r' => {
                out.push_str("\\r");
                i += 1;
            }
            '\t' => {
                out.push_str("\\t");
                i += 1;
            }
            '"' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                let closes = match next {
                    None => true,
                    Some(c) => matches!(c, ',' | '}' | ']' | ':'),
                };
                if closes {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn unparseable(candidate: &str, err: &serde_json::Error) -> RecoveryError {
    let offset = offset_of(candidate, err.line(), err.column());
    let context = offset
        .map(|o| context_window(candidate, o))
        .unwrap_or_default();
    RecoveryError::Unparseable {
        message: err.to_string(),
        offset,
        context,
        preview: truncate_chars(candidate, PREVIEW_CHARS),
    }
}

/// Translate the parser's one-based line/column report into a byte offset.
fn offset_of(text: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut offset = 0usize;
    for (idx, l) in text.split('\n').enumerate() {
        if idx + 1 == line {
            return Some((offset + column.saturating_sub(1)).min(text.len()));
        }
        offset += l.len() + 1;
    }
    None
}

fn context_window(text: &str, offset: usize) -> String {
    let start = clamp_boundary(text, offset.saturating_sub(CONTEXT_CHARS));
    let end = clamp_boundary(text, offset.saturating_add(CONTEXT_CHARS));
    text[start..end.max(start)].to_string()
}

fn clamp_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{}...", head)
}
