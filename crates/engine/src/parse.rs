//! Breakdown-response parsing: three tiers, no failure path.
//!
//! Models asked for a JSON array answer with one most of the time, but not
//! always: sometimes the array is wrapped in prose or a code fence, sometimes
//! the answer is a plain numbered list, sometimes it is unusable chatter.
//! Parsing degrades through three tiers and always produces drafts:
//!
//! 1. **Structured**: strict JSON decode, including an array embedded in
//!    surrounding text.
//! 2. **Heuristic**: one draft per numbered (`1.`) or bulleted (`-`, `•`)
//!    line.
//! 3. **Default**: a fixed four-step sequence.
//!
//! Everything here is a pure function over the response text, so the tiers
//! can be tested against malformed input without a backend.

use serde::Deserialize;

/// A task as the model writes it in the breakdown array.
///
/// `priority` stays a raw string at this stage; the lenient mapping to the
/// priority enum happens when drafts become tasks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
}

/// Which tier produced the drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    /// The response decoded as a JSON array
    Structured,
    /// JSON failed; numbered or bulleted lines were salvaged
    Heuristic,
    /// Nothing usable; the fixed default sequence was substituted
    DefaultSequence,
}

impl ParseSource {
    /// Snake-case label for logs and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Heuristic => "heuristic",
            Self::DefaultSequence => "default_sequence",
        }
    }
}

/// The outcome of parsing one breakdown response. Never empty.
#[derive(Debug, Clone)]
pub struct ParsedBreakdown {
    pub drafts: Vec<TaskDraft>,
    pub source: ParseSource,
}

/// Parse a breakdown response into task drafts.
///
/// Malformed output is not an error: the tiers absorb it and the worst case
/// is the default sequence.
pub fn parse_task_breakdown(response: &str) -> ParsedBreakdown {
    if let Some(drafts) = parse_structured(response) {
        return ParsedBreakdown {
            drafts,
            source: ParseSource::Structured,
        };
    }

    let drafts = parse_lines(response);
    if !drafts.is_empty() {
        return ParsedBreakdown {
            drafts,
            source: ParseSource::Heuristic,
        };
    }

    ParsedBreakdown {
        drafts: default_drafts(),
        source: ParseSource::DefaultSequence,
    }
}

/// The fixed fallback sequence, in execution order.
pub(crate) fn default_drafts() -> Vec<TaskDraft> {
    [
        ("Initialize", "Set up the groundwork the objective needs"),
        ("Plan", "Work out the concrete steps to take"),
        ("Execute", "Carry out the planned steps"),
        ("Validate", "Check the outcome against the objective"),
    ]
    .into_iter()
    .map(|(name, description)| TaskDraft {
        name: name.to_string(),
        description: description.to_string(),
        priority: None,
        estimated_time: None,
    })
    .collect()
}

// ── Tier 1: structured ──────────────────────────────────────────────────────

fn parse_structured(response: &str) -> Option<Vec<TaskDraft>> {
    let text = response.trim();
    if let Some(drafts) = try_array(text) {
        return Some(drafts);
    }

    // Models wrap the array in prose or a ```json fence often enough that the
    // outermost bracket span is worth a second attempt.
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    try_array(&text[start..=end])
}

fn try_array(text: &str) -> Option<Vec<TaskDraft>> {
    let drafts: Vec<TaskDraft> = serde_json::from_str(text).ok()?;
    let drafts: Vec<TaskDraft> = drafts
        .into_iter()
        .filter(|d| !d.name.trim().is_empty())
        .collect();
    (!drafts.is_empty()).then_some(drafts)
}

// ── Tier 2: line heuristic ──────────────────────────────────────────────────

fn parse_lines(response: &str) -> Vec<TaskDraft> {
    response
        .lines()
        .filter_map(|line| {
            let text = strip_list_marker(line.trim())?;
            if !text.chars().any(char::is_alphanumeric) {
                return None;
            }
            Some(TaskDraft {
                name: truncate_name(text),
                description: text.to_string(),
                priority: None,
                estimated_time: None,
            })
        })
        .collect()
}

/// Strip a leading `1.` / `23.` numbering or a `-` / `•` bullet. Lines
/// without a marker are prose, not tasks.
fn strip_list_marker(line: &str) -> Option<&str> {
    for bullet in ['-', '•'] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest.trim_start());
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix('.') {
            return Some(rest.trim_start());
        }
    }

    None
}

/// The first 50 characters of the text, cut on a character boundary.
fn truncate_name(text: &str) -> String {
    text.chars().take(50).collect()
}
