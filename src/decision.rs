//! Decision extraction from free-text persona replies
//!
//! Reduces an unstructured reply to one of {Yes, No, Maybe, Unclear} using a
//! priority-ordered rule list: an explicit labeled decision always overrides
//! phrase-cue heuristics, and Unclear is preferred over a guessed answer when
//! evidence is ambiguous. Extraction never fails — the worst outcome on any
//! input, including the empty string, is the Unclear sentinel, so one
//! malformed reply cannot abort a batch.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How many characters of the reply the phrase-cue fallback scans
const PHRASE_CUE_WINDOW: usize = 200;

/// Labeled decision field, tolerant of markdown emphasis and bracket
/// wrapping: "DECISION: Yes", "**DECISION:** No", "DECISION: [Maybe]"
static DECISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*{0,2}decision\*{0,2}[:\s]+\[?(\w+)\]?").unwrap());

// ─────────────────────────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────────────────────────

/// Categorical reduction of a persona's free-text reply.
///
/// `Unclear` is the explicit "parser could not determine intent" sentinel —
/// it is never conflated with a model-asserted `No`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Yes,
    No,
    Maybe,
    Unclear,
}

impl Decision {
    /// Display label, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Yes => "Yes",
            Decision::No => "No",
            Decision::Maybe => "Maybe",
            Decision::Unclear => "Unclear",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Extraction
// ─────────────────────────────────────────────────────────────────

/// A single extraction rule: either a decision or "no match"
type Matcher = fn(&str) -> Option<Decision>;

/// Rules evaluated in priority order; first match wins. Keeping them as an
/// ordered list (rather than nested conditionals) makes the tie-break policy
/// auditable and each rule independently testable.
const MATCHERS: &[(&str, Matcher)] = &[
    ("labeled-decision", match_labeled_decision),
    ("phrase-cue", match_phrase_cue),
];

/// Extract a decision from a reply.
///
/// The input is lower-cased once; each rule sees the same normalized text.
pub fn extract(text: &str) -> Decision {
    let lowered = text.to_lowercase();

    for (_name, matcher) in MATCHERS {
        if let Some(decision) = matcher(&lowered) {
            return decision;
        }
    }

    Decision::Unclear
}

/// Tier 1: explicit "DECISION:" label followed by a recognized token.
///
/// A label whose captured word has no recognized mapping is treated as no
/// match, falling through to the phrase-cue tier.
fn match_labeled_decision(lowered: &str) -> Option<Decision> {
    let captures = DECISION_RE.captures(lowered)?;
    let word = captures.get(1)?.as_str();

    match word {
        "yes" | "y" => Some(Decision::Yes),
        "no" | "n" => Some(Decision::No),
        "maybe" | "uncertain" | "unsure" => Some(Decision::Maybe),
        _ => None,
    }
}

/// Tier 2: phrase cues in the opening of the reply.
///
/// Known precision limitation: the "yes," / "no," cues can misfire on
/// rhetorical phrasing that quotes or echoes similarly-worded scenario text.
/// Preserved as-is; tier 1 always takes precedence when a labeled decision is
/// present.
fn match_phrase_cue(lowered: &str) -> Option<Decision> {
    let window: String = lowered.chars().take(PHRASE_CUE_WINDOW).collect();

    if window.contains("i would buy") || window.contains("i'll take") || window.contains("yes,") {
        Some(Decision::Yes)
    } else if window.contains("i would not")
        || window.contains("i wouldn't")
        || window.contains("no,")
    {
        Some(Decision::No)
    } else {
        None
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
