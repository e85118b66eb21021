//! Pattern-based concept extraction. Deterministic, no network.
//!
//! Three passes, in order:
//!   1. "we propose / introduce / present X", "our method X", "called X"
//!   2. section headers in the body: numbered ("3.1 Graph Matching") or
//!      short all-caps lines ("RELATED WORK")
//!   3. title fragments split on `:` and dashes
//!
//! Results are de-duplicated by case-insensitive name, first seen wins.

use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use paperatlas_common::{ConceptCandidate, PaperRow};
use regex::Regex;

use super::ConceptExtractor;
use crate::error::Result;

pub const DEFAULT_MAX_CONCEPTS: usize = 25;

const MAX_NAME_WORDS: usize = 12;
const MAX_EVIDENCE_CHARS: usize = 200;
const MAX_HEADER_CHARS: usize = 120;
const MAX_CAPS_HEADER_WORDS: usize = 8;
const MIN_TITLE_PHRASE_CHARS: usize = 3;

const NAMED_METHOD_CUES: &[&str] = &[
    "we propose",
    "we introduce",
    "we present",
    "our method",
    "our model",
    "called",
];

fn named_method_regexes() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        NAMED_METHOD_CUES
            .iter()
            .map(|cue| {
                Regex::new(&format!(r"(?i){cue} ([A-Z][A-Za-z0-9\-\s]{{3,80}})")).expect("valid regex")
            })
            .collect()
    })
}

fn name_terminator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.;:\n]").expect("valid regex"))
}

fn numbered_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)*\s+[A-Z].+").expect("valid regex"))
}

fn section_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)*\s+").expect("valid regex"))
}

#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    max_concepts: usize,
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCEPTS)
    }
}

impl HeuristicExtractor {
    pub fn new(max_concepts: usize) -> Self {
        Self { max_concepts }
    }

    pub fn max_concepts(&self) -> usize {
        self.max_concepts
    }

    pub fn extract_candidates(
        &self,
        title: &str,
        abstract_text: Option<&str>,
        raw_text: Option<&str>,
    ) -> Vec<ConceptCandidate> {
        let text = [Some(title), abstract_text, raw_text]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            return Vec::new();
        }

        let mut candidates = named_methods(&text);
        candidates.extend(section_headers(raw_text.unwrap_or_default()));
        candidates.extend(title_phrases(title));

        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for candidate in candidates {
            let key = candidate.name.trim().to_lowercase();
            if key.is_empty() || !seen.insert(key) {
                continue;
            }
            unique.push(candidate);
            if unique.len() >= self.max_concepts {
                break;
            }
        }
        unique
    }
}

#[async_trait]
impl ConceptExtractor for HeuristicExtractor {
    async fn extract(&self, paper: &PaperRow) -> Result<Vec<ConceptCandidate>> {
        Ok(self.extract_candidates(
            &paper.title,
            paper.abstract_text.as_deref(),
            paper.raw_text.as_deref(),
        ))
    }

    fn name(&self) -> &'static str { "heuristic" }
}

fn named_methods(text: &str) -> Vec<ConceptCandidate> {
    let mut candidates = Vec::new();
    for re in named_method_regexes() {
        for caps in re.captures_iter(text) {
            let Some(raw_name) = caps.get(1) else { continue };
            let name = name_terminator_regex()
                .split(raw_name.as_str().trim())
                .next()
                .unwrap_or_default()
                .trim();
            if name.split_whitespace().count() > MAX_NAME_WORDS {
                continue;
            }
            let evidence: String = caps[0].chars().take(MAX_EVIDENCE_CHARS).collect();
            candidates.push(ConceptCandidate::heuristic(name, evidence));
        }
    }
    candidates
}

fn section_headers(raw_text: &str) -> Vec<ConceptCandidate> {
    let mut candidates = Vec::new();
    for line in raw_text.lines() {
        let cleaned = line.trim();
        if cleaned.is_empty() || cleaned.chars().count() > MAX_HEADER_CHARS {
            continue;
        }
        if numbered_header_regex().is_match(cleaned) {
            let name = section_number_regex().replace(cleaned, "");
            candidates.push(ConceptCandidate::heuristic(name.trim(), cleaned));
            continue;
        }
        if is_all_caps(cleaned) && cleaned.split_whitespace().count() <= MAX_CAPS_HEADER_WORDS {
            candidates.push(ConceptCandidate::heuristic(title_case(cleaned), cleaned));
        }
    }
    candidates
}

fn title_phrases(title: &str) -> Vec<ConceptCandidate> {
    title
        .split([':', '-', '–', '—'])
        .map(str::trim)
        .filter(|phrase| phrase.chars().count() > MIN_TITLE_PHRASE_CHARS)
        .map(|phrase| ConceptCandidate::heuristic(phrase, title))
        .collect()
}

/// At least one cased letter and no lower-case ones.
fn is_all_caps(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
