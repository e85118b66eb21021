//! Concept summaries: a short narrative paragraph plus 3-5 bullets.
//!
//! [`LlmSummarizer`] asks the model for a fixed micro-post layout and parses
//! it; [`HeuristicSummarizer`] builds one from the source sentences.
//! [`ConceptSummarizer`] tries the former and always ends with the latter,
//! so summarisation never fails.

use std::sync::Arc;

use async_trait::async_trait;
use paperatlas_common::ConceptSummary;
use paperatlas_llm::LlmBackend;
use tracing::{debug, warn};

pub const MIN_BULLETS: usize = 3;
pub const MAX_BULLETS: usize = 5;

const MIN_BULLET_CHARS: usize = 25;
const PARAGRAPH_SENTENCES: usize = 3;
const BULLET_WINDOW: std::ops::Range<usize> = 3..10;

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a technical writer crafting LinkedIn-style micro posts. \
     Write in a clear, professional tone with no emojis.";

#[async_trait]
pub trait SummaryStrategy: Send + Sync {
    /// `None` when this strategy produced nothing usable.
    async fn summarize(&self, text: &str, name: Option<&str>) -> Option<ConceptSummary>;

    fn name(&self) -> &'static str;
}

// ── LLM ──────────────────────────────────────────────────────────────────────

pub struct LlmSummarizer {
    backend: Arc<dyn LlmBackend>,
}

impl LlmSummarizer {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    pub fn build_prompt(text: &str, name: Option<&str>) -> String {
        let heading = name.map(|n| format!("Concept: {n}\n\n")).unwrap_or_default();
        format!(
            "{heading}Source text:\n{text}\n\n\
             Output plain text with this exact structure:\n\
             1) A single-sentence hook question (end with '?').\n\
             2) A short paragraph (2-4 sentences) answering the hook.\n\
             3) A line that says: Why this matters:\n\
             4) 3-5 bullet lines, each starting with '- '.\n\
             5) A one-sentence CTA to explore the paper or concept.\n\
             Do not output JSON or extra labels."
        )
    }

    /// Lines starting with `-` or `•` are bullets, everything else is the
    /// paragraph. Fewer than three bullets, or no paragraph, is a failure.
    pub fn parse_response(response: &str) -> Option<ConceptSummary> {
        let lines: Vec<&str> = response.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let is_bullet = |line: &&str| line.starts_with(['-', '•']);

        let bullets: Vec<String> = lines
            .iter()
            .copied()
            .filter(is_bullet)
            .map(|line| line.trim_start_matches(['-', '•']).trim().to_string())
            .collect();
        if bullets.len() < MIN_BULLETS {
            return None;
        }
        let body: Vec<&str> = lines.iter().copied().filter(|l| !is_bullet(l)).collect();
        if body.is_empty() {
            return None;
        }
        Some(ConceptSummary {
            paragraph: body.join("\n\n"),
            bullets: bullets.into_iter().take(MAX_BULLETS).collect(),
        })
    }
}

#[async_trait]
impl SummaryStrategy for LlmSummarizer {
    async fn summarize(&self, text: &str, name: Option<&str>) -> Option<ConceptSummary> {
        let prompt = Self::build_prompt(text, name);
        match self.backend.generate(SUMMARY_SYSTEM_PROMPT, &prompt).await {
            Ok(response) => {
                let parsed = Self::parse_response(&response);
                if parsed.is_none() {
                    debug!(concept = name, "LLM summary unparsable, using heuristic");
                }
                parsed
            }
            Err(e) => {
                warn!(concept = name, error = %e, "LLM summary failed, using heuristic");
                None
            }
        }
    }

    fn name(&self) -> &'static str { "llm" }
}

// ── Heuristic ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSummarizer;

impl HeuristicSummarizer {
    pub fn build(&self, text: &str, name: Option<&str>) -> ConceptSummary {
        let mut sentences = split_sentences(text);
        if sentences.is_empty() {
            if let Some(n) = name {
                sentences.push(format!("{n} is a key concept discussed in this paper."));
            }
        }

        let lead = sentences.iter().take(PARAGRAPH_SENTENCES).cloned().collect::<Vec<_>>().join(" ");
        let (question, cta) = match name {
            Some(n) => (
                format!("How does {n} work?"),
                format!("If you're exploring {n}, this is worth a closer look."),
            ),
            None => (
                "Why does this concept matter?".to_string(),
                "If you're exploring this area, it's worth a closer look.".to_string(),
            ),
        };
        let paragraph = [question.as_str(), lead.trim(), "Why this matters:", cta.as_str()].join("\n\n");

        ConceptSummary { paragraph, bullets: select_bullets(&sentences, name) }
    }
}

#[async_trait]
impl SummaryStrategy for HeuristicSummarizer {
    async fn summarize(&self, text: &str, name: Option<&str>) -> Option<ConceptSummary> {
        Some(self.build(text, name))
    }

    fn name(&self) -> &'static str { "heuristic" }
}

/// Split after `.`, `!` or `?` when followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            sentences.push(&text[start..i]);
            while let Some(&(_, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                chars.next();
            }
            start = chars.peek().map_or(text.len(), |&(j, _)| j);
            prev = None;
            continue;
        }
        prev = Some(c);
    }
    sentences.push(&text[start..]);
    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Sentences 4-10 (or the first five when that window is short) longer
/// than 25 characters, padded with generic lines up to three.
fn select_bullets(sentences: &[String], name: Option<&str>) -> Vec<String> {
    let window = sentences.get(BULLET_WINDOW.start..).map_or(&[][..], |rest| {
        &rest[..rest.len().min(BULLET_WINDOW.end - BULLET_WINDOW.start)]
    });
    let pool = if window.len() < MIN_BULLETS {
        &sentences[..sentences.len().min(MAX_BULLETS)]
    } else {
        window
    };
    let mut bullets: Vec<String> = pool
        .iter()
        .filter(|s| s.chars().count() > MIN_BULLET_CHARS)
        .cloned()
        .collect();
    if bullets.len() < MIN_BULLETS {
        let subject = name.unwrap_or("This concept");
        bullets.extend([
            format!("{subject} introduces a clear technical framing."),
            format!("{subject} highlights practical relevance for researchers."),
            format!("{subject} differentiates itself from prior work."),
        ]);
    }
    bullets.truncate(MAX_BULLETS);
    bullets
}

// ── Composition ──────────────────────────────────────────────────────────────

/// LLM summary when a backend is configured and its reply parses,
/// heuristic summary otherwise.
pub struct ConceptSummarizer {
    llm: Option<LlmSummarizer>,
    heuristic: HeuristicSummarizer,
}

impl ConceptSummarizer {
    pub fn new(backend: Option<Arc<dyn LlmBackend>>) -> Self {
        Self { llm: backend.map(LlmSummarizer::new), heuristic: HeuristicSummarizer }
    }

    pub fn heuristic_only() -> Self {
        Self::new(None)
    }

    pub async fn summarize(&self, text: &str, name: Option<&str>) -> ConceptSummary {
        if let Some(llm) = &self.llm {
            if let Some(summary) = llm.summarize(text, name).await {
                return summary;
            }
        }
        self.heuristic.build(text, name)
    }
}
