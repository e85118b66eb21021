//! LLM-based concept extraction.
//!
//! The paper text is packed into one bounded prompt, sent with a fixed
//! system instruction, and the reply is split on `Concept N: <name>`
//! markers. Raw replies are cached on disk under a key derived from the
//! paper ID and the prompt digest, so re-running a batch costs nothing.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use paperatlas_common::{sha1_hex, ConceptCandidate, PaperRow};
use paperatlas_llm::LlmBackend;
use regex::Regex;
use tracing::{debug, info, instrument};

use super::ConceptExtractor;
use crate::cache::{CacheEntry, ResponseCache};
use crate::error::Result;

pub const DEFAULT_MAX_PROMPT_CHARS: usize = 18_000;

const PROMPT_DIGEST_LEN: usize = 12;

pub const EXTRACTION_SYSTEM_PROMPT: &str = "\
You are a research scientist and technical communicator. Read the research \
paper below and write one standalone LinkedIn-style post for every distinct \
concept the paper introduces, proposes, analyses or discusses.

Concepts include new models, algorithms, methods, frameworks and \
architectures; theoretical ideas, assumptions and hypotheses; problem \
formulations and task definitions; training, optimisation and evaluation \
techniques; key empirical findings; new metrics, benchmarks, datasets and \
protocols; important limitations and trade-offs; and the core contributions \
claimed by the authors.

For each post:
- Open with a hook, ideally a question.
- Name the concept clearly and explain it in plain, precise language.
- Explain why it matters for research or practice and how it differs from \
prior work.
- Close with a call to action to read the paper.
- Keep a professional, conversational tone with no emojis or marketing \
cliches, 120 to 200 words per post.

Output exactly this structure and nothing else:

Concept 1: <Concept Name>
<post>

Concept 2: <Concept Name>
<post>

(continue for every concept)";

fn concept_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Concept\s*\d+\s*:\s*(.+)").expect("valid regex"))
}

fn unsafe_id_chars_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]+").expect("valid regex"))
}

pub struct LlmExtractor {
    backend: Option<Arc<dyn LlmBackend>>,
    cache: ResponseCache,
    offline: bool,
    max_prompt_chars: usize,
}

impl LlmExtractor {
    /// Without a backend the extractor starts in offline mode.
    pub fn new(backend: Option<Arc<dyn LlmBackend>>, cache: ResponseCache) -> Self {
        let offline = backend.is_none();
        Self { backend, cache, offline, max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS }
    }

    /// Force offline mode: cached replies are still served, nothing is sent.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline || self.backend.is_none();
        self
    }

    pub fn with_max_prompt_chars(mut self, max_chars: usize) -> Self {
        self.max_prompt_chars = max_chars;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// `Paper Text:` followed by title, abstract and body, the latter three
    /// capped at `max_chars` characters in total.
    pub fn build_prompt(
        title: &str,
        abstract_text: Option<&str>,
        raw_text: Option<&str>,
        max_chars: usize,
    ) -> String {
        let mut chunks = vec![format!("Title: {title}")];
        if let Some(a) = abstract_text.filter(|a| !a.is_empty()) {
            chunks.push(format!("Abstract: {a}"));
        }
        if let Some(r) = raw_text.filter(|r| !r.is_empty()) {
            chunks.push(format!("Full Text: {r}"));
        }
        let combined = chunks.join("\n\n");
        let combined = match combined.char_indices().nth(max_chars) {
            Some((cut, _)) => &combined[..cut],
            None => combined.as_str(),
        };
        format!("Paper Text:\n{combined}")
    }

    /// `<paper id with unsafe runs replaced by _>_<first 12 hex of sha1(prompt)>`.
    pub fn make_cache_key(paper_id: &str, prompt: &str) -> String {
        let safe_id = unsafe_id_chars_regex().replace_all(paper_id, "_");
        let digest = sha1_hex(prompt);
        format!("{safe_id}_{}", &digest[..PROMPT_DIGEST_LEN])
    }

    /// Split a model reply into candidates, one per `Concept N: name` marker.
    ///
    /// A candidate's post runs from the end of its marker line to the next
    /// marker. No markers means no candidates, not an error.
    pub fn parse_response(response: &str) -> Vec<ConceptCandidate> {
        let markers: Vec<_> = concept_marker_regex().captures_iter(response).collect();
        let mut concepts = Vec::with_capacity(markers.len());
        for (idx, caps) in markers.iter().enumerate() {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
            let end = markers
                .get(idx + 1)
                .and_then(|next| next.get(0))
                .map_or(response.len(), |m| m.start());
            let name = name.as_str().trim();
            if name.is_empty() {
                continue;
            }
            let post = response[whole.end()..end].trim();
            concepts.push(ConceptCandidate::llm(name, post));
        }
        concepts
    }

    /// Extract candidates for one paper.
    ///
    /// Order: cache lookup, then the offline short-circuit (empty list),
    /// then one model call whose reply is cached before returning. A failed
    /// call is returned as an error and nothing is cached.
    #[instrument(skip(self, title, abstract_text, raw_text))]
    pub async fn extract_candidates(
        &self,
        paper_id: &str,
        title: &str,
        abstract_text: Option<&str>,
        raw_text: Option<&str>,
    ) -> Result<Vec<ConceptCandidate>> {
        let prompt = Self::build_prompt(title, abstract_text, raw_text, self.max_prompt_chars);
        let cache_key = Self::make_cache_key(paper_id, &prompt);
        if let Some(cached) = self.cache.get(&cache_key)? {
            return Ok(cached.concepts);
        }

        let backend = match (&self.backend, self.offline) {
            (Some(backend), false) => backend,
            _ => {
                info!(paper_id, "Skipping LLM call (offline mode)");
                return Ok(Vec::new());
            }
        };

        let response_text = backend.generate(EXTRACTION_SYSTEM_PROMPT, &prompt).await?;
        let concepts = Self::parse_response(&response_text);
        debug!(paper_id, n = concepts.len(), model = backend.model_id(), "Parsed LLM concepts");

        self.cache.set(
            &cache_key,
            &CacheEntry {
                paper_id: paper_id.to_string(),
                prompt_hash: cache_key.clone(),
                response_text,
                concepts: concepts.clone(),
            },
        )?;
        Ok(concepts)
    }

    /// Extract for several papers in sequence, keyed by paper ID.
    pub async fn extract_many(&self, rows: &[PaperRow]) -> Result<HashMap<String, Vec<ConceptCandidate>>> {
        let mut results = HashMap::with_capacity(rows.len());
        for row in rows {
            let concepts = self.extract(row).await?;
            results.insert(row.paper_id.clone(), concepts);
        }
        Ok(results)
    }
}

#[async_trait]
impl ConceptExtractor for LlmExtractor {
    async fn extract(&self, paper: &PaperRow) -> Result<Vec<ConceptCandidate>> {
        self.extract_candidates(
            &paper.paper_id,
            &paper.title,
            paper.abstract_text.as_deref(),
            paper.raw_text.as_deref(),
        )
        .await
    }

    fn name(&self) -> &'static str { "llm" }
}
