//! Canonical identifiers for papers and concepts.
//!
//! Paper IDs take the form `doi:<x>`, `arxiv:<x>` or `hash:<sha1>`, picked in
//! that order of precedence. Concept IDs are `concept:<12 hex>` derived from
//! the lower-cased, whitespace-collapsed concept name, so the same concept
//! named in two papers resolves to one graph node.

use std::sync::OnceLock;

use regex::Regex;
use sha1::{Digest, Sha1};

const DOI_PREFIXES: &[&str] = &["https://doi.org/", "http://doi.org/", "doi:"];
const ARXIV_PREFIX: &str = "arxiv:";

/// Normalise a DOI: trim, lower-case, and strip resolver prefixes.
/// Returns `None` when nothing is left.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut cleaned = raw.trim().to_lowercase();
    // Prefixes can be stacked ("doi:https://doi.org/…"); strip until stable.
    while let Some(prefix) = DOI_PREFIXES.iter().find(|p| cleaned.starts_with(*p)) {
        cleaned = cleaned[prefix.len()..].trim().to_string();
    }
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Normalise an arXiv identifier or abstract URL to the bare, unversioned ID.
///
/// `arXiv:2101.00001v2`, `https://arxiv.org/abs/2101.00001v2` and
/// `2101.00001` all normalise to `2101.00001`.
pub fn normalize_arxiv_id(raw: &str) -> Option<String> {
    let mut cleaned = raw.trim().to_lowercase();
    if let Some(rest) = cleaned.strip_prefix(ARXIV_PREFIX) {
        cleaned = rest.trim().to_string();
    }
    if let Some((_, suffix)) = cleaned.split_once("abs/") {
        cleaned = suffix.to_string();
    }
    let cleaned = version_suffix_regex().replace(&cleaned, "").to_string();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

fn version_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"v\d+$").expect("valid regex"))
}

/// Build the canonical paper identifier.
///
/// DOI wins over arXiv ID, which wins over a SHA-1 of `fallback`
/// (typically an OpenAlex/Crossref ID or the title).
pub fn canonical_paper_id(doi: Option<&str>, arxiv_id: Option<&str>, fallback: &str) -> String {
    if let Some(doi) = doi.and_then(normalize_doi) {
        return format!("doi:{doi}");
    }
    if let Some(arxiv) = arxiv_id.and_then(normalize_arxiv_id) {
        return format!("arxiv:{arxiv}");
    }
    format!("hash:{}", sha1_hex(fallback))
}

/// Stable concept identifier: `concept:` + first 12 hex chars of the SHA-1
/// of the normalised name.
pub fn canonical_concept_id(name: &str) -> String {
    let normalized = normalize_concept_name(name);
    let digest = sha1_hex(&normalized);
    format!("concept:{}", &digest[..12])
}

/// Lower-case and collapse all internal whitespace runs to single spaces.
pub fn normalize_concept_name(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// File-system safe form of a canonical ID (`doi:10.1/x` → `doi_10.1_x`).
pub fn safe_filename(identifier: &str) -> String {
    identifier.replace(['/', ':'], "_")
}

/// Lower-case hex SHA-1 of `text`.
pub fn sha1_hex(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
