//! CrossRef DOI resolution client.
//!
//! Used for two purposes:
//! 1. Resolving bare DOIs to full metadata (title, authors, venue, year)
//! 2. Free-text search when arXiv is not the desired source
//!
//! API: https://api.crossref.org/works/{doi}

use std::sync::OnceLock;

use async_trait::async_trait;
use paperatlas_common::{normalize_doi, sandbox::SandboxClient as Client, PaperAuthor, PaperMetadata};
use regex::Regex;
use tracing::{debug, instrument};

use super::{year_of, LiteratureSource};

const CR_API_BASE: &str = "https://api.crossref.org/works";

pub struct CrossRefClient {
    client: Client,
    api_base: String,
}

impl CrossRefClient {
    pub fn new(client: Client) -> Self {
        Self { client, api_base: CR_API_BASE.to_string() }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self.client.allow_url_host(&self.api_base);
        self
    }

    /// Resolve a single DOI → PaperMetadata. Non-success status yields `None`.
    #[instrument(skip(self))]
    pub async fn resolve_doi(&self, doi: &str) -> anyhow::Result<Option<PaperMetadata>> {
        let Some(doi) = normalize_doi(doi) else {
            return Ok(None);
        };
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), doi);
        let resp = self.client.get(&url)?.send().await?;
        if !resp.status().is_success() {
            debug!(status = %resp.status(), "CrossRef has no record");
            return Ok(None);
        }
        let body: serde_json::Value = resp.json().await?;
        Ok(Some(work_to_paper(&body["message"])))
    }
}

#[async_trait]
impl LiteratureSource for CrossRefClient {
    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        from_date: Option<&str>,
    ) -> anyhow::Result<Vec<PaperMetadata>> {
        let mut params = vec![
            ("query", query.trim().to_string()),
            ("rows", max_results.to_string()),
        ];
        if let Some(year) = from_date.and_then(year_of) {
            params.push(("filter", format!("from-pub-date:{year}")));
        }
        let resp: serde_json::Value = self
            .client
            .get(&self.api_base)?
            .query(&params)
            .send()
            .await?
            .json()
            .await?;
        let works = resp["message"]["items"].as_array().cloned().unwrap_or_default();
        debug!(n = works.len(), "CrossRef search results");
        Ok(works.iter().map(work_to_paper).collect())
    }

    fn name(&self) -> &'static str { "crossref" }
}

// ── Conversion ─────────────────────────────────────────────────────────────

fn jats_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?jats:[^>]*>").expect("valid regex"))
}

/// CrossRef abstracts are JATS XML snippets; keep only the text.
pub(crate) fn strip_jats(raw: &str) -> String {
    let spaced = raw.replace("</jats:p>", "\n");
    jats_tag_regex().replace_all(&spaced, "").trim().to_string()
}

fn first_str(value: &serde_json::Value) -> Option<String> {
    value.as_array()?.first()?.as_str().map(String::from)
}

pub(crate) fn work_to_paper(work: &serde_json::Value) -> PaperMetadata {
    let title = first_str(&work["title"]).unwrap_or_default();
    let mut meta = PaperMetadata::new(title, "crossref");

    meta.doi = work["DOI"].as_str().and_then(normalize_doi);
    meta.crossref_id = meta.doi.clone();
    meta.abstract_text = work["abstract"].as_str().map(strip_jats);
    meta.venue = first_str(&work["container-title"]);
    meta.url = work["URL"].as_str().map(String::from);

    meta.authors = work["author"]
        .as_array()
        .map(|authors| {
            authors
                .iter()
                .map(|a| {
                    let given  = a["given"].as_str().unwrap_or("").trim();
                    let family = a["family"].as_str().unwrap_or("").trim();
                    let name = if given.is_empty() { family.to_string() } else { format!("{given} {family}") };
                    PaperAuthor {
                        name,
                        affiliation: a["affiliation"]
                            .as_array()
                            .and_then(|af| af.first())
                            .and_then(|af| af["name"].as_str())
                            .map(String::from),
                        orcid: a["ORCID"].as_str().map(String::from),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    meta.publication_year = ["published", "published-print", "published-online", "issued"]
        .iter()
        .find_map(|key| work[*key]["date-parts"][0][0].as_i64())
        .map(|y| y as i32);

    meta.pdf_url = work["link"].as_array().and_then(|links| {
        links
            .iter()
            .find(|l| l["content-type"].as_str() == Some("application/pdf"))
            .and_then(|l| l["URL"].as_str())
            .map(String::from)
    });

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_to_paper_minimal() {
        let work = serde_json::json!({
            "DOI": "10.1000/TEST",
            "title": ["Test Paper Title"],
            "abstract": "<jats:p>Test abstract.</jats:p>",
            "author": [{ "given": "Jane", "family": "Doe" }],
            "container-title": ["NeurIPS"],
            "published": { "date-parts": [[2024, 6, 1]] },
            "link": [{"URL": "https://example.org/p.pdf", "content-type": "application/pdf"}]
        });
        let p = work_to_paper(&work);
        assert_eq!(p.doi.as_deref(), Some("10.1000/test"));
        assert_eq!(p.title, "Test Paper Title");
        assert_eq!(p.abstract_text.as_deref(), Some("Test abstract."));
        assert_eq!(p.authors[0].name, "Jane Doe");
        assert_eq!(p.venue.as_deref(), Some("NeurIPS"));
        assert_eq!(p.publication_year, Some(2024));
        assert_eq!(p.pdf_url.as_deref(), Some("https://example.org/p.pdf"));
        assert_eq!(p.canonical_id(), "doi:10.1000/test");
    }

    #[test]
    fn test_jats_tag_stripping() {
        let raw = "<jats:title>Abstract</jats:title><jats:p>Hello <jats:italic>world</jats:italic>.</jats:p>";
        assert_eq!(strip_jats(raw), "AbstractHello world.");
    }

    #[test]
    fn test_year_falls_back_to_issued() {
        let work = serde_json::json!({"title": ["T"], "issued": {"date-parts": [[2019]]}});
        assert_eq!(work_to_paper(&work).publication_year, Some(2019));
    }
}
