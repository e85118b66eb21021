//! OpenAlex works client.
//!
//! API: https://api.openalex.org/works/{id | https://doi.org/<doi>}
//! Abstracts arrive as an inverted index (`word -> [positions]`) and are
//! rebuilt into plain text here.

use std::collections::BTreeMap;

use paperatlas_common::{normalize_doi, sandbox::SandboxClient as Client, PaperAuthor, PaperMetadata};
use tracing::{debug, instrument};

const OA_API_BASE: &str = "https://api.openalex.org/works";

pub struct OpenAlexClient {
    client: Client,
    api_base: String,
    mailto: Option<String>,
}

impl OpenAlexClient {
    pub fn new(client: Client) -> Self {
        Self { client, api_base: OA_API_BASE.to_string(), mailto: None }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self.client.allow_url_host(&self.api_base);
        self
    }

    /// Contact address for OpenAlex's polite pool.
    pub fn with_mailto(mut self, mailto: impl Into<String>) -> Self {
        self.mailto = Some(mailto.into());
        self
    }

    #[instrument(skip(self))]
    pub async fn fetch_by_doi(&self, doi: &str) -> anyhow::Result<Option<PaperMetadata>> {
        let Some(doi) = normalize_doi(doi) else {
            return Ok(None);
        };
        self.fetch_work(&format!("https://doi.org/{doi}")).await
    }

    /// Fetch by OpenAlex work ID (`W123…` or its full URL).
    #[instrument(skip(self))]
    pub async fn fetch_by_id(&self, openalex_id: &str) -> anyhow::Result<Option<PaperMetadata>> {
        let id = short_openalex_id(openalex_id);
        if id.is_empty() {
            return Ok(None);
        }
        self.fetch_work(&id).await
    }

    async fn fetch_work(&self, key: &str) -> anyhow::Result<Option<PaperMetadata>> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), key);
        let mut req = self.client.get(&url)?;
        if let Some(ref mailto) = self.mailto {
            req = req.query(&[("mailto", mailto)]);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            debug!(status = %resp.status(), "OpenAlex has no record");
            return Ok(None);
        }
        let work: serde_json::Value = resp.json().await?;
        Ok(Some(work_to_paper(&work)))
    }
}

fn short_openalex_id(raw: &str) -> String {
    raw.trim().rsplit('/').next().unwrap_or_default().to_string()
}

/// Rebuild abstract text from OpenAlex's `abstract_inverted_index`.
pub(crate) fn rebuild_abstract(index: &serde_json::Value) -> Option<String> {
    let map = index.as_object()?;
    let mut positions: BTreeMap<u64, &str> = BTreeMap::new();
    for (word, slots) in map {
        for slot in slots.as_array().into_iter().flatten() {
            if let Some(pos) = slot.as_u64() {
                positions.insert(pos, word.as_str());
            }
        }
    }
    if positions.is_empty() {
        return None;
    }
    Some(positions.into_values().collect::<Vec<_>>().join(" "))
}

pub(crate) fn work_to_paper(work: &serde_json::Value) -> PaperMetadata {
    let title = work["title"]
        .as_str()
        .or_else(|| work["display_name"].as_str())
        .unwrap_or_default()
        .to_string();
    let mut meta = PaperMetadata::new(title, "openalex");

    meta.doi = work["doi"].as_str().and_then(normalize_doi);
    meta.openalex_id = work["id"].as_str().map(short_openalex_id).filter(|s| !s.is_empty());
    meta.abstract_text = rebuild_abstract(&work["abstract_inverted_index"]);
    meta.publication_year = work["publication_year"].as_i64().map(|y| y as i32);
    meta.venue = work["primary_location"]["source"]["display_name"].as_str().map(String::from);
    meta.url = work["id"].as_str().map(String::from);
    meta.pdf_url = work["best_oa_location"]["pdf_url"]
        .as_str()
        .or_else(|| work["primary_location"]["pdf_url"].as_str())
        .map(String::from);
    meta.authors = work["authorships"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|a| {
                    let name = a["author"]["display_name"].as_str()?.to_string();
                    Some(PaperAuthor {
                        name,
                        affiliation: a["institutions"][0]["display_name"].as_str().map(String::from),
                        orcid: a["author"]["orcid"].as_str().map(String::from),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_abstract_orders_by_position() {
        let index = serde_json::json!({"graphs": [2], "We": [0], "match": [1, 3]});
        assert_eq!(rebuild_abstract(&index).as_deref(), Some("We match graphs match"));
        assert_eq!(rebuild_abstract(&serde_json::Value::Null), None);
        assert_eq!(rebuild_abstract(&serde_json::json!({})), None);
    }

    #[test]
    fn test_work_to_paper() {
        let work = serde_json::json!({
            "id": "https://openalex.org/W2741809807",
            "doi": "https://doi.org/10.7717/PEERJ.4375",
            "title": "The state of OA",
            "publication_year": 2018,
            "abstract_inverted_index": {"Open": [0], "access": [1]},
            "primary_location": {"source": {"display_name": "PeerJ"}},
            "authorships": [{"author": {"display_name": "Heather Piwowar"}, "institutions": []}]
        });
        let p = work_to_paper(&work);
        assert_eq!(p.openalex_id.as_deref(), Some("W2741809807"));
        assert_eq!(p.doi.as_deref(), Some("10.7717/peerj.4375"));
        assert_eq!(p.abstract_text.as_deref(), Some("Open access"));
        assert_eq!(p.venue.as_deref(), Some("PeerJ"));
        assert_eq!(p.authors[0].name, "Heather Piwowar");
        assert_eq!(p.canonical_id(), "doi:10.7717/peerj.4375");
    }

    #[test]
    fn test_short_openalex_id() {
        assert_eq!(short_openalex_id("https://openalex.org/W1"), "W1");
        assert_eq!(short_openalex_id("W1"), "W1");
    }
}
