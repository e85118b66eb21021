//! arXiv export API client.
//!
//! Endpoint: https://export.arxiv.org/api/query (Atom feed)
//!   `id_list=<id>`: single paper lookup
//!   `search_query=all:<q>&start&max_results`: paged search, 100 per page

use async_trait::async_trait;
use paperatlas_common::{normalize_arxiv_id, sandbox::SandboxClient as Client, PaperAuthor, PaperMetadata};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use super::{year_of, LiteratureSource};

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
const PAGE_SIZE: usize = 100;

pub struct ArxivClient {
    client: Client,
    api_url: String,
}

impl ArxivClient {
    pub fn new(client: Client) -> Self {
        Self { client, api_url: ARXIV_API_URL.to_string() }
    }

    /// Point the client at a different API root (mirrors, tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self.client.allow_url_host(&self.api_url);
        self
    }

    /// Fetch a single paper by arXiv ID or abstract URL.
    #[instrument(skip(self))]
    pub async fn fetch_by_id(&self, arxiv_id: &str) -> anyhow::Result<Option<PaperMetadata>> {
        let Some(id) = normalize_arxiv_id(arxiv_id) else {
            return Ok(None);
        };
        let Some(xml) = self.get_feed(&[("id_list", id)]).await? else {
            return Ok(None);
        };
        Ok(parse_atom_feed(&xml).into_iter().next())
    }

    async fn get_feed(&self, params: &[(&str, String)]) -> anyhow::Result<Option<String>> {
        let resp = self.client.get(&self.api_url)?.query(params).send().await?;
        if resp.status().as_u16() != 200 {
            warn!(status = %resp.status(), "arXiv API returned non-200");
            return Ok(None);
        }
        Ok(Some(resp.text().await?))
    }
}

#[async_trait]
impl LiteratureSource for ArxivClient {
    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        from_date: Option<&str>,
    ) -> anyhow::Result<Vec<PaperMetadata>> {
        let from_year = from_date.and_then(year_of);
        let mut collected: Vec<PaperMetadata> = Vec::new();
        let mut start = 0usize;
        let total_pages = max_results.div_ceil(PAGE_SIZE);

        for _ in 0..total_pages {
            let remaining = max_results.saturating_sub(collected.len());
            if remaining == 0 {
                break;
            }
            let batch_size = remaining.min(PAGE_SIZE);
            let params = [
                ("search_query", format!("all:{query}")),
                ("start", start.to_string()),
                ("max_results", batch_size.to_string()),
            ];
            let batch = match self.get_feed(&params).await? {
                Some(xml) => parse_atom_feed(&xml),
                None => Vec::new(),
            };
            if batch.is_empty() {
                break;
            }
            debug!(start, n = batch.len(), "arXiv page");
            collected.extend(batch.into_iter().filter(|p| match from_year {
                Some(year) => p.publication_year.is_some_and(|y| y >= year),
                None => true,
            }));
            start += batch_size;
        }

        collected.truncate(max_results);
        Ok(collected)
    }

    fn name(&self) -> &'static str { "arxiv" }
}

pub fn arxiv_pdf_url(arxiv_id: &str) -> String {
    let id = normalize_arxiv_id(arxiv_id).unwrap_or_else(|| arxiv_id.to_string());
    format!("https://arxiv.org/pdf/{id}.pdf")
}

#[derive(Default)]
struct EntryBuilder {
    title: String,
    summary: String,
    published: String,
    id: String,
    authors: Vec<PaperAuthor>,
    categories: Vec<String>,
}

impl EntryBuilder {
    fn build(self) -> PaperMetadata {
        let arxiv_id = normalize_arxiv_id(&self.id);
        let mut meta = PaperMetadata::new(
            self.title.split_whitespace().collect::<Vec<_>>().join(" "),
            "arxiv",
        );
        meta.abstract_text = Some(self.summary.trim().to_string());
        meta.authors = self.authors;
        meta.publication_year = self.published.get(..4).and_then(|y| y.parse().ok());
        meta.venue = self.categories.into_iter().next();
        meta.pdf_url = arxiv_id.as_deref().map(arxiv_pdf_url);
        meta.url = Some(self.id.trim().to_string()).filter(|u| !u.is_empty());
        meta.arxiv_id = arxiv_id;
        meta
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field { None, Title, Summary, Published, Id, AuthorName }

/// Parse an arXiv Atom feed into metadata, one per `<entry>`.
pub(crate) fn parse_atom_feed(xml: &str) -> Vec<PaperMetadata> {
    let mut papers = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<EntryBuilder> = None;
    let mut field = Field::None;
    let mut in_author = false;
    let mut author_name = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"entry" => current = Some(EntryBuilder::default()),
                b"title" if current.is_some() && !in_author => field = Field::Title,
                b"summary" if current.is_some() => field = Field::Summary,
                b"published" if current.is_some() => field = Field::Published,
                b"id" if current.is_some() => field = Field::Id,
                b"author" if current.is_some() => {
                    in_author = true;
                    author_name.clear();
                }
                b"name" if in_author => field = Field::AuthorName,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"category" {
                    if let (Some(entry), Ok(Some(term))) = (current.as_mut(), e.try_get_attribute("term")) {
                        if let Ok(value) = term.unescape_value() {
                            entry.categories.push(value.to_string());
                        }
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                if let Some(entry) = current.as_mut() {
                    match field {
                        Field::Title      => entry.title.push_str(&text),
                        Field::Summary    => entry.summary.push_str(&text),
                        Field::Published  => entry.published.push_str(&text),
                        Field::Id         => entry.id.push_str(&text),
                        Field::AuthorName => author_name.push_str(&text),
                        Field::None       => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"author" => {
                    if let Some(entry) = current.as_mut() {
                        let name = author_name.trim().to_string();
                        entry.authors.push(PaperAuthor { name, affiliation: None, orcid: None });
                    }
                    in_author = false;
                }
                b"entry" => {
                    if let Some(entry) = current.take() {
                        papers.push(entry.build());
                    }
                    field = Field::None;
                }
                _ => field = Field::None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("arXiv feed parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    papers
}
