use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::PaperAtlasError;

/// Default per-request timeout for metadata and LLM calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// An HTTP client that only talks to approved hosts.
///
/// Every outbound call in PaperAtlas (paper sources, PDF downloads, LLM and
/// embedding backends, Neo4j) goes through one of these.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with the default allowlist and timeout.
    pub fn new() -> Result<Self, PaperAtlasError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, PaperAtlasError> {
        let domains = [
            "export.arxiv.org",        // arXiv API
            "arxiv.org",               // arXiv PDFs
            "api.crossref.org",        // Crossref
            "api.openalex.org",        // OpenAlex
            "doi.org",                 // DOI resolver
            "api.openai.com",          // OpenAI LLMs + embeddings
            "localhost",               // Ollama / Neo4j local
            "127.0.0.1",               // Localhost alt
        ];
        Self::with_allowlist(timeout, &domains)
    }

    /// Creates a client that may only reach `domains`.
    pub fn with_allowlist(timeout: Duration, domains: &[&str]) -> Result<Self, PaperAtlasError> {
        let allowlist = domains.iter().map(|d| d.to_lowercase()).collect();

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("PaperAtlas/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PaperAtlasError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_lowercase());
    }

    /// Allow the host of a configured base URL (custom LLM endpoint, remote Neo4j).
    pub fn allow_url_host(&mut self, url: &str) {
        if let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
            self.allow_domain(&host);
        }
    }

    /// Validates if a URL is permitted under the current policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else { return false };
        let Some(host) = parsed.host_str() else { return false };
        // Exact match or a subdomain of an allowed domain
        self.allowlist
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, PaperAtlasError> {
        self.request(reqwest::Method::GET, url)
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, PaperAtlasError> {
        self.request(reqwest::Method::POST, url)
    }

    pub fn request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder, PaperAtlasError> {
        if !self.is_allowed(url) {
            return Err(PaperAtlasError::SecurityError(format!(
                "domain not in allowlist for URL {}",
                url
            )));
        }
        Ok(self.client.request(method, url))
    }
}
