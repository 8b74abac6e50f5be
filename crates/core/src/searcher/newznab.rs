//! Newznab-compatible Usenet (NZB) provider.
//!
//! Uses the JSON output mode (`o=json`). Newznab servers serialize XML
//! attributes under `@attributes` and collapse one-element lists into a bare
//! object, so both shapes are accepted.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::NewznabConfig;
use crate::media::Protocol;

use super::{ProviderQuery, ReleaseCandidate, ReleaseProvider, SearchCategory, SearchError};

pub struct NewznabProvider {
    client: Client,
    config: NewznabConfig,
}

impl NewznabProvider {
    pub fn new(config: NewznabConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SearchError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn build_search_url(&self, query: &ProviderQuery) -> String {
        let (function, category) = match query.category {
            SearchCategory::Movies => ("movie", 2000),
            SearchCategory::Tv => ("tvsearch", 5000),
        };
        let mut url = format!(
            "{}/api?t={}&q={}&cat={}&apikey={}&o=json",
            self.config.url.trim_end_matches('/'),
            function,
            urlencoding::encode(&query.text),
            category,
            urlencoding::encode(&self.config.api_key)
        );
        if query.category == SearchCategory::Tv && query.season > 0 {
            url.push_str(&format!("&season={}", query.season));
        }
        url
    }
}

#[async_trait]
impl ReleaseProvider for NewznabProvider {
    fn name(&self) -> &str {
        "newznab"
    }

    fn protocol(&self) -> Protocol {
        Protocol::Usenet
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<ReleaseCandidate>, SearchError> {
        let url = self.build_search_url(query);
        debug!(query = %query.text, "Searching Newznab");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await?;
        let candidates = parse_response(&body)?;
        debug!(results = candidates.len(), "Newznab search complete");
        Ok(candidates)
    }
}

fn parse_response(body: &str) -> Result<Vec<ReleaseCandidate>, SearchError> {
    let parsed: NewznabResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Malformed(format!("Failed to parse Newznab response: {}", e)))?;

    if let Some(error) = parsed.error {
        return Err(SearchError::ApiError(format!(
            "Newznab error {}: {}",
            error.attributes.code.unwrap_or_default(),
            error.attributes.description.unwrap_or_default()
        )));
    }

    let items = parsed
        .channel
        .and_then(|c| c.item)
        .or(parsed.item)
        .map(OneOrMany::into_vec)
        .unwrap_or_default();

    Ok(items.into_iter().filter_map(into_candidate).collect())
}

fn into_candidate(item: NewznabItem) -> Option<ReleaseCandidate> {
    let enclosure = item.enclosure.map(|e| e.attributes);
    let link = enclosure
        .as_ref()
        .and_then(|e| e.url.clone())
        .or(item.link)?;

    let size = item
        .attr
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .find(|a| a.attributes.name == "size")
        .and_then(|a| a.attributes.value.parse::<u64>().ok())
        .or_else(|| enclosure.as_ref().and_then(|e| e.length.as_ref()?.as_u64()))
        .unwrap_or(0);

    Some(
        ReleaseCandidate::new(item.title, size, "newznab")
            .with_protocol(Protocol::Usenet)
            .with_download_url(link),
    )
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn as_u64(&self) -> Option<u64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::String(s) => s.parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NewznabResponse {
    channel: Option<NewznabChannel>,
    item: Option<OneOrMany<NewznabItem>>,
    error: Option<NewznabError>,
}

#[derive(Debug, Deserialize)]
struct NewznabChannel {
    item: Option<OneOrMany<NewznabItem>>,
}

#[derive(Debug, Deserialize)]
struct NewznabItem {
    title: String,
    link: Option<String>,
    enclosure: Option<NewznabEnclosure>,
    attr: Option<OneOrMany<NewznabAttr>>,
}

#[derive(Debug, Deserialize)]
struct NewznabEnclosure {
    #[serde(rename = "@attributes")]
    attributes: EnclosureAttributes,
}

#[derive(Debug, Deserialize)]
struct EnclosureAttributes {
    url: Option<String>,
    length: Option<NumberOrString>,
}

#[derive(Debug, Deserialize)]
struct NewznabAttr {
    #[serde(rename = "@attributes")]
    attributes: AttrPair,
}

#[derive(Debug, Deserialize)]
struct AttrPair {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct NewznabError {
    #[serde(rename = "@attributes")]
    attributes: ErrorAttributes,
}

#[derive(Debug, Deserialize)]
struct ErrorAttributes {
    code: Option<String>,
    description: Option<String>,
}
