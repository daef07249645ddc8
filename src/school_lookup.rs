//! Lookup of schools in the national school directory.
//!
//! The upstream service answers with plain text, one school per line:
//! `<name> (<details>)||<npsn>||...`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolReference {
    pub nama: String,
    pub npsn: String,
}

#[async_trait]
pub trait SchoolDirectory: Send + Sync + 'static {
    async fn search(&self, query: &str) -> Result<Vec<SchoolReference>>;
}

pub struct KemdikbudDirectory {
    client: Client,
    base_url: String,
}

impl KemdikbudDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn request_url(&self, query: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).context("invalid school lookup URL")?;
        url.query_pairs_mut()
            .append_pair("kode", "000000")
            .append_pair("level", "3")
            .append_pair("q", query);
        Ok(url)
    }
}

#[async_trait]
impl SchoolDirectory for KemdikbudDirectory {
    async fn search(&self, query: &str) -> Result<Vec<SchoolReference>> {
        let url = self.request_url(query)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("school directory request failed")?
            .error_for_status()
            .context("school directory returned an error status")?;
        let body = response
            .text()
            .await
            .context("failed to read school directory response")?;
        Ok(parse_directory_listing(&body))
    }
}

pub fn parse_directory_listing(body: &str) -> Vec<SchoolReference> {
    body.trim().lines().filter_map(parse_directory_line).collect()
}

fn parse_directory_line(line: &str) -> Option<SchoolReference> {
    let mut parts = line.split("||");
    let name_and_details = parts.next()?;
    let npsn = parts.next()?.trim();
    let nama = name_and_details
        .split('(')
        .next()
        .unwrap_or(name_and_details)
        .trim();
    Some(SchoolReference {
        nama: nama.to_string(),
        npsn: npsn.to_string(),
    })
}
