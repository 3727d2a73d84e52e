//! Paginated list helpers
//!
//! List endpoints answer with a page envelope:
//!
//! ```json
//! { "count": 42, "next": "https://.../?page=2", "previous": null, "results": [ ... ] }
//! ```
//!
//! [`ApiClient::get_paginated`] fetches one page; [`ApiClient::get_all`]
//! follows `next` links until the last page and concatenates the results.

use std::collections::HashSet;

use ledgerdesk_core::domain::NormalizedError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::{ApiClient, RequestDescriptor, Verb};

/// One page of a list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total number of items across all pages
    #[serde(default)]
    pub count: u64,
    /// Absolute URL of the next page
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

impl ApiClient {
    /// Fetches one page of `url`
    pub async fn get_paginated<T: DeserializeOwned>(
        &self,
        url: &str,
        params: Option<serde_json::Value>,
    ) -> Result<Page<T>, NormalizedError> {
        self.request(Verb::Get, url, params).await
    }

    /// Fetches every page of `url`, following `next` links
    ///
    /// `params` apply to the first request only; `next` links already carry
    /// their query string. A link seen twice ends the walk.
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        url: &str,
        params: Option<serde_json::Value>,
    ) -> Result<Vec<T>, NormalizedError> {
        let mut page: Page<T> = self.get_paginated(url, params).await?;
        let mut items = std::mem::take(&mut page.results);
        let mut visited = HashSet::new();
        let mut page_count: u32 = 1;

        debug!(url, count = page.count, has_next = page.has_next(), "Received first page");

        while let Some(next) = page.next.take() {
            if !visited.insert(next.clone()) {
                warn!(next = %next, "Pagination link repeats, stopping");
                break;
            }
            page_count += 1;
            debug!(page = page_count, "Following next link");

            let result = self.execute(RequestDescriptor::new(Verb::Get, &next)).await;
            page = self.settle(result)?;
            items.append(&mut page.results);
        }

        debug!(url, total_items = items.len(), total_pages = page_count, "Pagination complete");
        Ok(items)
    }
}
