// src/ingest/news.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;

use crate::ingest::client::SourceClient;
use crate::ingest::types::{CollectError, Collector, NewsRecord};
use crate::ingest::{fetch_all, reduce_batch};

pub const DEFAULT_NEWS_BASE_URL: &str = "http://api.mediastack.com/v1/news";
pub const DEFAULT_NEWS_LIMIT: u32 = 50;
pub const DEFAULT_NEWS_SORT: &str = "published_desc";
pub const DEFAULT_NEWS_CATEGORIES: [&str; 4] = ["technology", "science", "business", "health"];

/// Request parameters for the news endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub base_url: String,
    pub api_key: String,
    pub categories: Vec<String>,
    pub limit: u32,
    pub sort: String,
}

impl NewsQuery {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_NEWS_BASE_URL.to_string(),
            api_key: api_key.into(),
            categories: DEFAULT_NEWS_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            limit: DEFAULT_NEWS_LIMIT,
            sort: DEFAULT_NEWS_SORT.to_string(),
        }
    }

    /// One request url per category, in category order.
    pub fn urls(&self) -> anyhow::Result<Vec<String>> {
        let limit = self.limit.to_string();
        self.categories
            .iter()
            .map(|category| {
                let url = Url::parse_with_params(
                    &self.base_url,
                    &[
                        ("access_key", self.api_key.as_str()),
                        ("categories", category.as_str()),
                        ("limit", limit.as_str()),
                        ("sort", self.sort.as_str()),
                    ],
                )?;
                Ok(url.to_string())
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct NewsPayload {
    data: Vec<Article>,
}

// Only the canonical columns; `author`, `published_at` etc. are ignored.
#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    source: Option<String>,
    image: Option<String>,
    category: Option<String>,
    language: Option<String>,
    country: Option<String>,
}

/// Collects the latest articles for every configured category.
pub struct NewsCollector<C: ?Sized> {
    client: Arc<C>,
    urls: Vec<String>,
}

impl<C: SourceClient + ?Sized> NewsCollector<C> {
    pub fn new(client: Arc<C>, query: &NewsQuery) -> anyhow::Result<Self> {
        Ok(Self {
            client,
            urls: query.urls()?,
        })
    }
}

#[async_trait]
impl<C: SourceClient + ?Sized> Collector for NewsCollector<C> {
    type Row = NewsRecord;

    async fn collect(&self, today: NaiveDate) -> Result<Vec<NewsRecord>, CollectError> {
        let results = fetch_all(self.client.as_ref(), &self.urls).await;
        let rows = reduce_batch(self.name(), results, |payload| {
            Ok(normalize_payload(payload, today))
        })?;
        tracing::info!(
            dataset = self.name(),
            categories = self.urls.len(),
            rows = rows.len(),
            "news batch collected"
        );
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "market_news"
    }
}

/// Map a `{data: [article, ...]}` payload to rows; `None` if the shape is wrong.
pub fn normalize_payload(payload: serde_json::Value, today: NaiveDate) -> Option<Vec<NewsRecord>> {
    let parsed: NewsPayload = match serde_json::from_value(payload) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "unexpected news payload shape");
            return None;
        }
    };

    Some(
        parsed
            .data
            .into_iter()
            .map(|a| NewsRecord {
                title: a.title,
                description: a.description,
                url: a.url,
                source: a.source,
                image: a.image,
                category: a.category,
                language: a.language,
                country: a.country,
                snapshot_date: today,
            })
            .collect(),
    )
}
