use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cache::ResponseCache;
use crate::config::OrganizerConfig;
use crate::error::{AppError, AppResult};

pub const NEWS_CATEGORIES: [&str; 7] = [
    "general",
    "business",
    "entertainment",
    "health",
    "science",
    "sports",
    "technology",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewsQuery {
    pub country: String,
    pub category: String,
    pub page: u32,
}

impl NewsQuery {
    fn cache_key(&self) -> String {
        format!("news:{}:{}:{}", self.country, self.category, self.page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub title: String,
    pub source: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsPage {
    pub articles: Vec<Article>,
    pub total_results: u32,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHeadlines {
    status: String,
    #[serde(default)]
    total_results: u32,
    #[serde(default)]
    articles: Vec<RawArticle>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    source: Option<RawSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct RawSource {
    name: Option<String>,
}

impl RawHeadlines {
    fn into_page(self, page: u32, page_size: u32) -> AppResult<NewsPage> {
        if self.status != "ok" {
            return Err(AppError::validation(format!(
                "news lookup failed: {}",
                self.message.unwrap_or(self.status)
            )));
        }
        let articles = self
            .articles
            .into_iter()
            .filter_map(|raw| {
                Some(Article {
                    title: raw.title.filter(|t| !t.is_empty())?,
                    url: raw.url?,
                    source: raw.source.and_then(|s| s.name),
                    description: raw.description,
                    image_url: raw.url_to_image,
                    published_at: raw.published_at,
                })
            })
            .collect();
        Ok(NewsPage {
            articles,
            total_results: self.total_results,
            page,
            total_pages: self.total_results.div_ceil(page_size.max(1)).max(1),
        })
    }
}

/// Top headlines by country, category and page, NewsAPI-compatible.
pub struct NewsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_size: u32,
    default_country: String,
    cache: ResponseCache<NewsPage>,
}

impl NewsClient {
    pub fn new(config: &OrganizerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.news.base_url.trim_end_matches('/').to_string(),
            api_key: config.news.api_key.clone().filter(|key| !key.is_empty()),
            page_size: config.news.page_size,
            default_country: config.news.country.clone(),
            cache: ResponseCache::new(config.cache_ttl()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn default_query(&self) -> NewsQuery {
        NewsQuery {
            country: self.default_country.clone(),
            category: NEWS_CATEGORIES[0].to_string(),
            page: 1,
        }
    }

    pub async fn headlines(&self, query: &NewsQuery) -> AppResult<NewsPage> {
        let key = query.cache_key();
        if let Some(page) = self.cache.get(&key).await {
            debug!(%key, "news cache hit");
            return Ok(page);
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| AppError::ModuleUnavailable {
            module: "news".into(),
            reason: "no news api key configured".into(),
        })?;

        let page = query.page.to_string();
        let page_size = self.page_size.to_string();
        let response = self
            .http
            .get(format!("{}/top-headlines", self.base_url))
            .query(&[
                ("country", query.country.as_str()),
                ("category", query.category.as_str()),
                ("page", page.as_str()),
                ("pageSize", page_size.as_str()),
                ("apiKey", api_key),
            ])
            .send()
            .await?;
        let status = response.status();
        let raw = response.json::<RawHeadlines>().await?;
        if !status.is_success() {
            warn!(%status, category = %query.category, "news provider rejected request");
        }
        let page = raw.into_page(query.page, self.page_size)?;
        self.cache.store(key, page.clone()).await;
        Ok(page)
    }

    pub async fn invalidate(&self, query: &NewsQuery) {
        self.cache
            .invalidate_prefix(&format!("news:{}:{}:", query.country, query.category))
            .await;
    }

    #[cfg(test)]
    pub(crate) async fn prime(&self, query: &NewsQuery, page: NewsPage) {
        self.cache.store(query.cache_key(), page).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_page_and_skips_untitled_articles() {
        let raw: RawHeadlines = serde_json::from_str(
            r#"{
                "status": "ok",
                "totalResults": 21,
                "articles": [
                    {"source": {"name": "Wire"}, "title": "Rates hold", "url": "https://a.example",
                     "publishedAt": "2024-01-15T08:00:00Z"},
                    {"source": {"name": "Wire"}, "title": "", "url": "https://b.example"},
                    {"title": "No link"}
                ]
            }"#,
        )
        .expect("json");
        let page = raw.into_page(2, 10).expect("page");
        assert_eq!(page.articles.len(), 1);
        assert_eq!(page.articles[0].source.as_deref(), Some("Wire"));
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn provider_error_becomes_validation_error() {
        let raw: RawHeadlines =
            serde_json::from_str(r#"{"status": "error", "code": "apiKeyInvalid", "message": "bad key"}"#)
                .expect("json");
        let err = raw.into_page(1, 10).unwrap_err();
        assert_eq!(err.to_string(), "news lookup failed: bad key");
    }

    #[test]
    fn empty_result_still_has_one_page() {
        let raw: RawHeadlines = serde_json::from_str(r#"{"status": "ok", "totalResults": 0}"#).unwrap();
        assert_eq!(raw.into_page(1, 10).unwrap().total_pages, 1);
    }
}
