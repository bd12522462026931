use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::error;

use super::{unknown_action, Controller};
use crate::error::{AppError, AppResult};
use crate::form::FormFields;
use crate::integrations::news::{NewsPage, NewsQuery, NEWS_CATEGORIES};
use crate::integrations::NewsClient;
use crate::shell::{AppContext, FetchToken, ModuleId, Rendered};

pub struct NewsController {
    client: Arc<NewsClient>,
    query: NewsQuery,
    page: Option<NewsPage>,
}

impl NewsController {
    pub fn new(client: Arc<NewsClient>) -> Self {
        let query = client.default_query();
        Self {
            client,
            query,
            page: None,
        }
    }

    #[cfg(test)]
    pub fn query(&self) -> &NewsQuery {
        &self.query
    }

    fn total_pages(&self) -> u32 {
        self.page.as_ref().map_or(1, |page| page.total_pages)
    }
}

#[async_trait]
impl Controller for NewsController {
    const MODULE: ModuleId = ModuleId::News;

    async fn fetch_data(&mut self, ctx: &AppContext, token: &FetchToken) {
        let result = self.client.headlines(&self.query).await;
        if token.is_cancelled() {
            return;
        }
        match result {
            Ok(page) => self.page = Some(page),
            Err(err) => {
                error!(category = %self.query.category, page = self.query.page, error = %err, "headline fetch failed");
                ctx.notify_error("Could not load headlines");
                self.page = None;
            }
        }
    }

    fn render(&self, _ctx: &AppContext) -> Rendered {
        let categories: Vec<_> = NEWS_CATEGORIES
            .iter()
            .map(|name| json!({ "name": name, "active": *name == self.query.category }))
            .collect();
        let total_pages = self.total_pages();
        Rendered {
            template: "news",
            context: json!({
                "country": self.query.country,
                "category": self.query.category,
                "categories": categories,
                "page": self.query.page,
                "total_pages": total_pages,
                "has_prev": self.query.page > 1,
                "has_next": self.query.page < total_pages,
                "articles": self.page.as_ref().map(|p| p.articles.as_slice()).unwrap_or_default(),
                "total_results": self.page.as_ref().map_or(0, |p| p.total_results),
            }),
        }
    }

    async fn handle(
        &mut self,
        _ctx: &AppContext,
        action: &str,
        form: &FormFields,
    ) -> AppResult<Option<String>> {
        match action {
            "category" => {
                let category = form.text("category")?;
                if !NEWS_CATEGORIES.contains(&category.as_str()) {
                    return Err(AppError::validation(format!("unknown news category '{category}'")));
                }
                self.query.category = category;
                self.query.page = 1;
                Ok(None)
            }
            "next" => {
                if self.query.page < self.total_pages() {
                    self.query.page += 1;
                }
                Ok(None)
            }
            "prev" => {
                self.query.page = self.query.page.saturating_sub(1).max(1);
                Ok(None)
            }
            "refresh" => {
                self.client.invalidate(&self.query).await;
                Ok(None)
            }
            other => Err(unknown_action(Self::MODULE, other)),
        }
    }

    fn reset(&mut self) {
        self.page = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::config::OrganizerConfig;
    use crate::controllers::FeatureModule;
    use crate::integrations::news::Article;
    use crate::shell::context::testing::{context_on, toasts};
    use crate::shell::Loadable;

    fn page(number: u32, title: &str) -> NewsPage {
        NewsPage {
            articles: vec![Article {
                title: title.into(),
                source: Some("Wire".into()),
                description: None,
                url: "https://news.example/a".into(),
                image_url: None,
                published_at: None,
            }],
            total_results: 15,
            page: number,
            total_pages: 2,
        }
    }

    #[rocket::async_test]
    async fn pages_forward_and_back_within_bounds() {
        let (_dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let client = Arc::new(NewsClient::new(&OrganizerConfig::default()));
        let mut query = client.default_query();
        client.prime(&query, page(1, "First")).await;
        query.page = 2;
        client.prime(&query, page(2, "Second")).await;

        let mut module = FeatureModule::new(NewsController::new(client));
        module.load(&ctx, ctx.fetch_token()).await.unwrap();
        assert_eq!(module.view().unwrap().context["has_prev"], false);

        module.dispatch(&ctx, "next", &FormFields::default()).await;
        let view = module.view().unwrap();
        assert_eq!(view.context["articles"][0]["title"], "Second");
        assert_eq!(view.context["has_next"], false);

        module.dispatch(&ctx, "next", &FormFields::default()).await;
        assert_eq!(module.controller().query().page, 2);

        module.dispatch(&ctx, "prev", &FormFields::default()).await;
        module.dispatch(&ctx, "prev", &FormFields::default()).await;
        assert_eq!(module.controller().query().page, 1);
        assert_eq!(module.view().unwrap().context["articles"][0]["title"], "First");
        assert!(toasts(&ctx).is_empty());
    }

    #[rocket::async_test]
    async fn category_change_resets_page_and_validates() {
        let (_dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let client = Arc::new(NewsClient::new(&OrganizerConfig::default()));
        let mut controller = NewsController::new(client);
        controller.query.page = 2;

        assert!(controller
            .handle(&ctx, "category", &FormFields::from([("category", "gossip")]))
            .await
            .is_err());
        controller
            .handle(&ctx, "category", &FormFields::from([("category", "science")]))
            .await
            .unwrap();
        assert_eq!(controller.query().category, "science");
        assert_eq!(controller.query().page, 1);

        controller.fetch_data(&ctx, &ctx.fetch_token()).await;
        assert!(controller.page.is_none());
        assert_eq!(toasts(&ctx).len(), 1);
    }
}
