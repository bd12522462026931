use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use super::{unknown_action, Controller};
use crate::error::AppResult;
use crate::form::FormFields;
use crate::integrations::weather::WeatherReport;
use crate::integrations::WeatherClient;
use crate::shell::{AppContext, FetchToken, ModuleId, Rendered};

pub struct WeatherController {
    client: Arc<WeatherClient>,
    city: String,
    report: Option<WeatherReport>,
    failure: Option<String>,
}

impl WeatherController {
    /// Starts with the last city the user looked up, or the configured default.
    pub fn new(ctx: &AppContext, client: Arc<WeatherClient>) -> Self {
        let city = ctx
            .settings()
            .last_city
            .unwrap_or_else(|| ctx.config.weather.default_city.clone());
        Self {
            client,
            city,
            report: None,
            failure: None,
        }
    }

    #[cfg(test)]
    pub fn city(&self) -> &str {
        &self.city
    }
}

#[async_trait]
impl Controller for WeatherController {
    const MODULE: ModuleId = ModuleId::Weather;

    async fn fetch_data(&mut self, ctx: &AppContext, token: &FetchToken) {
        let result = self.client.current(&self.city).await;
        if token.is_cancelled() {
            return;
        }
        match result {
            Ok(report) => {
                self.report = Some(report);
                self.failure = None;
            }
            Err(err) => {
                error!(city = %self.city, error = %err, "weather lookup failed");
                ctx.notify_error(format!("Could not load weather for {}", self.city));
                self.report = None;
                self.failure = Some(err.to_string());
            }
        }
    }

    fn render(&self, _ctx: &AppContext) -> Rendered {
        Rendered {
            template: "weather",
            context: json!({
                "city": self.city,
                "report": self.report,
                "temperature": self.report.as_ref().map(|r| format!("{:.0}", r.temperature_c)),
                "feels_like": self.report.as_ref().map(|r| format!("{:.0}", r.feels_like_c)),
                "failure": self.failure,
            }),
        }
    }

    async fn handle(
        &mut self,
        ctx: &AppContext,
        action: &str,
        form: &FormFields,
    ) -> AppResult<Option<String>> {
        match action {
            "city" => {
                let city = form.text("city")?;
                ctx.update_settings(|settings| settings.last_city = Some(city.clone()))?;
                info!(user = ctx.user_id(), %city, "weather city changed");
                self.city = city;
                Ok(None)
            }
            "refresh" => {
                self.client.invalidate(&self.city).await;
                Ok(None)
            }
            other => Err(unknown_action(Self::MODULE, other)),
        }
    }

    fn reset(&mut self) {
        self.report = None;
        self.failure = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::config::OrganizerConfig;
    use crate::controllers::FeatureModule;
    use crate::shell::context::testing::{context_on, toasts};
    use crate::shell::{Loadable, ToastKind};

    fn report(city: &str) -> WeatherReport {
        WeatherReport {
            city: city.into(),
            country: None,
            temperature_c: 21.6,
            feels_like_c: 20.2,
            humidity: 40,
            wind_speed: 2.0,
            condition: "Clear".into(),
            description: "clear sky".into(),
            icon: None,
        }
    }

    #[rocket::async_test]
    async fn renders_cached_report_for_default_city() {
        let (_dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let client = Arc::new(WeatherClient::new(&OrganizerConfig::default()));
        client.prime("London", report("London")).await;

        let mut module = FeatureModule::new(WeatherController::new(&ctx, client));
        module.load(&ctx, ctx.fetch_token()).await.unwrap();
        let view = module.view().unwrap();
        assert_eq!(view.context["city"], "London");
        assert_eq!(view.context["temperature"], "22");
        assert_eq!(view.context["report"]["condition"], "Clear");
        assert!(toasts(&ctx).is_empty());
    }

    #[rocket::async_test]
    async fn city_change_is_persisted_and_failures_are_toasted() {
        let (_dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let client = Arc::new(WeatherClient::new(&OrganizerConfig::default()));
        client.prime("Oslo", report("Oslo")).await;
        let mut module = FeatureModule::new(WeatherController::new(&ctx, Arc::clone(&client)));

        module
            .dispatch(&ctx, "city", &FormFields::from([("city", "Oslo")]))
            .await;
        assert_eq!(ctx.settings().last_city.as_deref(), Some("Oslo"));
        assert_eq!(module.view().unwrap().context["report"]["city"], "Oslo");

        // The unconfigured client cannot fetch once the cache entry is gone.
        module.dispatch(&ctx, "refresh", &FormFields::default()).await;
        let view = module.view().unwrap();
        assert!(view.context["report"].is_null());
        assert!(view.context["failure"].is_string());
        assert_eq!(toasts(&ctx)[0].kind, ToastKind::Error);

        let reopened = WeatherController::new(&ctx, client);
        assert_eq!(reopened.city(), "Oslo");
    }
}
