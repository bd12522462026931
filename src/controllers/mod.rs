//! Per-feature controllers and the module wrapper that drives them.
//!
//! A controller owns the feature's state. `fetch_data` reads it from the
//! database (or an HTTP collaborator), `render` turns it into a view-model and
//! `handle` applies a submitted form. [`FeatureModule`] adds the lifecycle:
//! every action is followed by a toast and a full re-fetch.

pub mod calendar;
pub mod dashboard;
pub mod debts;
pub mod expenses;
pub mod news;
pub mod recurring;
pub mod tasks;
pub mod weather;

use async_trait::async_trait;
use rusqlite::Connection;
use tracing::{debug, error, warn};

use crate::error::{AppError, AppResult};
use crate::form::FormFields;
use crate::integrations::{NewsClient, WeatherClient};
use crate::shell::{AppContext, AppShell, FetchToken, Loadable, ModuleId, Rendered};

pub use calendar::CalendarController;
pub use dashboard::DashboardController;
pub use debts::DebtsController;
pub use expenses::ExpensesController;
pub use news::NewsController;
pub use recurring::RecurringController;
pub use tasks::TasksController;
pub use weather::WeatherController;

#[async_trait]
pub trait Controller: Send + 'static {
    const MODULE: ModuleId;

    /// Reloads state. Errors are logged and toasted, and the state falls back to empty.
    async fn fetch_data(&mut self, ctx: &AppContext, token: &FetchToken);

    fn render(&self, ctx: &AppContext) -> Rendered;

    /// Applies a form action. `Ok(Some(_))` is shown as a success toast.
    async fn handle(
        &mut self,
        ctx: &AppContext,
        action: &str,
        form: &FormFields,
    ) -> AppResult<Option<String>>;

    /// Drops fetched data when the module is unloaded.
    fn reset(&mut self);
}

pub struct FeatureModule<C> {
    controller: C,
    view: Option<Rendered>,
}

impl<C: Controller> FeatureModule<C> {
    pub fn new(controller: C) -> Self {
        Self {
            controller,
            view: None,
        }
    }

    pub fn boxed(controller: C) -> Box<dyn Loadable> {
        Box::new(Self::new(controller))
    }

    #[cfg(test)]
    pub fn controller(&self) -> &C {
        &self.controller
    }

    async fn fetch_and_render(&mut self, ctx: &AppContext, token: FetchToken) {
        self.controller.fetch_data(ctx, &token).await;
        if token.is_cancelled() {
            debug!(module = %C::MODULE, "navigation moved on, skipping render");
            return;
        }
        self.view = Some(self.controller.render(ctx));
    }
}

#[async_trait]
impl<C: Controller> Loadable for FeatureModule<C> {
    async fn load(&mut self, ctx: &AppContext, token: FetchToken) -> AppResult<()> {
        self.fetch_and_render(ctx, token).await;
        Ok(())
    }

    async fn unload(&mut self) {
        self.controller.reset();
        self.view = None;
    }

    async fn refresh(&mut self, ctx: &AppContext) {
        self.fetch_and_render(ctx, ctx.fetch_token()).await;
    }

    async fn dispatch(&mut self, ctx: &AppContext, action: &str, form: &FormFields) {
        match self.controller.handle(ctx, action, form).await {
            Ok(Some(message)) => ctx.notify_success(message),
            Ok(None) => {}
            Err(err) => {
                warn!(module = %C::MODULE, action, error = %err, "action failed");
                ctx.notify_error(err.to_string());
            }
        }
        self.refresh(ctx).await;
    }

    fn view(&self) -> Option<&Rendered> {
        self.view.as_ref()
    }
}

/// Runs a database read for `module`.
///
/// Returns `None` when the fetch was cancelled, so stale data is never
/// applied. A failed read is logged and toasted and yields `T::default()`.
pub(crate) fn read_or_default<T, F>(
    ctx: &AppContext,
    token: &FetchToken,
    module: ModuleId,
    read: F,
) -> Option<T>
where
    T: Default,
    F: FnOnce(&Connection) -> AppResult<T>,
{
    let result = ctx.conn().and_then(|conn| read(&conn));
    if token.is_cancelled() {
        debug!(%module, "discarding stale fetch result");
        return None;
    }
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            error!(%module, user = ctx.user_id(), error = %err, "fetch failed");
            ctx.notify_error(format!("Could not load {module}"));
            Some(T::default())
        }
    }
}

/// Turns a zero-row write into a not-found error.
pub(crate) fn affected(rows: usize, entity: &'static str) -> AppResult<()> {
    if rows == 0 {
        Err(AppError::NotFound(entity))
    } else {
        Ok(())
    }
}

pub(crate) fn unknown_action(module: ModuleId, action: &str) -> AppError {
    AppError::UnknownAction {
        module: module.to_string(),
        action: action.to_string(),
    }
}

/// Installs a lazy factory for every feature module.
pub fn register_default_modules(shell: &mut AppShell) {
    shell.register_lazy_module(ModuleId::Dashboard, |ctx| {
        Ok(FeatureModule::boxed(DashboardController::new(ctx)))
    });
    shell.register_lazy_module(ModuleId::Expenses, |ctx| {
        Ok(FeatureModule::boxed(ExpensesController::new(ctx)))
    });
    shell.register_lazy_module(ModuleId::Debts, |_ctx| {
        Ok(FeatureModule::boxed(DebtsController::default()))
    });
    shell.register_lazy_module(ModuleId::Recurring, |ctx| {
        Ok(FeatureModule::boxed(RecurringController::new(ctx)))
    });
    shell.register_lazy_module(ModuleId::Tasks, |ctx| {
        Ok(FeatureModule::boxed(TasksController::new(ctx)))
    });
    shell.register_lazy_module(ModuleId::Calendar, |ctx| {
        Ok(FeatureModule::boxed(CalendarController::new(ctx.today())))
    });
    shell.register_lazy_module(ModuleId::Weather, |ctx| {
        let client = ctx
            .services()
            .get::<WeatherClient>()
            .filter(|client| client.is_configured())
            .ok_or_else(|| AppError::ModuleUnavailable {
                module: ModuleId::Weather.to_string(),
                reason: "weather service is not configured".into(),
            })?;
        Ok(FeatureModule::boxed(WeatherController::new(ctx, client)))
    });
    shell.register_lazy_module(ModuleId::News, |ctx| {
        let client = ctx
            .services()
            .get::<NewsClient>()
            .filter(|client| client.is_configured())
            .ok_or_else(|| AppError::ModuleUnavailable {
                module: ModuleId::News.to_string(),
                reason: "news service is not configured".into(),
            })?;
        Ok(FeatureModule::boxed(NewsController::new(client)))
    });
}
