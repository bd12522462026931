//! Module registry and lifecycle for one signed-in session.
//!
//! Feature modules are identified by the closed [`ModuleId`] enum. Each one is
//! either registered as a ready instance or as a factory that builds it on
//! first use. [`AppShell::load_module`] swaps the active module: the previous
//! module is unloaded before the next one loads, and every swap cancels
//! fetches still running for the previous module.

pub mod context;
pub mod services;
pub mod toast;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use context::{AppContext, FetchToken};
pub use toast::{Toast, ToastKind, ToastService};

use crate::error::{AppError, AppResult};
use crate::form::FormFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleId {
    Dashboard,
    Expenses,
    Debts,
    Recurring,
    Tasks,
    Calendar,
    Weather,
    News,
}

impl ModuleId {
    pub const ALL: [ModuleId; 8] = [
        ModuleId::Dashboard,
        ModuleId::Expenses,
        ModuleId::Debts,
        ModuleId::Recurring,
        ModuleId::Tasks,
        ModuleId::Calendar,
        ModuleId::Weather,
        ModuleId::News,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleId::Dashboard => "dashboard",
            ModuleId::Expenses => "expenses",
            ModuleId::Debts => "debts",
            ModuleId::Recurring => "recurring",
            ModuleId::Tasks => "tasks",
            ModuleId::Calendar => "calendar",
            ModuleId::Weather => "weather",
            ModuleId::News => "news",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| AppError::UnknownModule(s.to_string()))
    }
}

/// A module's markup: the template under `templates/modules/` plus its view-model.
#[derive(Debug, Clone, Serialize)]
pub struct Rendered {
    pub template: &'static str,
    pub context: serde_json::Value,
}

#[async_trait]
pub trait Loadable: Send {
    async fn load(&mut self, ctx: &AppContext, token: FetchToken) -> AppResult<()>;

    async fn unload(&mut self) {}

    async fn refresh(&mut self, ctx: &AppContext);

    /// Runs a form action; failures are reported to the user, not returned.
    async fn dispatch(&mut self, ctx: &AppContext, action: &str, form: &FormFields);

    fn view(&self) -> Option<&Rendered>;
}

pub type ModuleFactory = Box<dyn Fn(&AppContext) -> AppResult<Box<dyn Loadable>> + Send + Sync>;

pub struct AppShell {
    ctx: AppContext,
    modules: HashMap<ModuleId, Box<dyn Loadable>>,
    lazy: HashMap<ModuleId, ModuleFactory>,
    current: Option<ModuleId>,
}

impl AppShell {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            modules: HashMap::new(),
            lazy: HashMap::new(),
            current: None,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn register_module(&mut self, id: ModuleId, module: Box<dyn Loadable>) {
        self.modules.insert(id, module);
    }

    pub fn register_lazy_module<F>(&mut self, id: ModuleId, factory: F)
    where
        F: Fn(&AppContext) -> AppResult<Box<dyn Loadable>> + Send + Sync + 'static,
    {
        self.lazy.insert(id, Box::new(factory));
    }

    pub fn register_service<T: Any + Send + Sync>(&mut self, service: Arc<T>) {
        self.ctx.services_mut().insert(service);
    }

    pub fn service<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.ctx.services().get::<T>()
    }

    pub fn module(&self, id: ModuleId) -> Option<&dyn Loadable> {
        let found = self.modules.get(&id).map(|module| module.as_ref());
        if found.is_none() {
            warn!(module = %id, "module not loaded");
        }
        found
    }

    pub fn current_module(&self) -> Option<ModuleId> {
        self.current
    }

    pub fn current_view(&self) -> Option<&Rendered> {
        self.current
            .and_then(|id| self.module(id))
            .and_then(|module| module.view())
    }

    pub fn is_instantiated(&self, id: ModuleId) -> bool {
        self.modules.contains_key(&id)
    }

    /// Activates `id`, building it from its factory on first use.
    ///
    /// Factory errors are returned as-is and nothing is cached, so a later
    /// call tries the factory again.
    pub async fn load_module(&mut self, id: ModuleId) -> AppResult<()> {
        if !self.is_instantiated(id) {
            let factory = self.lazy.get(&id).ok_or_else(|| {
                warn!(module = %id, "no module or factory registered");
                AppError::UnknownModule(id.to_string())
            })?;
            let module = factory(&self.ctx)?;
            debug!(module = %id, "module instantiated");
            self.modules.insert(id, module);
        }

        if let Some(previous) = self.current.filter(|previous| *previous != id) {
            if let Some(module) = self.modules.get_mut(&previous) {
                module.unload().await;
                debug!(module = %previous, "module unloaded");
            }
        }

        self.current = Some(id);
        let token = self.ctx.begin_navigation();
        let module = self
            .modules
            .get_mut(&id)
            .ok_or_else(|| AppError::UnknownModule(id.to_string()))?;
        if let Err(err) = module.load(&self.ctx, token).await {
            module.unload().await;
            self.current = None;
            return Err(err);
        }
        info!(module = %id, user = self.ctx.user_id(), "module loaded");
        Ok(())
    }

    pub async fn refresh_current(&mut self) {
        if let Some(module) = self.current.and_then(|id| self.modules.get_mut(&id)) {
            module.refresh(&self.ctx).await;
        }
    }

    pub async fn dispatch(&mut self, action: &str, form: &FormFields) -> AppResult<()> {
        let id = self
            .current
            .ok_or_else(|| AppError::UnknownModule("no active module".into()))?;
        let module = self
            .modules
            .get_mut(&id)
            .ok_or_else(|| AppError::UnknownModule(id.to_string()))?;
        module.dispatch(&self.ctx, action, form).await;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    pub type Journal = Arc<Mutex<Vec<String>>>;

    /// Records lifecycle calls into a shared journal.
    pub struct StubModule {
        pub name: &'static str,
        pub journal: Journal,
        pub fail_load: bool,
        pub view: Option<Rendered>,
    }

    impl StubModule {
        pub fn boxed(name: &'static str, journal: &Journal) -> Box<dyn Loadable> {
            Box::new(StubModule {
                name,
                journal: Arc::clone(journal),
                fail_load: false,
                view: None,
            })
        }

        fn record(&self, event: &str) {
            self.journal
                .lock()
                .expect("journal")
                .push(format!("{event}:{}", self.name));
        }
    }

    #[async_trait]
    impl Loadable for StubModule {
        async fn load(&mut self, _ctx: &AppContext, _token: FetchToken) -> AppResult<()> {
            self.record("load");
            if self.fail_load {
                return Err(AppError::validation(format!("{} failed", self.name)));
            }
            self.view = Some(Rendered {
                template: "stub",
                context: serde_json::json!({ "name": self.name }),
            });
            Ok(())
        }

        async fn unload(&mut self) {
            self.record("unload");
        }

        async fn refresh(&mut self, _ctx: &AppContext) {
            self.record("refresh");
        }

        async fn dispatch(&mut self, _ctx: &AppContext, action: &str, _form: &FormFields) {
            self.record(&format!("dispatch-{action}"));
        }

        fn view(&self) -> Option<&Rendered> {
            self.view.as_ref()
        }
    }

    pub fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().expect("journal").clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::context::testing::context_on;
    use super::testing::{entries, Journal, StubModule};
    use super::*;

    fn shell() -> (tempfile::TempDir, AppShell) {
        let (dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        (dir, AppShell::new(ctx))
    }

    #[rocket::async_test]
    async fn previous_module_unloads_before_next_loads() {
        let (_dir, mut shell) = shell();
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        shell.register_module(ModuleId::Dashboard, StubModule::boxed("dashboard", &journal));
        shell.register_module(ModuleId::Tasks, StubModule::boxed("tasks", &journal));

        shell.load_module(ModuleId::Dashboard).await.unwrap();
        shell.load_module(ModuleId::Tasks).await.unwrap();
        shell.load_module(ModuleId::Tasks).await.unwrap();

        assert_eq!(
            entries(&journal),
            ["load:dashboard", "unload:dashboard", "load:tasks", "load:tasks"]
        );
        assert_eq!(shell.current_module(), Some(ModuleId::Tasks));
    }

    #[rocket::async_test]
    async fn failed_load_unloads_and_leaves_nothing_current() {
        let (_dir, mut shell) = shell();
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        shell.register_module(ModuleId::Dashboard, StubModule::boxed("dashboard", &journal));
        shell.register_module(
            ModuleId::News,
            Box::new(StubModule {
                name: "news",
                journal: Arc::clone(&journal),
                fail_load: true,
                view: None,
            }),
        );

        shell.load_module(ModuleId::Dashboard).await.unwrap();
        assert!(shell.load_module(ModuleId::News).await.is_err());

        assert_eq!(
            entries(&journal),
            ["load:dashboard", "unload:dashboard", "load:news", "unload:news"]
        );
        assert_eq!(shell.current_module(), None);
        assert!(shell.current_view().is_none());
        assert!(shell.dispatch("refresh", &FormFields::default()).await.is_err());
    }

    #[rocket::async_test]
    async fn lazy_module_is_instantiated_once() {
        let (_dir, mut shell) = shell();
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let factory_journal = Arc::clone(&journal);
        shell.register_lazy_module(ModuleId::News, move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(StubModule::boxed("news", &factory_journal))
        });
        shell.register_module(ModuleId::Dashboard, StubModule::boxed("dashboard", &journal));

        assert!(!shell.is_instantiated(ModuleId::News));
        shell.load_module(ModuleId::News).await.unwrap();
        shell.load_module(ModuleId::Dashboard).await.unwrap();
        shell.load_module(ModuleId::News).await.unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(shell.module(ModuleId::News).is_some());
    }

    #[rocket::async_test]
    async fn factory_failure_propagates_without_caching() {
        let (_dir, mut shell) = shell();
        shell.register_lazy_module(ModuleId::Weather, |_ctx| {
            Err(AppError::ModuleUnavailable {
                module: "weather".into(),
                reason: "no key".into(),
            })
        });

        let err = shell.load_module(ModuleId::Weather).await.unwrap_err();
        assert!(matches!(err, AppError::ModuleUnavailable { .. }));
        assert!(!shell.is_instantiated(ModuleId::Weather));
        assert_eq!(shell.current_module(), None);
    }

    #[rocket::async_test]
    async fn unknown_module_is_an_error_and_lookup_is_none() {
        let (_dir, mut shell) = shell();
        assert!(matches!(
            shell.load_module(ModuleId::Calendar).await,
            Err(AppError::UnknownModule(_))
        ));
        assert!(shell.module(ModuleId::Calendar).is_none());
        assert!(shell.service::<String>().is_none());
    }

    #[rocket::async_test]
    async fn dispatch_reaches_current_module() {
        let (_dir, mut shell) = shell();
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        shell.register_module(ModuleId::Debts, StubModule::boxed("debts", &journal));

        assert!(shell.dispatch("pay", &FormFields::default()).await.is_err());
        shell.load_module(ModuleId::Debts).await.unwrap();
        shell.dispatch("pay", &FormFields::default()).await.unwrap();
        shell.refresh_current().await;

        assert_eq!(
            entries(&journal),
            ["load:debts", "dispatch-pay:debts", "refresh:debts"]
        );
        assert_eq!(shell.current_view().map(|v| v.template), Some("stub"));
    }

    #[test]
    fn module_ids_parse_from_route_names() {
        assert_eq!("calendar".parse::<ModuleId>().unwrap(), ModuleId::Calendar);
        assert!("inbox".parse::<ModuleId>().is_err());
    }
}
