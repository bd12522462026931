//! Route name to module mapping, navigation history and tab state.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::shell::{AppShell, ModuleId};

/// Route name, module and tab label, in tab order.
pub const DEFAULT_ROUTES: [(&str, ModuleId, &str); 8] = [
    ("dashboard", ModuleId::Dashboard, "Dashboard"),
    ("expenses", ModuleId::Expenses, "Expenses"),
    ("debts", ModuleId::Debts, "Debts"),
    ("recurring", ModuleId::Recurring, "Recurring"),
    ("tasks", ModuleId::Tasks, "Tasks"),
    ("calendar", ModuleId::Calendar, "Calendar"),
    ("weather", ModuleId::Weather, "Weather"),
    ("news", ModuleId::News, "News"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct NavigateOptions {
    pub force: bool,
    pub replace: bool,
}

impl NavigateOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            replace: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Unchanged,
    Navigated(String),
    FellBack { requested: String, to: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TabState {
    pub route: &'static str,
    pub label: &'static str,
    pub active: bool,
}

#[derive(Debug, Default)]
struct History {
    entries: Vec<String>,
    cursor: usize,
}

impl History {
    fn push(&mut self, path: &str) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(path.to_string());
        self.cursor = self.entries.len() - 1;
    }

    fn replace(&mut self, path: &str) {
        match self.entries.get_mut(self.cursor) {
            Some(entry) => *entry = path.to_string(),
            None => self.push(path),
        }
    }

    fn step(&mut self, delta: isize) -> Option<&str> {
        let target = self.cursor.checked_add_signed(delta)?;
        let entry = self.entries.get(target)?;
        self.cursor = target;
        Some(entry)
    }
}

pub struct Router {
    routes: Vec<(&'static str, ModuleId, &'static str)>,
    default_route: String,
    current: Option<String>,
    fragment: String,
    history: History,
}

impl Router {
    pub fn new(default_route: impl Into<String>) -> Self {
        Self {
            routes: DEFAULT_ROUTES.to_vec(),
            default_route: default_route.into(),
            current: None,
            fragment: String::new(),
            history: History::default(),
        }
    }

    pub fn current_route(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    /// The URL fragment for the current route, e.g. `#tasks`.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    #[cfg(test)]
    pub fn history_len(&self) -> usize {
        self.history.entries.len()
    }

    pub fn can_go_back(&self) -> bool {
        self.history.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.history.cursor + 1 < self.history.entries.len()
    }

    pub fn module_for(&self, route: &str) -> Option<ModuleId> {
        self.routes
            .iter()
            .find(|(name, _, _)| *name == route)
            .map(|(_, id, _)| *id)
    }

    /// Fragment route when it names a known route, otherwise the default.
    pub fn initial_route(&self, fragment: Option<&str>) -> String {
        fragment
            .map(|f| f.trim_start_matches('#'))
            .filter(|f| self.module_for(f).is_some())
            .unwrap_or(self.default_route.as_str())
            .to_string()
    }

    pub fn tabs(&self) -> Vec<TabState> {
        self.routes
            .iter()
            .map(|&(route, _, label)| TabState {
                route,
                label,
                active: self.current.as_deref() == Some(route),
            })
            .collect()
    }

    /// Navigates to `path`, loading its module through the shell.
    ///
    /// A failed load falls back to the default route once. If the default
    /// route itself fails the error is returned.
    pub async fn navigate(
        &mut self,
        shell: &mut AppShell,
        path: &str,
        options: NavigateOptions,
    ) -> AppResult<NavOutcome> {
        let Some(module) = self.module_for(path) else {
            error!(route = path, "navigation to unknown route");
            return Err(AppError::UnknownRoute(path.to_string()));
        };
        if !options.force && self.current.as_deref() == Some(path) {
            return Ok(NavOutcome::Unchanged);
        }

        match self.activate(shell, path, module, options.replace).await {
            Ok(()) => Ok(NavOutcome::Navigated(path.to_string())),
            Err(err) if path != self.default_route => {
                warn!(route = path, error = %err, "module load failed, falling back to default route");
                let fallback = self.default_route.clone();
                let fallback_module = self
                    .module_for(&fallback)
                    .ok_or_else(|| AppError::UnknownRoute(fallback.clone()))?;
                self.activate(shell, &fallback, fallback_module, options.replace)
                    .await
                    .inspect_err(|err| error!(route = %fallback, error = %err, "default route failed"))?;
                Ok(NavOutcome::FellBack {
                    requested: path.to_string(),
                    to: fallback,
                })
            }
            Err(err) => {
                error!(route = path, error = %err, "default route failed");
                Err(err)
            }
        }
    }

    async fn activate(
        &mut self,
        shell: &mut AppShell,
        path: &str,
        module: ModuleId,
        replace: bool,
    ) -> AppResult<()> {
        info!(route = path, "navigating");
        if let Err(err) = shell.load_module(module).await {
            self.follow_shell(shell);
            return Err(err);
        }
        if replace {
            self.history.replace(path);
        } else {
            self.history.push(path);
        }
        self.fragment = format!("#{path}");
        self.current = Some(path.to_string());
        Ok(())
    }

    /// After a failed load the current route is whatever the shell still has loaded.
    fn follow_shell(&mut self, shell: &AppShell) {
        self.current = shell.current_module().and_then(|id| {
            self.routes
                .iter()
                .find(|(_, module, _)| *module == id)
                .map(|(name, _, _)| name.to_string())
        });
        self.fragment = self
            .current
            .as_deref()
            .map(|route| format!("#{route}"))
            .unwrap_or_default();
    }

    pub async fn back(&mut self, shell: &mut AppShell) -> AppResult<NavOutcome> {
        self.pop_state(shell, -1).await
    }

    pub async fn forward(&mut self, shell: &mut AppShell) -> AppResult<NavOutcome> {
        self.pop_state(shell, 1).await
    }

    async fn pop_state(&mut self, shell: &mut AppShell, delta: isize) -> AppResult<NavOutcome> {
        let Some(path) = self.history.step(delta).map(str::to_string) else {
            return Ok(NavOutcome::Unchanged);
        };
        self.navigate(
            shell,
            &path,
            NavigateOptions {
                force: false,
                replace: true,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;

    use super::*;
    use crate::shell::context::testing::context_on;
    use crate::shell::testing::{entries, Journal, StubModule};

    fn setup(failing: &[&'static str]) -> (tempfile::TempDir, AppShell, Router, Journal) {
        let (dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let mut shell = AppShell::new(ctx);
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        for (route, id, _) in DEFAULT_ROUTES {
            shell.register_module(
                id,
                Box::new(StubModule {
                    name: route,
                    journal: Arc::clone(&journal),
                    fail_load: failing.contains(&route),
                    view: None,
                }),
            );
        }
        (dir, shell, Router::new("dashboard"), journal)
    }

    #[rocket::async_test]
    async fn same_route_without_force_is_a_no_op() {
        let (_dir, mut shell, mut router, journal) = setup(&[]);
        router.navigate(&mut shell, "tasks", NavigateOptions::default()).await.unwrap();
        let outcome = router
            .navigate(&mut shell, "tasks", NavigateOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome, NavOutcome::Unchanged);
        assert_eq!(router.history_len(), 1);
        assert_eq!(entries(&journal), ["load:tasks"]);

        router.navigate(&mut shell, "tasks", NavigateOptions::forced()).await.unwrap();
        assert_eq!(entries(&journal), ["load:tasks", "load:tasks"]);
    }

    #[rocket::async_test]
    async fn unknown_route_leaves_state_untouched() {
        let (_dir, mut shell, mut router, journal) = setup(&[]);
        router.navigate(&mut shell, "debts", NavigateOptions::default()).await.unwrap();

        let err = router
            .navigate(&mut shell, "inbox", NavigateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownRoute(_)));
        assert_eq!(router.current_route(), Some("debts"));
        assert_eq!(router.fragment(), "#debts");
        assert_eq!(entries(&journal), ["load:debts"]);
    }

    #[rocket::async_test]
    async fn failed_load_falls_back_to_default_once() {
        let (_dir, mut shell, mut router, journal) = setup(&["news"]);
        let outcome = router
            .navigate(&mut shell, "news", NavigateOptions::default())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NavOutcome::FellBack {
                requested: "news".into(),
                to: "dashboard".into(),
            }
        );
        assert_eq!(router.current_route(), Some("dashboard"));
        assert_eq!(router.history_len(), 1);
        assert_eq!(
            entries(&journal),
            ["load:news", "unload:news", "load:dashboard"]
        );
    }

    #[rocket::async_test]
    async fn failing_default_route_returns_error_without_recursing() {
        let (_dir, mut shell, mut router, journal) = setup(&["news", "dashboard"]);
        assert!(router
            .navigate(&mut shell, "news", NavigateOptions::default())
            .await
            .is_err());
        assert_eq!(
            entries(&journal),
            ["load:news", "unload:news", "load:dashboard", "unload:dashboard"]
        );

        assert!(router
            .navigate(&mut shell, "dashboard", NavigateOptions::forced())
            .await
            .is_err());
        assert_eq!(entries(&journal).len(), 6);
    }

    #[rocket::async_test]
    async fn failed_default_route_is_retried_on_next_visit() {
        let (_dir, mut shell, mut router, journal) = setup(&["dashboard"]);
        assert!(router
            .navigate(&mut shell, "dashboard", NavigateOptions::default())
            .await
            .is_err());
        assert_eq!(router.current_route(), None);
        assert_eq!(router.fragment(), "");
        assert_eq!(router.history_len(), 0);

        assert!(router
            .navigate(&mut shell, "dashboard", NavigateOptions::default())
            .await
            .is_err());
        assert_eq!(
            entries(&journal),
            ["load:dashboard", "unload:dashboard", "load:dashboard", "unload:dashboard"]
        );
        assert!(shell.current_view().is_none());
    }

    #[rocket::async_test]
    async fn fallback_keeps_earlier_history() {
        let (_dir, mut shell, mut router, _journal) = setup(&["news"]);
        router.navigate(&mut shell, "debts", NavigateOptions::default()).await.unwrap();
        router.navigate(&mut shell, "news", NavigateOptions::default()).await.unwrap();

        assert_eq!(router.current_route(), Some("dashboard"));
        assert_eq!(router.history_len(), 2);
        router.back(&mut shell).await.unwrap();
        assert_eq!(router.current_route(), Some("debts"));
    }

    #[rocket::async_test]
    async fn back_and_forward_walk_history() {
        let (_dir, mut shell, mut router, _journal) = setup(&[]);
        for route in ["dashboard", "expenses", "calendar"] {
            router.navigate(&mut shell, route, NavigateOptions::default()).await.unwrap();
        }
        assert!(!router.can_go_forward());

        router.back(&mut shell).await.unwrap();
        assert_eq!(router.current_route(), Some("expenses"));
        router.back(&mut shell).await.unwrap();
        assert_eq!(router.current_route(), Some("dashboard"));
        assert_eq!(router.back(&mut shell).await.unwrap(), NavOutcome::Unchanged);

        router.forward(&mut shell).await.unwrap();
        assert_eq!(router.current_route(), Some("expenses"));
        assert_eq!(router.history_len(), 3);

        router.navigate(&mut shell, "news", NavigateOptions::default()).await.unwrap();
        assert_eq!(router.history_len(), 3);
        assert!(!router.can_go_forward());
        assert_eq!(shell.current_module(), Some(ModuleId::News));
    }

    #[test]
    fn initial_route_prefers_known_fragment() {
        let router = Router::new("dashboard");
        assert_eq!(router.initial_route(Some("#calendar")), "calendar");
        assert_eq!(router.initial_route(Some("#nowhere")), "dashboard");
        assert_eq!(router.initial_route(None), "dashboard");
    }

    #[rocket::async_test]
    async fn tabs_follow_current_route() {
        let (_dir, mut shell, mut router, _journal) = setup(&[]);
        router.navigate(&mut shell, "weather", NavigateOptions::default()).await.unwrap();
        let active: Vec<_> = router.tabs().into_iter().filter(|t| t.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].route, "weather");
    }
}
