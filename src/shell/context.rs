use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{Local, NaiveDate};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::warn;

use super::services::ServiceRegistry;
use super::toast::ToastService;
use crate::config::OrganizerConfig;
use crate::db::{self, DbPool};
use crate::error::AppResult;
use crate::models::{User, UserSettings};

#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(self) -> NaiveDate {
        match self {
            Clock::System => Local::now().date_naive(),
            Clock::Fixed(date) => date,
        }
    }
}

/// Issued when a fetch starts; cancelled as soon as the shell navigates again.
#[derive(Debug, Clone)]
pub struct FetchToken {
    generation: u64,
    navigation: Arc<AtomicU64>,
}

impl FetchToken {
    pub fn is_cancelled(&self) -> bool {
        self.navigation.load(Ordering::Acquire) != self.generation
    }
}

/// Everything a module needs from its session: user, storage, services, settings.
pub struct AppContext {
    pub user: User,
    pub config: Arc<OrganizerConfig>,
    pool: DbPool,
    services: ServiceRegistry,
    settings: RwLock<UserSettings>,
    clock: Clock,
    navigation: Arc<AtomicU64>,
}

impl AppContext {
    pub fn new(user: User, pool: DbPool, config: Arc<OrganizerConfig>, settings: UserSettings) -> Self {
        Self {
            user,
            config,
            pool,
            services: ServiceRegistry::default(),
            settings: RwLock::new(settings),
            clock: Clock::System,
            navigation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn conn(&self) -> AppResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut ServiceRegistry {
        &mut self.services
    }

    pub fn settings(&self) -> UserSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Applies `change` to the settings and persists them.
    pub fn update_settings(&self, change: impl FnOnce(&mut UserSettings)) -> AppResult<UserSettings> {
        let mut updated = self.settings();
        change(&mut updated);
        let conn = self.conn()?;
        db::users::save_settings(&conn, self.user.id, &updated)?;
        *self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = updated.clone();
        Ok(updated)
    }

    pub fn replace_settings(&self, settings: UserSettings) {
        *self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
    }

    pub fn currency(&self) -> String {
        self.settings().currency
    }

    pub(crate) fn begin_navigation(&self) -> FetchToken {
        let generation = self.navigation.fetch_add(1, Ordering::AcqRel) + 1;
        FetchToken {
            generation,
            navigation: Arc::clone(&self.navigation),
        }
    }

    pub fn fetch_token(&self) -> FetchToken {
        FetchToken {
            generation: self.navigation.load(Ordering::Acquire),
            navigation: Arc::clone(&self.navigation),
        }
    }

    pub fn notify_success(&self, message: impl Into<String>) {
        if let Some(toasts) = self.services.get::<ToastService>() {
            toasts.success(message);
        }
    }

    pub fn notify_error(&self, message: impl Into<String>) {
        let message = message.into();
        match self.services.get::<ToastService>() {
            Some(toasts) => toasts.error(message),
            None => warn!(%message, "dropping error toast"),
        }
    }
}
