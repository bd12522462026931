//! HTTP surface: sign-in, the organizer pages and user settings.
//!
//! Every signed-in browser session owns a [`Workspace`], the shell and router
//! that drive its modules. Workspaces live behind their own async mutex, so
//! requests from one session are handled one at a time while other sessions
//! proceed independently.

pub mod app;
pub mod auth;
pub mod settings;

use std::collections::HashMap;
use std::sync::Arc;

use rocket::figment::Figment;
use rocket::http::{CookieJar, Status};
use rocket::response::Redirect;
use rocket::tokio::sync::Mutex;
use rocket::{Catcher, Request, Route};
use rocket_dyn_templates::Template;
use tracing::{debug, info};

use crate::config::OrganizerConfig;
use crate::controllers::register_default_modules;
use crate::db::{self, DbPool};
use crate::error::AppResult;
use crate::integrations::{NewsClient, WeatherClient};
use crate::models::User;
use crate::router::Router;
use crate::shell::{AppContext, AppShell, Toast, ToastService};

pub const SESSION_COOKIE: &str = "session";

pub struct Workspace {
    pub shell: AppShell,
    pub router: Router,
}

impl Workspace {
    pub fn open(user: User, state: &Organizer) -> AppResult<Self> {
        let settings = db::users::settings(&*state.pool.get()?, user.id)?;
        let ctx = AppContext::new(user, state.pool.clone(), Arc::clone(&state.config), settings);
        let mut shell = AppShell::new(ctx);
        shell.register_service(Arc::new(ToastService::default()));
        shell.register_service(Arc::clone(&state.weather));
        shell.register_service(Arc::clone(&state.news));
        register_default_modules(&mut shell);
        Ok(Self {
            shell,
            router: Router::new(state.config.default_route.clone()),
        })
    }

    pub fn take_toasts(&self) -> Vec<Toast> {
        self.shell
            .service::<ToastService>()
            .map(|toasts| toasts.drain())
            .unwrap_or_default()
    }
}

/// Open workspaces keyed by session token.
#[derive(Default)]
pub struct Workspaces {
    sessions: Mutex<HashMap<String, Arc<Mutex<Workspace>>>>,
}

impl Workspaces {
    pub async fn get_or_open(
        &self,
        token: &str,
        open: impl FnOnce() -> AppResult<Workspace>,
    ) -> AppResult<Arc<Mutex<Workspace>>> {
        let mut sessions = self.sessions.lock().await;
        if let Some(workspace) = sessions.get(token) {
            return Ok(Arc::clone(workspace));
        }
        let workspace = Arc::new(Mutex::new(open()?));
        sessions.insert(token.to_string(), Arc::clone(&workspace));
        debug!(open = sessions.len(), "workspace opened");
        Ok(workspace)
    }

    pub async fn existing(&self, token: &str) -> Option<Arc<Mutex<Workspace>>> {
        self.sessions.lock().await.get(token).cloned()
    }

    pub async fn close(&self, token: &str) -> bool {
        self.sessions.lock().await.remove(token).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Process-wide state managed by Rocket.
pub struct Organizer {
    pub pool: DbPool,
    pub config: Arc<OrganizerConfig>,
    pub weather: Arc<WeatherClient>,
    pub news: Arc<NewsClient>,
    pub workspaces: Workspaces,
}

impl Organizer {
    pub fn from_figment(figment: &Figment) -> AppResult<Self> {
        let config = OrganizerConfig::from_figment(figment)?;
        config.ensure_data_dir()?;
        let pool = db::init_db(&config.db_path())?;
        let weather = Arc::new(WeatherClient::new(&config));
        let news = Arc::new(NewsClient::new(&config));
        info!(
            db = %config.db_path().display(),
            weather = weather.is_configured(),
            news = news.is_configured(),
            "organizer state ready"
        );
        Ok(Self {
            pool,
            config: Arc::new(config),
            weather,
            news,
            workspaces: Workspaces::default(),
        })
    }

    /// The signed-in user and their session token, if the cookie names a live session.
    pub fn session_user(&self, cookies: &CookieJar<'_>) -> Option<(String, User)> {
        let token = cookies.get(SESSION_COOKIE)?.value().to_string();
        let conn = self.pool.get().ok()?;
        let user = db::users::user_by_session(&conn, &token).ok().flatten()?;
        Some((token, user))
    }

    pub fn require_user(&self, cookies: &CookieJar<'_>) -> Result<(String, User), Redirect> {
        let conn = self.pool.get().map_err(|_| Redirect::to("/login"))?;
        if !db::users::has_users(&conn).unwrap_or(false) {
            return Err(Redirect::to("/setup"));
        }
        drop(conn);
        self.session_user(cookies).ok_or_else(|| Redirect::to("/login"))
    }

    pub async fn workspace(&self, token: &str, user: User) -> AppResult<Arc<Mutex<Workspace>>> {
        self.workspaces
            .get_or_open(token, || Workspace::open(user, self))
            .await
    }
}

#[derive(Responder)]
pub enum Page {
    Html(Template),
    Redirect(Redirect),
    Status(Status),
}

pub fn routes() -> Vec<Route> {
    routes![
        auth::setup,
        auth::setup_post,
        auth::login,
        auth::login_post,
        auth::logout,
        settings::settings,
        settings::settings_preferences,
        settings::settings_password,
        settings::settings_logout_all,
        app::index,
        app::page,
        app::fragment,
        app::action,
        app::back,
        app::forward,
    ]
}

#[catch(default)]
fn default_catcher(status: Status, _request: &Request<'_>) -> Template {
    Template::render(
        "error",
        serde_json::json!({
            "code": status.code,
            "reason": status.reason().unwrap_or("Error"),
        }),
    )
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}
