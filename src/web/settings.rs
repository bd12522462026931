use rocket::form::Form;
use rocket::http::CookieJar;
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use tracing::{info, warn};

use super::auth::{check_new_password, clear_session_cookie, hash_password, verify_password};
use super::Organizer;
use crate::db;
use crate::models::{User, UserSettings};

pub const THEMES: [&str; 2] = ["light", "dark"];
pub const LANGUAGES: [&str; 2] = ["en", "ru"];

#[derive(FromForm)]
pub struct PreferencesForm {
    theme: String,
    language: String,
    currency: Option<String>,
    city: Option<String>,
}

#[derive(FromForm)]
pub struct ChangePasswordForm {
    current_password: String,
    new_password: String,
    confirm_password: String,
}

struct Notice<'a> {
    error: Option<&'a str>,
    notice: Option<&'a str>,
}

fn render_settings(state: &Organizer, user: &User, message: Notice<'_>) -> Template {
    let conn = state.pool.get().ok();
    let sessions = conn
        .as_ref()
        .and_then(|conn| db::users::session_count(conn, user.id).ok())
        .unwrap_or(1);
    let prefs = conn
        .as_ref()
        .and_then(|conn| db::users::settings(conn, user.id).ok())
        .unwrap_or_default();
    Template::render(
        "settings",
        serde_json::json!({
            "username": user.username,
            "active_sessions": sessions,
            "settings": prefs,
            "themes": THEMES,
            "languages": LANGUAGES,
            "theme": prefs.theme,
            "error": message.error,
            "notice": message.notice,
        }),
    )
}

fn error(message: &str) -> Notice<'_> {
    Notice {
        error: Some(message),
        notice: None,
    }
}

fn notice(message: &str) -> Notice<'_> {
    Notice {
        error: None,
        notice: Some(message),
    }
}

#[get("/settings")]
pub fn settings(state: &State<Organizer>, cookies: &CookieJar<'_>) -> Result<Template, Redirect> {
    let (_token, user) = state.require_user(cookies)?;
    Ok(render_settings(state, &user, Notice { error: None, notice: None }))
}

#[post("/settings/preferences", data = "<form>")]
pub async fn settings_preferences(
    state: &State<Organizer>,
    cookies: &CookieJar<'_>,
    form: Form<PreferencesForm>,
) -> Result<Template, Redirect> {
    let (token, user) = state.require_user(cookies)?;
    let form = form.into_inner();
    if !THEMES.contains(&form.theme.as_str()) || !LANGUAGES.contains(&form.language.as_str()) {
        return Ok(render_settings(state, &user, error("Unknown theme or language")));
    }

    let Ok(conn) = state.pool.get() else {
        return Ok(render_settings(state, &user, error("Database is unavailable")));
    };
    let current = db::users::settings(&conn, user.id).unwrap_or_default();
    let updated = UserSettings {
        theme: form.theme,
        language: form.language,
        currency: form.currency.map(|c| c.trim().to_string()).unwrap_or_default(),
        last_city: form
            .city
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .or(current.last_city),
    };
    if let Err(err) = db::users::save_settings(&conn, user.id, &updated) {
        warn!(user = user.id, error = %err, "saving preferences failed");
        return Ok(render_settings(state, &user, error("Could not save preferences")));
    }
    drop(conn);

    if let Some(workspace) = state.workspaces.existing(&token).await {
        let mut workspace = workspace.lock().await;
        workspace.shell.context().replace_settings(updated);
        workspace.shell.refresh_current().await;
    }
    info!(user = user.id, "preferences updated");
    Ok(render_settings(state, &user, notice("Preferences saved")))
}

#[post("/settings/password", data = "<form>")]
pub fn settings_password(
    state: &State<Organizer>,
    cookies: &CookieJar<'_>,
    form: Form<ChangePasswordForm>,
) -> Result<Template, Redirect> {
    let (_token, user) = state.require_user(cookies)?;
    let form = form.into_inner();

    if let Err(message) = check_new_password(&form.new_password, &form.confirm_password) {
        return Ok(render_settings(state, &user, error(message)));
    }

    let conn = state.pool.get().map_err(|_| Redirect::to("/login"))?;
    let creds = db::users::user_credentials(&conn, &user.username)
        .map_err(|_| Redirect::to("/login"))?;
    let Some((_user_id, hash)) = creds else {
        return Ok(render_settings(state, &user, error("User not found")));
    };
    if !verify_password(&hash, &form.current_password) {
        return Ok(render_settings(state, &user, error("Current password is wrong")));
    }

    let new_hash = hash_password(&form.new_password).map_err(|_| Redirect::to("/login"))?;
    db::users::update_password(&conn, user.id, &new_hash).map_err(|_| Redirect::to("/login"))?;
    drop(conn);
    info!(user = user.id, "password changed");
    Ok(render_settings(state, &user, notice("Password updated")))
}

#[post("/settings/logout_all")]
pub async fn settings_logout_all(state: &State<Organizer>, cookies: &CookieJar<'_>) -> Redirect {
    if let Some((_token, user)) = state.session_user(cookies) {
        let tokens = state
            .pool
            .get()
            .ok()
            .and_then(|conn| db::users::delete_sessions_for_user(&conn, user.id).ok())
            .unwrap_or_default();
        for token in &tokens {
            state.workspaces.close(token).await;
        }
        info!(user = user.id, sessions = tokens.len(), "signed out everywhere");
    }
    clear_session_cookie(cookies);
    Redirect::to("/login")
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};

    use crate::web::testing::signed_in;
    use crate::web::Organizer;

    #[rocket::async_test]
    async fn currency_preference_reaches_open_modules() {
        let (_dir, client) = signed_in().await;
        client
            .post("/app/debts/add")
            .header(ContentType::Form)
            .body("name=Car&total=5000&paid=3000")
            .dispatch()
            .await;

        let response = client
            .post("/settings/preferences")
            .header(ContentType::Form)
            .body("theme=dark&language=en&currency=EUR&city=Oslo")
            .dispatch()
            .await;
        assert!(response.into_string().await.unwrap().contains("Preferences saved"));

        let body = client
            .get("/app/debts")
            .dispatch()
            .await
            .into_string()
            .await
            .unwrap();
        assert!(body.contains("2000.00 EUR"));
        assert!(body.contains("60.0%"));
        assert!(body.contains("theme-dark"));
    }

    #[rocket::async_test]
    async fn bad_preferences_and_passwords_are_reported() {
        let (_dir, client) = signed_in().await;
        let body = client
            .post("/settings/preferences")
            .header(ContentType::Form)
            .body("theme=neon&language=en")
            .dispatch()
            .await
            .into_string()
            .await
            .unwrap();
        assert!(body.contains("Unknown theme or language"));

        let body = client
            .post("/settings/password")
            .header(ContentType::Form)
            .body("current_password=nope123&new_password=secret2&confirm_password=secret2")
            .dispatch()
            .await
            .into_string()
            .await
            .unwrap();
        assert!(body.contains("Current password is wrong"));

        let body = client
            .post("/settings/password")
            .header(ContentType::Form)
            .body("current_password=secret1&new_password=secret2&confirm_password=secret2")
            .dispatch()
            .await
            .into_string()
            .await
            .unwrap();
        assert!(body.contains("Password updated"));
    }

    #[rocket::async_test]
    async fn logout_all_drops_every_workspace() {
        let (_dir, client) = signed_in().await;
        client.get("/app/dashboard").dispatch().await;
        let response = client.post("/settings/logout_all").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);

        let state = client.rocket().state::<Organizer>().expect("state");
        assert_eq!(state.workspaces.len().await, 0);
        let response = client.get("/app/dashboard").dispatch().await;
        assert_eq!(response.headers().get_one("Location"), Some("/login"));
    }
}
