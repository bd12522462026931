use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Local;
use password_hash::SaltString;
use rand_core::OsRng;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use rusqlite::Connection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Organizer, SESSION_COOKIE};
use crate::db;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(FromForm)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(FromForm)]
pub struct SetupForm {
    username: String,
    password: String,
    confirm_password: String,
}

pub fn hash_password(password: &str) -> Result<String, Status> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| Status::InternalServerError)?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Checks a new password and its confirmation, returning the message to show.
pub fn check_new_password(password: &str, confirm: &str) -> Result<(), &'static str> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 6 characters");
    }
    if password != confirm {
        return Err("Passwords do not match");
    }
    Ok(())
}

/// Creates a session, keeps only the newest `max_sessions` and sets the cookie.
/// Returns the tokens of the sessions that were pruned.
fn start_session(
    conn: &Connection,
    cookies: &CookieJar<'_>,
    user_id: i64,
    max_sessions: i64,
) -> rusqlite::Result<Vec<String>> {
    let token = Uuid::new_v4().to_string();
    let created_at = Local::now().to_rfc3339();
    db::users::create_session(conn, user_id, &token, &created_at)?;
    let pruned = db::users::prune_sessions(conn, user_id, max_sessions)?;

    cookies.add(
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    );
    Ok(pruned)
}

pub fn clear_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove(Cookie::build(SESSION_COOKIE).path("/"));
}

fn render_login(error: Option<&str>) -> Template {
    Template::render("login", serde_json::json!({ "error": error }))
}

fn render_setup(error: Option<&str>) -> Template {
    Template::render("setup", serde_json::json!({ "error": error }))
}

#[get("/setup")]
pub fn setup(state: &State<Organizer>, cookies: &CookieJar<'_>) -> Result<Template, Redirect> {
    let conn = state.pool.get().map_err(|_| Redirect::to("/login"))?;
    if db::users::has_users(&conn).unwrap_or(false) {
        if state.session_user(cookies).is_some() {
            return Err(Redirect::to("/"));
        }
        return Err(Redirect::to("/login"));
    }
    Ok(render_setup(None))
}

#[post("/setup", data = "<form>")]
pub fn setup_post(
    state: &State<Organizer>,
    cookies: &CookieJar<'_>,
    form: Form<SetupForm>,
) -> Result<Redirect, Template> {
    let conn = state
        .pool
        .get()
        .map_err(|_| render_setup(Some("Database is unavailable")))?;
    if db::users::has_users(&conn).unwrap_or(false) {
        return Ok(Redirect::to("/login"));
    }

    let form = form.into_inner();
    let username = form.username.trim();
    if username.is_empty() {
        return Err(render_setup(Some("Enter a username")));
    }
    check_new_password(&form.password, &form.confirm_password)
        .map_err(|message| render_setup(Some(message)))?;

    let password_hash = hash_password(&form.password)
        .map_err(|_| render_setup(Some("Could not store the password")))?;
    let created_at = Local::now().to_rfc3339();
    let user_id = db::users::insert_user(&conn, username, &password_hash, &created_at)
        .map_err(|_| render_setup(Some("That username is taken")))?;
    start_session(&conn, cookies, user_id, state.config.max_sessions)
        .map_err(|_| render_setup(Some("Could not start a session")))?;

    info!(user = user_id, "first user created");
    Ok(Redirect::to("/"))
}

#[get("/login")]
pub fn login(state: &State<Organizer>, cookies: &CookieJar<'_>) -> Result<Template, Redirect> {
    let conn = state.pool.get().map_err(|_| Redirect::to("/login"))?;
    if !db::users::has_users(&conn).unwrap_or(false) {
        return Err(Redirect::to("/setup"));
    }
    if state.session_user(cookies).is_some() {
        return Err(Redirect::to("/"));
    }
    Ok(render_login(None))
}

#[post("/login", data = "<form>")]
pub async fn login_post(
    state: &State<Organizer>,
    cookies: &CookieJar<'_>,
    form: Form<LoginForm>,
) -> Result<Redirect, Template> {
    let conn = state
        .pool
        .get()
        .map_err(|_| render_login(Some("Database is unavailable")))?;
    if !db::users::has_users(&conn).unwrap_or(false) {
        return Ok(Redirect::to("/setup"));
    }
    let form = form.into_inner();
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(render_login(Some("Enter a username and password")));
    }

    let creds = db::users::user_credentials(&conn, username)
        .map_err(|_| render_login(Some("Could not look up the user")))?;
    let Some((user_id, hash)) = creds else {
        warn!(username, "sign-in for unknown user");
        return Err(render_login(Some("Wrong username or password")));
    };
    if !verify_password(&hash, &form.password) {
        warn!(user = user_id, "sign-in with wrong password");
        return Err(render_login(Some("Wrong username or password")));
    }

    let pruned = start_session(&conn, cookies, user_id, state.config.max_sessions)
        .map_err(|_| render_login(Some("Could not start a session")))?;
    drop(conn);
    for token in &pruned {
        state.workspaces.close(token).await;
    }
    info!(user = user_id, pruned = pruned.len(), "signed in");
    Ok(Redirect::to("/"))
}

#[get("/logout")]
pub async fn logout(state: &State<Organizer>, cookies: &CookieJar<'_>) -> Redirect {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        let token = cookie.value().to_string();
        if let Ok(conn) = state.pool.get() {
            let _ = db::users::delete_session(&conn, &token);
        }
        if state.workspaces.close(&token).await {
            let open = state.workspaces.len().await;
            debug!(open, "workspace closed");
        }
    }
    clear_session_cookie(cookies);
    Redirect::to("/login")
}
